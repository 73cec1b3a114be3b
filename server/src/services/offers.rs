//! Promotion evaluation.
//!
//! Evaluation is side-effect free; usage recording is a separate step run
//! only after payment confirmation (see [`record_offer_usage`]).

use crate::errors::{AppError, Result};
use crate::models::{Offer, OfferKind, ProductCategory};
use crate::services::orders::SHIPPING_FLAT_FEE;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{instrument, warn};
use uuid::Uuid;

/// A cart line resolved against the catalog. Prices and categories come from
/// the product records, never from the client.
#[derive(Debug, Clone)]
pub struct CartLine {
  pub product_id: Uuid,
  pub category: ProductCategory,
  pub unit_price: Decimal,
  pub quantity: i32,
}

impl CartLine {
  pub fn line_total(&self) -> Decimal {
    self.unit_price * Decimal::from(self.quantity)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OfferRejection {
  #[error("Offer has expired or is not active")]
  NotCurrentlyValid,
  #[error("You have already used this offer")]
  UserLimitReached,
  #[error("Minimum order amount of ${0} required")]
  BelowMinimum(Decimal),
  #[error("No applicable items in cart for this offer")]
  NoApplicableItems,
}

impl From<OfferRejection> for AppError {
  fn from(rejection: OfferRejection) -> Self {
    AppError::BusinessRule(rejection.to_string())
  }
}

fn round2(amount: Decimal) -> Decimal {
  amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Decides validity of `offer` against a resolved cart and computes the
/// discount amount, rounded half-up to two decimal places.
///
/// Scope narrowing: a non-empty `applicable_products` list selects lines by
/// product id; otherwise a non-empty `applicable_categories` list selects
/// lines by product category; otherwise every line applies.
pub fn evaluate_offer(
  offer: &Offer,
  lines: &[CartLine],
  user_usage_count: i64,
  now: DateTime<Utc>,
) -> Result<Decimal, OfferRejection> {
  if !offer.is_valid(now) {
    return Err(OfferRejection::NotCurrentlyValid);
  }
  if user_usage_count >= i64::from(offer.user_usage_limit) {
    return Err(OfferRejection::UserLimitReached);
  }

  let cart_total: Decimal = lines.iter().map(CartLine::line_total).sum();
  if cart_total < offer.minimum_order_amount {
    return Err(OfferRejection::BelowMinimum(offer.minimum_order_amount));
  }

  let applicable: Vec<&CartLine> = if !offer.applicable_products.is_empty() {
    lines
      .iter()
      .filter(|line| offer.applicable_products.contains(&line.product_id))
      .collect()
  } else if !offer.applicable_categories.is_empty() {
    lines
      .iter()
      .filter(|line| {
        offer
          .applicable_categories
          .iter()
          .any(|category| category == line.category.as_str())
      })
      .collect()
  } else {
    lines.iter().collect()
  };

  if applicable.is_empty() {
    return Err(OfferRejection::NoApplicableItems);
  }

  let applicable_total: Decimal = applicable.iter().map(|line| line.line_total()).sum();

  let mut discount = match offer.kind {
    OfferKind::Percentage => applicable_total * (offer.value / Decimal::ONE_HUNDRED),
    OfferKind::FixedAmount => offer.value.min(applicable_total),
    OfferKind::FreeShipping => SHIPPING_FLAT_FEE,
    // Simplified approximation, not a per-unit pairing algorithm.
    OfferKind::BuyOneGetOne => applicable_total * Decimal::new(5, 1),
  };

  if let Some(maximum) = offer.maximum_discount {
    discount = discount.min(maximum);
  }

  Ok(round2(discount))
}

/// Number of times `user_id` has already redeemed `offer_id`.
pub async fn user_usage_count<'e, E>(executor: E, offer_id: Uuid, user_id: Uuid) -> Result<i64>
where
  E: sqlx::PgExecutor<'e>,
{
  let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM offer_usages WHERE offer_id = $1 AND user_id = $2")
    .bind(offer_id)
    .bind(user_id)
    .fetch_one(executor)
    .await?;
  Ok(count)
}

/// Fetches an active offer by its case-normalized code.
pub async fn find_active_offer<'e, E>(executor: E, code: &str) -> Result<Option<Offer>>
where
  E: sqlx::PgExecutor<'e>,
{
  let offer: Option<Offer> = sqlx::query_as("SELECT * FROM offers WHERE code = $1 AND is_active = TRUE")
    .bind(code.trim().to_uppercase())
    .fetch_optional(executor)
    .await?;
  Ok(offer)
}

/// Records a redemption after payment confirmation: a guarded `usage_count`
/// increment plus an `offer_usages` row, inside the caller's transaction.
///
/// If the offer was exhausted between checkout and confirmation the increment
/// matches no row; the redemption is then logged and skipped rather than
/// failing the already-collected payment.
#[instrument(name = "offers::record_usage", skip(conn))]
pub async fn record_offer_usage(conn: &mut PgConnection, code: &str, user_id: Uuid, order_id: Uuid) -> Result<()> {
  let offer_id: Option<(Uuid,)> = sqlx::query_as(
    "UPDATE offers SET usage_count = usage_count + 1, updated_at = now() \
     WHERE code = $1 AND (usage_limit IS NULL OR usage_count < usage_limit) \
     RETURNING id",
  )
  .bind(code)
  .fetch_optional(&mut *conn)
  .await?;

  match offer_id {
    Some((offer_id,)) => {
      sqlx::query("INSERT INTO offer_usages (offer_id, user_id, order_id) VALUES ($1, $2, $3)")
        .bind(offer_id)
        .bind(user_id)
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
      Ok(())
    }
    None => {
      warn!(code, %order_id, "Offer usage not recorded: code missing or usage limit reached");
      Ok(())
    }
  }
}

/// Resolves requested `(product_id, quantity)` pairs into [`CartLine`]s
/// against active catalog entries.
pub async fn resolve_cart_lines(pool: &PgPool, items: &[(Uuid, i32)]) -> Result<Vec<CartLine>> {
  let ids: Vec<Uuid> = items.iter().map(|(id, _)| *id).collect();
  let products: Vec<(Uuid, ProductCategory, Decimal)> =
    sqlx::query_as("SELECT id, category, price FROM products WHERE id = ANY($1) AND is_active = TRUE")
      .bind(&ids)
      .fetch_all(pool)
      .await?;

  items
    .iter()
    .map(|(product_id, quantity)| {
      products
        .iter()
        .find(|(id, _, _)| id == product_id)
        .map(|(id, category, price)| CartLine {
          product_id: *id,
          category: *category,
          unit_price: *price,
          quantity: *quantity,
        })
        .ok_or_else(|| AppError::NotFound(format!("Product not found: {}", product_id)))
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;
  use rust_decimal_macros::dec;

  fn sample_offer(kind: OfferKind, value: Decimal) -> Offer {
    let now = Utc::now();
    Offer {
      id: Uuid::new_v4(),
      title: "Test offer".to_string(),
      description: "Test".to_string(),
      kind,
      value,
      code: "TEST10".to_string(),
      minimum_order_amount: Decimal::ZERO,
      maximum_discount: None,
      applicable_products: Vec::new(),
      applicable_categories: Vec::new(),
      usage_limit: None,
      usage_count: 0,
      user_usage_limit: 1,
      start_date: now - Duration::days(1),
      end_date: now + Duration::days(1),
      is_active: true,
      is_public: true,
      created_at: now,
      updated_at: now,
    }
  }

  fn line(category: ProductCategory, unit_price: Decimal, quantity: i32) -> CartLine {
    CartLine {
      product_id: Uuid::new_v4(),
      category,
      unit_price,
      quantity,
    }
  }

  #[test]
  fn percentage_discount_rounds_half_up() {
    let offer = sample_offer(OfferKind::Percentage, dec!(20));
    let lines = vec![line(ProductCategory::Printing, dec!(37.50), 1)];
    let discount = evaluate_offer(&offer, &lines, 0, Utc::now()).unwrap();
    assert_eq!(discount, dec!(7.50));
  }

  #[test]
  fn maximum_discount_caps_the_result() {
    let mut offer = sample_offer(OfferKind::Percentage, dec!(20));
    offer.maximum_discount = Some(dec!(5));
    let lines = vec![line(ProductCategory::Printing, dec!(37.50), 1)];
    let discount = evaluate_offer(&offer, &lines, 0, Utc::now()).unwrap();
    assert_eq!(discount, dec!(5.00));
  }

  #[test]
  fn fixed_amount_never_exceeds_applicable_total() {
    let offer = sample_offer(OfferKind::FixedAmount, dec!(25));
    let lines = vec![line(ProductCategory::Banners, dec!(8), 2)];
    let discount = evaluate_offer(&offer, &lines, 0, Utc::now()).unwrap();
    assert_eq!(discount, dec!(16.00));
  }

  #[test]
  fn free_shipping_credits_the_flat_fee() {
    let offer = sample_offer(OfferKind::FreeShipping, Decimal::ZERO);
    let lines = vec![line(ProductCategory::Boxes, dec!(40), 1)];
    let discount = evaluate_offer(&offer, &lines, 0, Utc::now()).unwrap();
    assert_eq!(discount, dec!(10.00));
  }

  #[test]
  fn bogo_halves_the_applicable_total() {
    let offer = sample_offer(OfferKind::BuyOneGetOne, Decimal::ZERO);
    let lines = vec![line(ProductCategory::Labels, dec!(12), 2)];
    let discount = evaluate_offer(&offer, &lines, 0, Utc::now()).unwrap();
    assert_eq!(discount, dec!(12.00));
  }

  #[test]
  fn rejects_below_minimum_order_amount() {
    let mut offer = sample_offer(OfferKind::Percentage, dec!(10));
    offer.minimum_order_amount = dec!(50);
    let lines = vec![line(ProductCategory::Printing, dec!(20), 2)];
    let err = evaluate_offer(&offer, &lines, 0, Utc::now()).unwrap_err();
    assert_eq!(err, OfferRejection::BelowMinimum(dec!(50)));
  }

  #[test]
  fn rejects_expired_offer() {
    let mut offer = sample_offer(OfferKind::Percentage, dec!(10));
    offer.end_date = Utc::now() - Duration::days(2);
    let lines = vec![line(ProductCategory::Printing, dec!(100), 1)];
    let err = evaluate_offer(&offer, &lines, 0, Utc::now()).unwrap_err();
    assert_eq!(err, OfferRejection::NotCurrentlyValid);
  }

  #[test]
  fn rejects_when_global_usage_exhausted() {
    let mut offer = sample_offer(OfferKind::Percentage, dec!(10));
    offer.usage_limit = Some(3);
    offer.usage_count = 3;
    let lines = vec![line(ProductCategory::Printing, dec!(100), 1)];
    let err = evaluate_offer(&offer, &lines, 0, Utc::now()).unwrap_err();
    assert_eq!(err, OfferRejection::NotCurrentlyValid);
  }

  #[test]
  fn rejects_when_user_limit_reached() {
    let offer = sample_offer(OfferKind::Percentage, dec!(10));
    let lines = vec![line(ProductCategory::Printing, dec!(100), 1)];
    let err = evaluate_offer(&offer, &lines, 1, Utc::now()).unwrap_err();
    assert_eq!(err, OfferRejection::UserLimitReached);
    assert!(!offer.can_user_use(1, Utc::now()));
    assert!(offer.can_user_use(0, Utc::now()));
  }

  #[test]
  fn product_scope_limits_the_discount_base() {
    let mut offer = sample_offer(OfferKind::Percentage, dec!(50));
    let in_scope = line(ProductCategory::Printing, dec!(30), 1);
    offer.applicable_products = vec![in_scope.product_id];
    let lines = vec![in_scope, line(ProductCategory::Banners, dec!(70), 1)];
    let discount = evaluate_offer(&offer, &lines, 0, Utc::now()).unwrap();
    assert_eq!(discount, dec!(15.00));
  }

  #[test]
  fn category_scope_is_enforced() {
    let mut offer = sample_offer(OfferKind::Percentage, dec!(10));
    offer.applicable_categories = vec!["business-cards".to_string()];
    let lines = vec![
      line(ProductCategory::BusinessCards, dec!(40), 1),
      line(ProductCategory::Bags, dec!(60), 1),
    ];
    let discount = evaluate_offer(&offer, &lines, 0, Utc::now()).unwrap();
    assert_eq!(discount, dec!(4.00));

    let bags_only = vec![line(ProductCategory::Bags, dec!(60), 1)];
    let err = evaluate_offer(&offer, &bags_only, 0, Utc::now()).unwrap_err();
    assert_eq!(err, OfferRejection::NoApplicableItems);
  }
}
