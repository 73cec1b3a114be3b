//! Order creation and cancellation.
//!
//! Stock reservation is all-or-nothing: every product row touched by an
//! order is locked and decremented inside one transaction, so a failure on
//! any line rolls back the decrements already made for earlier lines.

use crate::errors::{AppError, Result};
use crate::models::{ChosenCustomization, Order, OrderItem, OrderStatus, Product, ShippingAddress};
use crate::services::offers::{self, CartLine};
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::ONE_HUNDRED;
pub const SHIPPING_FLAT_FEE: Decimal = Decimal::TEN;
/// 8% sales tax.
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
  pub product: Uuid,
  pub quantity: i32,
  #[serde(default)]
  pub customizations: Vec<CustomizationChoice>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationChoice {
  pub name: String,
  pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
  pub subtotal: Decimal,
  pub discount: Decimal,
  pub shipping: Decimal,
  pub tax: Decimal,
  pub total: Decimal,
}

impl OrderTotals {
  /// Free shipping over the threshold, flat fee otherwise; 8% tax on the
  /// subtotal, rounded half-up to two decimal places.
  pub fn compute(subtotal: Decimal, discount: Decimal) -> Self {
    let shipping = if subtotal > FREE_SHIPPING_THRESHOLD {
      Decimal::ZERO
    } else {
      SHIPPING_FLAT_FEE
    };
    let tax = round2(subtotal * TAX_RATE);
    // The discount never drives the total below shipping + tax.
    let discount = discount.min(subtotal);
    let total = subtotal - discount + shipping + tax;
    Self {
      subtotal,
      discount,
      shipping,
      tax,
      total,
    }
  }
}

fn round2(amount: Decimal) -> Decimal {
  amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Human-readable order reference, e.g. `PS-20260806-3FA9C1`.
pub fn generate_order_number() -> String {
  let suffix: String = Uuid::new_v4()
    .simple()
    .to_string()
    .chars()
    .take(6)
    .collect::<String>()
    .to_uppercase();
  format!("PS-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

/// Validates every requested line against the catalog, reserves stock, prices
/// customizations from the product's own option list, applies an optional
/// offer code, and persists the order as `pending`/`pending`.
#[instrument(name = "orders::create", skip(pool, items, shipping_address, offer_code), fields(user_id = %user_id))]
pub async fn create_order(
  pool: &PgPool,
  user_id: Uuid,
  items: &[OrderItemRequest],
  shipping_address: ShippingAddress,
  offer_code: Option<String>,
) -> Result<(Order, Vec<OrderItem>)> {
  if items.is_empty() {
    return Err(AppError::Validation("Order must contain at least one item".to_string()));
  }

  let mut tx = pool.begin().await?;

  let mut subtotal = Decimal::ZERO;
  let mut lines: Vec<CartLine> = Vec::with_capacity(items.len());
  let mut priced_items: Vec<(Uuid, i32, Decimal, Vec<ChosenCustomization>)> = Vec::with_capacity(items.len());

  for item in items {
    if item.quantity <= 0 {
      return Err(AppError::Validation("Item quantity must be positive".to_string()));
    }

    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1 FOR UPDATE")
      .bind(item.product)
      .fetch_optional(&mut *tx)
      .await?;

    let product = match product {
      Some(product) if product.is_active => product,
      _ => return Err(AppError::NotFound(format!("Product not found: {}", item.product))),
    };

    if item.quantity < product.min_order_quantity {
      return Err(AppError::BusinessRule(format!(
        "Minimum order quantity for {} is {}",
        product.name, product.min_order_quantity
      )));
    }
    if product.stock < item.quantity {
      return Err(AppError::BusinessRule(format!(
        "Insufficient stock for {}. Available: {}",
        product.name, product.stock
      )));
    }

    let customizations = price_customizations(&product, &item.customizations)?;
    let customization_cost: Decimal = customizations.iter().map(|c| c.additional_cost).sum();
    subtotal += (product.price + customization_cost) * Decimal::from(item.quantity);

    sqlx::query("UPDATE products SET stock = stock - $1, updated_at = now() WHERE id = $2")
      .bind(item.quantity)
      .bind(product.id)
      .execute(&mut *tx)
      .await?;

    lines.push(CartLine {
      product_id: product.id,
      category: product.category,
      unit_price: product.price,
      quantity: item.quantity,
    });
    priced_items.push((product.id, item.quantity, product.price, customizations));
  }

  let mut applied_code = None;
  let mut discount = Decimal::ZERO;
  if let Some(code) = offer_code {
    let normalized = code.trim().to_uppercase();
    let offer = offers::find_active_offer(&mut *tx, &normalized)
      .await?
      .ok_or_else(|| AppError::NotFound("Invalid offer code".to_string()))?;
    let prior_uses = offers::user_usage_count(&mut *tx, offer.id, user_id).await?;
    discount = offers::evaluate_offer(&offer, &lines, prior_uses, Utc::now())?;
    applied_code = Some(normalized);
  }

  let totals = OrderTotals::compute(subtotal, discount);

  let order: Order = sqlx::query_as(
    "INSERT INTO orders \
       (user_id, order_number, subtotal, discount, offer_code, shipping, tax, total, shipping_address) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
     RETURNING *",
  )
  .bind(user_id)
  .bind(generate_order_number())
  .bind(totals.subtotal)
  .bind(totals.discount)
  .bind(&applied_code)
  .bind(totals.shipping)
  .bind(totals.tax)
  .bind(totals.total)
  .bind(Json(&shipping_address))
  .fetch_one(&mut *tx)
  .await?;

  let mut order_items = Vec::with_capacity(priced_items.len());
  for (product_id, quantity, unit_price, customizations) in priced_items {
    let order_item: OrderItem = sqlx::query_as(
      "INSERT INTO order_items (order_id, product_id, quantity, unit_price, customizations) \
       VALUES ($1, $2, $3, $4, $5) \
       RETURNING *",
    )
    .bind(order.id)
    .bind(product_id)
    .bind(quantity)
    .bind(unit_price)
    .bind(Json(&customizations))
    .fetch_one(&mut *tx)
    .await?;
    order_items.push(order_item);
  }

  tx.commit().await?;
  info!(order_id = %order.id, order_number = %order.order_number, total = %order.total, "Order created");

  Ok((order, order_items))
}

/// Cancels a pending order and restores the reserved stock exactly, inside
/// one transaction.
#[instrument(name = "orders::cancel", skip(pool), fields(user_id = %user_id, order_id = %order_id))]
pub async fn cancel_order(pool: &PgPool, user_id: Uuid, order_id: Uuid) -> Result<Order> {
  let mut tx = pool.begin().await?;

  let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE")
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

  let order = order.ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
  if order.status != OrderStatus::Pending {
    return Err(AppError::BusinessRule("Order cannot be cancelled".to_string()));
  }

  let items: Vec<OrderItem> = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1")
    .bind(order.id)
    .fetch_all(&mut *tx)
    .await?;

  for item in &items {
    sqlx::query("UPDATE products SET stock = stock + $1, updated_at = now() WHERE id = $2")
      .bind(item.quantity)
      .bind(item.product_id)
      .execute(&mut *tx)
      .await?;
  }

  let order: Order = sqlx::query_as("UPDATE orders SET status = 'cancelled', updated_at = now() WHERE id = $1 RETURNING *")
    .bind(order.id)
    .fetch_one(&mut *tx)
    .await?;

  tx.commit().await?;
  info!(order_id = %order.id, "Order cancelled, stock restored");

  Ok(order)
}

fn price_customizations(
  product: &Product,
  choices: &[CustomizationChoice],
) -> Result<Vec<ChosenCustomization>> {
  choices
    .iter()
    .map(|choice| {
      let option = product
        .custom_options
        .iter()
        .find(|option| option.name == choice.name)
        .ok_or_else(|| {
          AppError::Validation(format!(
            "Unknown customization '{}' for {}",
            choice.name, product.name
          ))
        })?;
      Ok(ChosenCustomization {
        name: choice.name.clone(),
        value: choice.value.clone(),
        additional_cost: option.additional_cost.unwrap_or(Decimal::ZERO),
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  #[test]
  fn free_shipping_above_threshold() {
    let totals = OrderTotals::compute(dec!(100.01), Decimal::ZERO);
    assert_eq!(totals.shipping, Decimal::ZERO);
  }

  #[test]
  fn flat_shipping_at_or_below_threshold() {
    let totals = OrderTotals::compute(dec!(100), Decimal::ZERO);
    assert_eq!(totals.shipping, dec!(10));
    let totals = OrderTotals::compute(dec!(42.50), Decimal::ZERO);
    assert_eq!(totals.shipping, dec!(10));
  }

  #[test]
  fn tax_is_eight_percent_rounded_half_up() {
    let totals = OrderTotals::compute(dec!(37.50), Decimal::ZERO);
    assert_eq!(totals.tax, dec!(3.00));
    // 10.5625 * 0.08 = 0.845 -> 0.85 under half-up rounding
    let totals = OrderTotals::compute(dec!(10.5625), Decimal::ZERO);
    assert_eq!(totals.tax, dec!(0.85));
  }

  #[test]
  fn total_is_subtotal_minus_discount_plus_shipping_plus_tax() {
    let totals = OrderTotals::compute(dec!(80), dec!(12.50));
    assert_eq!(totals.total, totals.subtotal - totals.discount + totals.shipping + totals.tax);
    assert_eq!(totals.total, dec!(83.90));
  }

  #[test]
  fn discount_is_clamped_to_subtotal() {
    let totals = OrderTotals::compute(dec!(20), dec!(50));
    assert_eq!(totals.discount, dec!(20));
    assert_eq!(totals.total, totals.shipping + totals.tax);
  }

  #[test]
  fn order_number_has_expected_shape() {
    let number = generate_order_number();
    assert!(number.starts_with("PS-"));
    let parts: Vec<&str> = number.split('-').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[1].len(), 8);
    assert_eq!(parts[2].len(), 6);
  }
}
