use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "offer_kind_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OfferKind {
  Percentage,
  FixedAmount,
  BuyOneGetOne,
  FreeShipping,
}

/// A promotional code conferring a discount under eligibility rules.
///
/// Per-user usage lives in the `offer_usages` table, keyed by
/// `(offer_id, user_id)`, not in an embedded list.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
  pub id: Uuid,
  pub title: String,
  pub description: String,
  #[serde(rename = "type")]
  pub kind: OfferKind,
  pub value: Decimal,
  pub code: String,
  pub minimum_order_amount: Decimal,
  pub maximum_discount: Option<Decimal>,
  pub applicable_products: Vec<Uuid>,
  pub applicable_categories: Vec<String>,
  /// None means unlimited.
  pub usage_limit: Option<i32>,
  pub usage_count: i32,
  pub user_usage_limit: i32,
  pub start_date: DateTime<Utc>,
  pub end_date: DateTime<Utc>,
  pub is_active: bool,
  pub is_public: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Offer {
  /// Whether the offer is inside its validity window and not exhausted.
  pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
    self.is_active
      && self.start_date <= now
      && self.end_date >= now
      && self.usage_limit.map_or(true, |limit| self.usage_count < limit)
  }

  /// Whether a user with `usage_count` prior redemptions may still use it.
  pub fn can_user_use(&self, user_usage_count: i64, now: DateTime<Utc>) -> bool {
    self.is_valid(now) && user_usage_count < i64::from(self.user_usage_limit)
  }
}
