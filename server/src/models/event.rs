use super::order::PaymentStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_category_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
  Workshop,
  Seminar,
  Exhibition,
  Networking,
  Training,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "registration_status_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
  Registered,
  Attended,
  Cancelled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLocation {
  #[serde(default)]
  pub venue: Option<String>,
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default)]
  pub city: Option<String>,
  #[serde(default)]
  pub state: Option<String>,
  #[serde(default)]
  pub zip_code: Option<String>,
  #[serde(default)]
  pub is_online: bool,
  #[serde(default)]
  pub online_link: Option<String>,
}

/// A capacity-bounded resource; registrations live in `event_registrations`,
/// one row per `(event_id, user_id)`.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
  pub id: Uuid,
  pub title: String,
  pub description: String,
  pub category: EventCategory,
  pub date: DateTime<Utc>,
  pub end_date: Option<DateTime<Utc>>,
  pub location: Json<EventLocation>,
  pub price: Decimal,
  pub capacity: i32,
  pub is_active: bool,
  pub featured: bool,
  pub tags: Vec<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EventRegistration {
  pub id: Uuid,
  pub event_id: Uuid,
  pub user_id: Uuid,
  pub status: RegistrationStatus,
  pub payment_status: PaymentStatus,
  pub registered_at: DateTime<Utc>,
}
