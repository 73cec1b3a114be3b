//! Payment bridge: intent creation, synchronous confirmation, and the
//! asynchronous webhook path.
//!
//! The webhook and confirm paths may race; both transition an order to
//! paid/confirmed through a guarded UPDATE, so whichever lands second
//! matches zero rows and becomes a no-op.

use crate::errors::{AppError, Result};
use crate::models::{Order, PaymentStatus};
use crate::services::offers;
use crate::services::payment_gateway::{PaymentGateway, PaymentIntent, PaymentIntentStatus};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const SUCCEEDED_EVENT: &str = "payment_intent.succeeded";
pub const FAILED_EVENT: &str = "payment_intent.payment_failed";

/// Inbound webhook notification body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
  #[serde(rename = "type")]
  pub kind: String,
  pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
  pub object: WebhookIntentObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookIntentObject {
  pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
  #[error("malformed signature header")]
  Malformed,
  #[error("signature timestamp outside tolerance")]
  Stale,
  #[error("signature mismatch")]
  Mismatch,
}

// The processor expects 400 on verification failure so it retries later.
impl From<SignatureError> for AppError {
  fn from(err: SignatureError) -> Self {
    AppError::Validation(format!("Webhook Error: {}", err))
  }
}

/// Verifies a `t=<unix>,v1=<hex>` signature header: HMAC-SHA256 over
/// `"{t}.{raw_body}"` with the shared secret, constant-time comparison,
/// timestamp bounded by `tolerance_secs`.
pub fn verify_webhook_signature(
  secret: &str,
  header: &str,
  body: &[u8],
  now: DateTime<Utc>,
  tolerance_secs: i64,
) -> Result<(), SignatureError> {
  let mut timestamp: Option<i64> = None;
  let mut signature: Option<Vec<u8>> = None;

  for part in header.split(',') {
    match part.trim().split_once('=') {
      Some(("t", value)) => timestamp = value.parse().ok(),
      Some(("v1", value)) => signature = hex::decode(value).ok(),
      _ => {}
    }
  }

  let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
  let signature = signature.ok_or(SignatureError::Malformed)?;

  if (now.timestamp() - timestamp).abs() > tolerance_secs {
    return Err(SignatureError::Stale);
  }

  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
  mac.update(timestamp.to_string().as_bytes());
  mac.update(b".");
  mac.update(body);
  mac.verify_slice(&signature).map_err(|_| SignatureError::Mismatch)
}

/// Signs a payload the way the processor would. Used by tests and by
/// operators replaying events against a dev instance.
pub fn sign_webhook_payload(secret: &str, body: &[u8], timestamp: i64) -> String {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
  mac.update(timestamp.to_string().as_bytes());
  mac.update(b".");
  mac.update(body);
  format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

fn total_in_cents(total: Decimal) -> Result<i64> {
  (total * Decimal::ONE_HUNDRED)
    .round()
    .to_i64()
    .ok_or_else(|| AppError::Internal("Order total out of range".to_string()))
}

/// Creates a payment intent for an order that has not yet been paid and
/// stores the intent reference on the order.
#[instrument(name = "payments::create_intent", skip(pool, gateway), fields(user_id = %user_id, order_id = %order_id))]
pub async fn create_intent_for_order(
  pool: &PgPool,
  gateway: &dyn PaymentGateway,
  user_id: Uuid,
  order_id: Uuid,
  currency: &str,
) -> Result<PaymentIntent> {
  let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
  let order = order.ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

  if order.payment_status == PaymentStatus::Paid {
    return Err(AppError::BusinessRule("Order is already paid".to_string()));
  }

  let intent = gateway.create_intent(order.id, total_in_cents(order.total)?, currency).await?;

  sqlx::query("UPDATE orders SET payment_intent_id = $1, updated_at = now() WHERE id = $2")
    .bind(&intent.id)
    .bind(order.id)
    .execute(pool)
    .await?;

  Ok(intent)
}

/// Synchronous confirmation: transitions the order to confirmed/paid only
/// when the processor reports the intent succeeded, and records offer usage
/// on the first transition.
#[instrument(name = "payments::confirm", skip(pool, gateway), fields(user_id = %user_id))]
pub async fn confirm_payment(
  pool: &PgPool,
  gateway: &dyn PaymentGateway,
  user_id: Uuid,
  intent_id: &str,
) -> Result<Order> {
  let intent = gateway.retrieve_intent(intent_id).await?;
  if intent.status != PaymentIntentStatus::Succeeded {
    return Err(AppError::BusinessRule("Payment not completed".to_string()));
  }

  let mut tx = pool.begin().await?;

  let order: Option<Order> =
    sqlx::query_as("SELECT * FROM orders WHERE payment_intent_id = $1 AND user_id = $2 FOR UPDATE")
      .bind(intent_id)
      .bind(user_id)
      .fetch_optional(&mut *tx)
      .await?;
  let order = order.ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

  let order = if order.payment_status == PaymentStatus::Paid {
    order
  } else {
    let confirmed: Order = sqlx::query_as(
      "UPDATE orders SET payment_status = 'paid', status = 'confirmed', updated_at = now() \
       WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(code) = &confirmed.offer_code {
      offers::record_offer_usage(&mut *tx, code, confirmed.user_id, confirmed.id).await?;
    }
    confirmed
  };

  tx.commit().await?;
  info!(order_id = %order.id, "Payment confirmed");
  Ok(order)
}

/// Applies a processor notification. Idempotent: a repeated `succeeded`
/// event matches zero rows and is acknowledged without error.
#[instrument(name = "payments::apply_webhook_event", skip(pool, event), fields(kind = %event.kind))]
pub async fn apply_webhook_event(pool: &PgPool, event: &WebhookEvent) -> Result<()> {
  let intent_id = event.data.object.id.as_str();
  match event.kind.as_str() {
    SUCCEEDED_EVENT => {
      let mut tx = pool.begin().await?;
      let transitioned: Option<(Uuid, Uuid, Option<String>)> = sqlx::query_as(
        "UPDATE orders SET payment_status = 'paid', status = 'confirmed', updated_at = now() \
         WHERE payment_intent_id = $1 AND payment_status <> 'paid' \
         RETURNING id, user_id, offer_code",
      )
      .bind(intent_id)
      .fetch_optional(&mut *tx)
      .await?;

      match transitioned {
        Some((order_id, user_id, offer_code)) => {
          if let Some(code) = offer_code {
            offers::record_offer_usage(&mut *tx, &code, user_id, order_id).await?;
          }
          tx.commit().await?;
          info!(%order_id, "Order payment confirmed via webhook");
        }
        None => {
          tx.commit().await?;
          info!(intent_id, "Webhook succeeded event matched no pending order; nothing to do");
        }
      }
    }
    FAILED_EVENT => {
      let result = sqlx::query(
        "UPDATE orders SET payment_status = 'failed', status = 'failed', updated_at = now() \
         WHERE payment_intent_id = $1 AND payment_status = 'pending'",
      )
      .bind(intent_id)
      .execute(pool)
      .await?;
      if result.rows_affected() > 0 {
        warn!(intent_id, "Order payment failed via webhook");
      }
    }
    other => {
      info!(kind = other, "Unhandled webhook event type");
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  const SECRET: &str = "whsec_test";

  fn fixed_now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
  }

  #[test]
  fn valid_signature_passes() {
    let body = br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_1"}}}"#;
    let header = sign_webhook_payload(SECRET, body, fixed_now().timestamp());
    assert!(verify_webhook_signature(SECRET, &header, body, fixed_now(), 300).is_ok());
  }

  #[test]
  fn tampered_body_is_rejected() {
    let body = br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_1"}}}"#;
    let header = sign_webhook_payload(SECRET, body, fixed_now().timestamp());
    let tampered = br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_2"}}}"#;
    assert_eq!(
      verify_webhook_signature(SECRET, &header, tampered, fixed_now(), 300),
      Err(SignatureError::Mismatch)
    );
  }

  #[test]
  fn wrong_secret_is_rejected() {
    let body = b"{}";
    let header = sign_webhook_payload("whsec_other", body, fixed_now().timestamp());
    assert_eq!(
      verify_webhook_signature(SECRET, &header, body, fixed_now(), 300),
      Err(SignatureError::Mismatch)
    );
  }

  #[test]
  fn stale_timestamp_is_rejected() {
    let body = b"{}";
    let header = sign_webhook_payload(SECRET, body, fixed_now().timestamp() - 301);
    assert_eq!(
      verify_webhook_signature(SECRET, &header, body, fixed_now(), 300),
      Err(SignatureError::Stale)
    );
  }

  #[test]
  fn malformed_header_is_rejected() {
    assert_eq!(
      verify_webhook_signature(SECRET, "v1=deadbeef", b"{}", fixed_now(), 300),
      Err(SignatureError::Malformed)
    );
    assert_eq!(
      verify_webhook_signature(SECRET, "nonsense", b"{}", fixed_now(), 300),
      Err(SignatureError::Malformed)
    );
  }

  #[test]
  fn webhook_event_parses() {
    let body = r#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_123"}}}"#;
    let event: WebhookEvent = serde_json::from_str(body).unwrap();
    assert_eq!(event.kind, SUCCEEDED_EVENT);
    assert_eq!(event.data.object.id, "pi_123");
  }
}
