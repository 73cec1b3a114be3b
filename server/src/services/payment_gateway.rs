//! Payment-processor seam. The real processor lives behind [`PaymentGateway`];
//! the bundled [`MockGateway`] simulates one for development and tests.

use crate::errors::{AppError, Result as AppResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
  RequiresPaymentMethod,
  Succeeded,
  Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
  pub id: String,
  pub order_id: Uuid,
  pub amount_cents: i64,
  pub currency: String,
  pub status: PaymentIntentStatus,
  pub client_secret: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  async fn create_intent(&self, order_id: Uuid, amount_cents: i64, currency: &str) -> AppResult<PaymentIntent>;
  async fn retrieve_intent(&self, intent_id: &str) -> AppResult<PaymentIntent>;
}

/// In-memory stand-in for the external processor.
///
/// Retrieval simulates the processor completing the charge: a fresh intent
/// comes back `succeeded`, except when the amount carries the failure marker
/// (cents ending in 123), which comes back `failed`.
#[derive(Default)]
pub struct MockGateway {
  intents: RwLock<HashMap<String, PaymentIntent>>,
}

impl MockGateway {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  #[instrument(name = "gateway::create_intent", skip(self), fields(order_id = %order_id))]
  async fn create_intent(&self, order_id: Uuid, amount_cents: i64, currency: &str) -> AppResult<PaymentIntent> {
    if amount_cents <= 0 {
      return Err(AppError::Payment("Amount must be greater than zero".to_string()));
    }
    tokio::time::sleep(std::time::Duration::from_millis(20)).await; // Simulate network latency

    let intent_id = format!("mock_pi_{}", Uuid::new_v4().simple());
    let intent = PaymentIntent {
      id: intent_id.clone(),
      order_id,
      amount_cents,
      currency: currency.to_string(),
      status: PaymentIntentStatus::RequiresPaymentMethod,
      client_secret: Some(format!("{}_secret_{}", intent_id, Uuid::new_v4().simple())),
    };
    self.intents.write().insert(intent_id.clone(), intent.clone());
    info!(intent_id, "Mock payment intent created");
    Ok(intent)
  }

  #[instrument(name = "gateway::retrieve_intent", skip(self))]
  async fn retrieve_intent(&self, intent_id: &str) -> AppResult<PaymentIntent> {
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let mut intents = self.intents.write();
    let intent = intents
      .get_mut(intent_id)
      .ok_or_else(|| AppError::Payment(format!("Unknown payment intent: {}", intent_id)))?;

    if intent.status == PaymentIntentStatus::RequiresPaymentMethod {
      intent.status = if intent.amount_cents % 1000 == 123 {
        PaymentIntentStatus::Failed
      } else {
        PaymentIntentStatus::Succeeded
      };
    }
    Ok(intent.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn created_intent_requires_payment_method() {
    let gateway = MockGateway::new();
    let intent = gateway.create_intent(Uuid::new_v4(), 5000, "usd").await.unwrap();
    assert_eq!(intent.status, PaymentIntentStatus::RequiresPaymentMethod);
    assert!(intent.client_secret.is_some());
  }

  #[tokio::test]
  async fn retrieval_settles_the_charge() {
    let gateway = MockGateway::new();
    let intent = gateway.create_intent(Uuid::new_v4(), 5000, "usd").await.unwrap();
    let settled = gateway.retrieve_intent(&intent.id).await.unwrap();
    assert_eq!(settled.status, PaymentIntentStatus::Succeeded);
  }

  #[tokio::test]
  async fn failure_marker_amount_fails_the_charge() {
    let gateway = MockGateway::new();
    let intent = gateway.create_intent(Uuid::new_v4(), 5123, "usd").await.unwrap();
    let settled = gateway.retrieve_intent(&intent.id).await.unwrap();
    assert_eq!(settled.status, PaymentIntentStatus::Failed);
  }

  #[tokio::test]
  async fn zero_amount_is_rejected() {
    let gateway = MockGateway::new();
    let err = gateway.create_intent(Uuid::new_v4(), 0, "usd").await.unwrap_err();
    assert!(matches!(err, AppError::Payment(_)));
  }
}
