use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::payments::{
  apply_webhook_event, confirm_payment, create_intent_for_order, verify_webhook_signature, WebhookEvent,
};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Webhook-Signature";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
  pub order_id: Uuid,
}

#[instrument(name = "handler::create_payment_intent", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn create_intent_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CreateIntentRequest>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let intent = create_intent_for_order(
    &app_state.db_pool,
    app_state.payment_gateway.as_ref(),
    auth_user.user_id,
    payload.order_id,
    &app_state.config.payment_currency,
  )
  .await?;

  Ok(HttpResponse::Ok().json(json!({
    "clientSecret": intent.client_secret,
    "paymentIntentId": intent.id
  })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
  pub payment_intent_id: String,
}

#[instrument(name = "handler::confirm_payment", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn confirm_payment_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<ConfirmPaymentRequest>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  if payload.payment_intent_id.trim().is_empty() {
    return Err(AppError::Validation("Payment intent ID is required".to_string()));
  }

  let order = confirm_payment(
    &app_state.db_pool,
    app_state.payment_gateway.as_ref(),
    auth_user.user_id,
    &payload.payment_intent_id,
  )
  .await?;

  Ok(HttpResponse::Ok().json(json!({
    "message": "Payment confirmed successfully",
    "order": {
      "id": order.id,
      "orderNumber": order.order_number,
      "status": order.status,
      "paymentStatus": order.payment_status
    }
  })))
}

/// Inbound processor notifications. Signature verification runs against the
/// raw body before anything else; invalid signatures never reach the
/// order-mutation path.
#[instrument(name = "handler::payment_webhook", skip(app_state, req, body))]
pub async fn webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let signature = req
    .headers()
    .get(WEBHOOK_SIGNATURE_HEADER)
    .and_then(|value| value.to_str().ok())
    .ok_or_else(|| AppError::Validation("Webhook Error: missing signature header".to_string()))?;

  verify_webhook_signature(
    &app_state.config.payment_webhook_secret,
    signature,
    &body,
    Utc::now(),
    app_state.config.payment_webhook_tolerance_secs,
  )
  .map_err(|err| {
    warn!(error = %err, "Webhook signature verification failed");
    AppError::from(err)
  })?;

  let event: WebhookEvent = serde_json::from_slice(&body)
    .map_err(|err| AppError::Validation(format!("Invalid webhook payload: {}", err)))?;

  apply_webhook_event(&app_state.db_pool, &event).await?;

  info!(kind = %event.kind, "Webhook processed");
  Ok(HttpResponse::Ok().json(json!({ "received": true })))
}
