use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{page_window, total_pages};
use crate::errors::AppError;
use crate::models::{Order, OrderItem, ShippingAddress};
use crate::services::orders::{cancel_order, create_order, OrderItemRequest};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
  pub items: Vec<OrderItemRequest>,
  pub shipping_address: ShippingAddress,
  pub offer_code: Option<String>,
}

fn validate_shipping_address(address: &ShippingAddress) -> Result<(), AppError> {
  if address.name.trim().is_empty() {
    return Err(AppError::Validation("Shipping name is required".to_string()));
  }
  if address.street.trim().is_empty() {
    return Err(AppError::Validation("Shipping address is required".to_string()));
  }
  if address.city.trim().is_empty() {
    return Err(AppError::Validation("Shipping city is required".to_string()));
  }
  if address.zip_code.trim().is_empty() {
    return Err(AppError::Validation("Shipping zip code is required".to_string()));
  }
  Ok(())
}

#[instrument(name = "handler::create_order", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CreateOrderRequest>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  validate_shipping_address(&payload.shipping_address)?;

  let (order, items) = create_order(
    &app_state.db_pool,
    auth_user.user_id,
    &payload.items,
    payload.shipping_address,
    payload.offer_code,
  )
  .await?;

  Ok(HttpResponse::Created().json(json!({
    "message": "Order created successfully",
    "order": order,
    "items": items
  })))
}

#[derive(Deserialize, Debug)]
pub struct ListOrdersQuery {
  pub page: Option<i64>,
  pub limit: Option<i64>,
}

#[instrument(name = "handler::list_orders", skip(app_state, query, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ListOrdersQuery>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (page, limit, offset) = page_window(query.page, query.limit, 10);

  let orders: Vec<Order> =
    sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3")
      .bind(auth_user.user_id)
      .bind(limit)
      .bind(offset)
      .fetch_all(&app_state.db_pool)
      .await?;

  let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
    .bind(auth_user.user_id)
    .fetch_one(&app_state.db_pool)
    .await?;

  Ok(HttpResponse::Ok().json(json!({
    "orders": orders,
    "totalPages": total_pages(total, limit),
    "currentPage": page,
    "total": total
  })))
}

#[instrument(name = "handler::get_order", skip(app_state, path, auth_user), fields(user_id = %auth_user.user_id, order_id = %path.as_ref()))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();

  let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
    .bind(order_id)
    .bind(auth_user.user_id)
    .fetch_optional(&app_state.db_pool)
    .await?;
  let order = order.ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

  let items: Vec<OrderItem> = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1")
    .bind(order.id)
    .fetch_all(&app_state.db_pool)
    .await?;

  Ok(HttpResponse::Ok().json(json!({
    "order": order,
    "items": items
  })))
}

#[instrument(name = "handler::cancel_order", skip(app_state, path, auth_user), fields(user_id = %auth_user.user_id, order_id = %path.as_ref()))]
pub async fn cancel_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order = cancel_order(&app_state.db_pool, auth_user.user_id, path.into_inner()).await?;

  info!(order_id = %order.id, "Order cancelled by user");
  Ok(HttpResponse::Ok().json(json!({
    "message": "Order cancelled successfully",
    "order": order
  })))
}
