use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::{Postgres, QueryBuilder};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{page_window, total_pages};
use crate::errors::AppError;
use crate::models::{Offer, OfferKind};
use crate::services::offers::{evaluate_offer, find_active_offer, resolve_cart_lines, user_usage_count};
use crate::state::AppState;
use crate::web::extractors::{AdminUser, AuthenticatedUser};

#[derive(Deserialize, Debug)]
pub struct ListOffersQuery {
  pub page: Option<i64>,
  pub limit: Option<i64>,
  #[serde(rename = "type")]
  pub kind: Option<OfferKind>,
  pub category: Option<String>,
  pub sort: Option<String>,
  pub order: Option<String>,
}

fn apply_offer_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ListOffersQuery) {
  builder.push(" WHERE is_active = TRUE AND is_public = TRUE AND start_date <= now() AND end_date >= now()");
  if let Some(kind) = query.kind {
    builder.push(" AND kind = ").push_bind(kind);
  }
  if let Some(category) = &query.category {
    builder.push(" AND ").push_bind(category.clone()).push(" = ANY(applicable_categories)");
  }
}

#[instrument(name = "handler::list_offers", skip(app_state, query))]
pub async fn list_offers_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ListOffersQuery>,
) -> Result<HttpResponse, AppError> {
  let (page, limit, offset) = page_window(query.page, query.limit, 12);

  let sort_column = match query.sort.as_deref() {
    Some("value") => "value",
    Some("endDate") => "end_date",
    _ => "created_at",
  };
  let sort_direction = match query.order.as_deref() {
    Some("asc") => "ASC",
    _ => "DESC",
  };

  let mut data_query = QueryBuilder::<Postgres>::new("SELECT * FROM offers");
  apply_offer_filters(&mut data_query, &query);
  data_query
    .push(" ORDER BY ")
    .push(sort_column)
    .push(" ")
    .push(sort_direction)
    .push(" LIMIT ")
    .push_bind(limit)
    .push(" OFFSET ")
    .push_bind(offset);
  let offers: Vec<Offer> = data_query.build_query_as().fetch_all(&app_state.db_pool).await?;

  let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM offers");
  apply_offer_filters(&mut count_query, &query);
  let (total,): (i64,) = count_query.build_query_as().fetch_one(&app_state.db_pool).await?;

  Ok(HttpResponse::Ok().json(json!({
    "offers": offers,
    "totalPages": total_pages(total, limit),
    "currentPage": page,
    "total": total
  })))
}

#[instrument(name = "handler::get_offer", skip(app_state, path), fields(code = %path.as_ref()))]
pub async fn get_offer_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
  let code = path.into_inner();

  let offer = find_active_offer(&app_state.db_pool, &code)
    .await?
    .ok_or_else(|| AppError::NotFound("Offer not found".to_string()))?;

  if !offer.is_valid(Utc::now()) {
    return Err(AppError::BusinessRule("Offer is not currently valid".to_string()));
  }

  Ok(HttpResponse::Ok().json(json!({
    "offer": offer,
    "isValid": true,
    "message": "Offer is valid"
  })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ValidateOfferRequest {
  pub code: String,
  pub cart_items: Vec<ValidateCartItem>,
}

#[derive(Deserialize, Debug)]
pub struct ValidateCartItem {
  pub product: Uuid,
  pub quantity: i32,
}

#[instrument(name = "handler::validate_offer", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn validate_offer_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<ValidateOfferRequest>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();

  if payload.code.trim().is_empty() {
    return Err(AppError::Validation("Offer code is required".to_string()));
  }
  if payload.cart_items.is_empty() {
    return Err(AppError::Validation("Cart items are required".to_string()));
  }

  let offer = find_active_offer(&app_state.db_pool, &payload.code)
    .await?
    .ok_or_else(|| AppError::NotFound("Invalid offer code".to_string()))?;

  let prior_uses = user_usage_count(&app_state.db_pool, offer.id, auth_user.user_id).await?;

  let items: Vec<(Uuid, i32)> = payload.cart_items.iter().map(|item| (item.product, item.quantity)).collect();
  let lines = resolve_cart_lines(&app_state.db_pool, &items).await?;

  let discount = evaluate_offer(&offer, &lines, prior_uses, Utc::now())?;

  Ok(HttpResponse::Ok().json(json!({
    "isValid": true,
    "discount": discount,
    "offer": {
      "id": offer.id,
      "title": offer.title,
      "code": offer.code,
      "type": offer.kind,
      "value": offer.value
    }
  })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferRequest {
  pub title: String,
  pub description: String,
  #[serde(rename = "type")]
  pub kind: OfferKind,
  pub value: Decimal,
  pub code: String,
  #[serde(default)]
  pub minimum_order_amount: Decimal,
  pub maximum_discount: Option<Decimal>,
  #[serde(default)]
  pub applicable_products: Vec<Uuid>,
  #[serde(default)]
  pub applicable_categories: Vec<String>,
  pub usage_limit: Option<i32>,
  #[serde(default = "default_user_usage_limit")]
  pub user_usage_limit: i32,
  pub start_date: DateTime<Utc>,
  pub end_date: DateTime<Utc>,
  #[serde(default = "default_true")]
  pub is_public: bool,
}

fn default_user_usage_limit() -> i32 {
  1
}

fn default_true() -> bool {
  true
}

#[instrument(name = "handler::create_offer", skip(app_state, payload, _admin))]
pub async fn create_offer_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CreateOfferRequest>,
  _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();

  if payload.title.trim().len() < 3 {
    return Err(AppError::Validation("Offer title must be at least 3 characters".to_string()));
  }
  if payload.code.trim().len() < 3 {
    return Err(AppError::Validation("Offer code must be at least 3 characters".to_string()));
  }
  if payload.value < Decimal::ZERO {
    return Err(AppError::Validation("Offer value must be a positive number".to_string()));
  }

  let result: Result<Offer, sqlx::Error> = sqlx::query_as(
    "INSERT INTO offers \
       (title, description, kind, value, code, minimum_order_amount, maximum_discount, \
        applicable_products, applicable_categories, usage_limit, user_usage_limit, \
        start_date, end_date, is_public) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
     RETURNING *",
  )
  .bind(payload.title.trim())
  .bind(payload.description.trim())
  .bind(payload.kind)
  .bind(payload.value)
  .bind(payload.code.trim().to_uppercase())
  .bind(payload.minimum_order_amount)
  .bind(payload.maximum_discount)
  .bind(&payload.applicable_products)
  .bind(&payload.applicable_categories)
  .bind(payload.usage_limit)
  .bind(payload.user_usage_limit)
  .bind(payload.start_date)
  .bind(payload.end_date)
  .bind(payload.is_public)
  .fetch_one(&app_state.db_pool)
  .await;

  let offer = match result {
    Ok(offer) => offer,
    Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
      return Err(AppError::BusinessRule("Offer code already exists".to_string()));
    }
    Err(err) => return Err(AppError::Sqlx(err)),
  };

  info!(offer_id = %offer.id, code = %offer.code, "Offer created");
  Ok(HttpResponse::Created().json(json!({
    "message": "Offer created successfully",
    "offer": offer
  })))
}
