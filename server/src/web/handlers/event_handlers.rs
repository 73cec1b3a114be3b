use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{page_window, total_pages};
use crate::errors::AppError;
use crate::models::event::EventLocation;
use crate::models::{Event, EventCategory};
use crate::services::registration::{cancel_event_registration, register_for_event};
use crate::state::AppState;
use crate::web::extractors::{AdminUser, AuthenticatedUser};

#[derive(Deserialize, Debug)]
pub struct ListEventsQuery {
  pub page: Option<i64>,
  pub limit: Option<i64>,
  pub category: Option<EventCategory>,
  pub search: Option<String>,
  pub upcoming: Option<String>,
  pub sort: Option<String>,
  pub order: Option<String>,
}

fn apply_event_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ListEventsQuery) {
  builder.push(" WHERE is_active = TRUE");
  if let Some(category) = query.category {
    builder.push(" AND category = ").push_bind(category);
  }
  // Upcoming-only unless explicitly disabled, matching the storefront's
  // default listing.
  if query.upcoming.as_deref() != Some("false") {
    builder.push(" AND date >= now()");
  }
  if let Some(search) = &query.search {
    let pattern = format!("%{}%", search);
    builder
      .push(" AND (title ILIKE ")
      .push_bind(pattern.clone())
      .push(" OR description ILIKE ")
      .push_bind(pattern)
      .push(")");
  }
}

#[instrument(name = "handler::list_events", skip(app_state, query))]
pub async fn list_events_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ListEventsQuery>,
) -> Result<HttpResponse, AppError> {
  let (page, limit, offset) = page_window(query.page, query.limit, 12);

  let sort_column = match query.sort.as_deref() {
    Some("title") => "title",
    Some("price") => "price",
    Some("createdAt") => "created_at",
    _ => "date",
  };
  let sort_direction = match query.order.as_deref() {
    Some("desc") => "DESC",
    _ => "ASC",
  };

  let mut data_query = QueryBuilder::<Postgres>::new("SELECT * FROM events");
  apply_event_filters(&mut data_query, &query);
  data_query
    .push(" ORDER BY ")
    .push(sort_column)
    .push(" ")
    .push(sort_direction)
    .push(" LIMIT ")
    .push_bind(limit)
    .push(" OFFSET ")
    .push_bind(offset);
  let events: Vec<Event> = data_query.build_query_as().fetch_all(&app_state.db_pool).await?;

  let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events");
  apply_event_filters(&mut count_query, &query);
  let (total,): (i64,) = count_query.build_query_as().fetch_one(&app_state.db_pool).await?;

  Ok(HttpResponse::Ok().json(json!({
    "events": events,
    "totalPages": total_pages(total, limit),
    "currentPage": page,
    "total": total
  })))
}

#[instrument(name = "handler::get_event", skip(app_state, path), fields(event_id = %path.as_ref()))]
pub async fn get_event_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
  let event_id = path.into_inner();

  let event: Option<Event> = sqlx::query_as("SELECT * FROM events WHERE id = $1 AND is_active = TRUE")
    .bind(event_id)
    .fetch_optional(&app_state.db_pool)
    .await?;
  let event = event.ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

  let (active,): (i64,) =
    sqlx::query_as("SELECT COUNT(*) FROM event_registrations WHERE event_id = $1 AND status = 'registered'")
      .bind(event.id)
      .fetch_one(&app_state.db_pool)
      .await?;
  let available_spots = i64::from(event.capacity) - active;

  Ok(HttpResponse::Ok().json(json!({
    "event": event,
    "availableSpots": available_spots
  })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
  pub title: String,
  pub description: String,
  pub category: EventCategory,
  pub date: DateTime<Utc>,
  pub end_date: Option<DateTime<Utc>>,
  #[serde(default)]
  pub location: EventLocation,
  pub price: Decimal,
  pub capacity: i32,
  #[serde(default)]
  pub featured: bool,
  #[serde(default)]
  pub tags: Vec<String>,
}

#[instrument(name = "handler::create_event", skip(app_state, payload, _admin))]
pub async fn create_event_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CreateEventRequest>,
  _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();

  if payload.title.trim().len() < 3 {
    return Err(AppError::Validation("Event title must be at least 3 characters".to_string()));
  }
  if payload.description.trim().len() < 10 {
    return Err(AppError::Validation("Description must be at least 10 characters".to_string()));
  }
  if payload.price < Decimal::ZERO {
    return Err(AppError::Validation("Price must be a non-negative number".to_string()));
  }
  if payload.capacity < 1 {
    return Err(AppError::Validation("Capacity must be at least 1".to_string()));
  }

  let event: Event = sqlx::query_as(
    "INSERT INTO events (title, description, category, date, end_date, location, price, capacity, featured, tags) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
     RETURNING *",
  )
  .bind(payload.title.trim())
  .bind(payload.description.trim())
  .bind(payload.category)
  .bind(payload.date)
  .bind(payload.end_date)
  .bind(Json(&payload.location))
  .bind(payload.price)
  .bind(payload.capacity)
  .bind(payload.featured)
  .bind(&payload.tags)
  .fetch_one(&app_state.db_pool)
  .await?;

  info!(event_id = %event.id, "Event created");
  Ok(HttpResponse::Created().json(json!({
    "message": "Event created successfully",
    "event": event
  })))
}

#[instrument(name = "handler::register_for_event", skip(app_state, path, auth_user), fields(event_id = %path.as_ref(), user_id = %auth_user.user_id))]
pub async fn register_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (event, _registration) = register_for_event(&app_state.db_pool, path.into_inner(), auth_user.user_id).await?;

  Ok(HttpResponse::Ok().json(json!({
    "message": "Successfully registered for event",
    "event": {
      "id": event.id,
      "title": event.title,
      "date": event.date,
      "price": event.price
    }
  })))
}

#[instrument(name = "handler::cancel_event_registration", skip(app_state, path, auth_user), fields(event_id = %path.as_ref(), user_id = %auth_user.user_id))]
pub async fn unregister_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  cancel_event_registration(&app_state.db_pool, path.into_inner(), auth_user.user_id).await?;

  Ok(HttpResponse::Ok().json(json!({ "message": "Registration cancelled successfully" })))
}
