use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{page_window, total_pages};
use crate::errors::AppError;
use crate::models::event::EventLocation;
use crate::models::{AttendeeStatus, Meetup, MeetupCategory};
use crate::services::registration::{join_meetup, leave_meetup};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct ListMeetupsQuery {
  pub page: Option<i64>,
  pub limit: Option<i64>,
  pub category: Option<MeetupCategory>,
  pub search: Option<String>,
  pub upcoming: Option<String>,
  pub sort: Option<String>,
  pub order: Option<String>,
}

fn apply_meetup_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ListMeetupsQuery) {
  builder.push(" WHERE is_active = TRUE AND is_public = TRUE");
  if let Some(category) = query.category {
    builder.push(" AND category = ").push_bind(category);
  }
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

#[instrument(name = "handler::list_meetups", skip(app_state, query))]
pub async fn list_meetups_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ListMeetupsQuery>,
) -> Result<HttpResponse, AppError> {
  let (page, limit, offset) = page_window(query.page, query.limit, 12);

  let sort_column = match query.sort.as_deref() {
    Some("title") => "title",
    Some("createdAt") => "created_at",
    _ => "date",
  };
  let sort_direction = match query.order.as_deref() {
    Some("desc") => "DESC",
    _ => "ASC",
  };

  let mut data_query = QueryBuilder::<Postgres>::new("SELECT * FROM meetups");
  apply_meetup_filters(&mut data_query, &query);
  data_query
    .push(" ORDER BY ")
    .push(sort_column)
    .push(" ")
    .push(sort_direction)
    .push(" LIMIT ")
    .push_bind(limit)
    .push(" OFFSET ")
    .push_bind(offset);
  let meetups: Vec<Meetup> = data_query.build_query_as().fetch_all(&app_state.db_pool).await?;

  let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM meetups");
  apply_meetup_filters(&mut count_query, &query);
  let (total,): (i64,) = count_query.build_query_as().fetch_one(&app_state.db_pool).await?;

  Ok(HttpResponse::Ok().json(json!({
    "meetups": meetups,
    "totalPages": total_pages(total, limit),
    "currentPage": page,
    "total": total
  })))
}

#[instrument(name = "handler::get_meetup", skip(app_state, path), fields(meetup_id = %path.as_ref()))]
pub async fn get_meetup_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
  let meetup_id = path.into_inner();

  let meetup: Option<Meetup> = sqlx::query_as("SELECT * FROM meetups WHERE id = $1 AND is_active = TRUE")
    .bind(meetup_id)
    .fetch_optional(&app_state.db_pool)
    .await?;
  let meetup = meetup.ok_or_else(|| AppError::NotFound("Meetup not found".to_string()))?;

  let (active,): (i64,) =
    sqlx::query_as("SELECT COUNT(*) FROM meetup_attendees WHERE meetup_id = $1 AND status = 'joined'")
      .bind(meetup.id)
      .fetch_one(&app_state.db_pool)
      .await?;
  let available_spots = i64::from(meetup.max_attendees) - active;

  Ok(HttpResponse::Ok().json(json!({
    "meetup": meetup,
    "availableSpots": available_spots
  })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetupRequest {
  pub title: String,
  pub description: String,
  pub category: MeetupCategory,
  pub date: DateTime<Utc>,
  #[serde(default)]
  pub location: EventLocation,
  pub max_attendees: i32,
  #[serde(default = "default_true")]
  pub is_public: bool,
  #[serde(default)]
  pub requires_approval: bool,
  #[serde(default)]
  pub tags: Vec<String>,
}

fn default_true() -> bool {
  true
}

#[instrument(name = "handler::create_meetup", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn create_meetup_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CreateMeetupRequest>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();

  if payload.title.trim().len() < 3 {
    return Err(AppError::Validation("Meetup title must be at least 3 characters".to_string()));
  }
  if payload.description.trim().len() < 10 {
    return Err(AppError::Validation("Description must be at least 10 characters".to_string()));
  }
  if payload.max_attendees < 2 {
    return Err(AppError::Validation("Max attendees must be at least 2".to_string()));
  }

  let meetup: Meetup = sqlx::query_as(
    "INSERT INTO meetups \
       (title, description, organizer_id, category, date, location, max_attendees, is_public, requires_approval, tags) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
     RETURNING *",
  )
  .bind(payload.title.trim())
  .bind(payload.description.trim())
  .bind(auth_user.user_id)
  .bind(payload.category)
  .bind(payload.date)
  .bind(Json(&payload.location))
  .bind(payload.max_attendees)
  .bind(payload.is_public)
  .bind(payload.requires_approval)
  .bind(&payload.tags)
  .fetch_one(&app_state.db_pool)
  .await?;

  info!(meetup_id = %meetup.id, "Meetup created");
  Ok(HttpResponse::Created().json(json!({
    "message": "Meetup created successfully",
    "meetup": meetup
  })))
}

#[instrument(name = "handler::join_meetup", skip(app_state, path, auth_user), fields(meetup_id = %path.as_ref(), user_id = %auth_user.user_id))]
pub async fn join_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (meetup, attendee) = join_meetup(&app_state.db_pool, path.into_inner(), auth_user.user_id).await?;

  let message = if attendee.status == AttendeeStatus::Maybe {
    "Join request sent for approval"
  } else {
    "Successfully joined meetup"
  };

  Ok(HttpResponse::Ok().json(json!({
    "message": message,
    "meetup": {
      "id": meetup.id,
      "title": meetup.title,
      "date": meetup.date
    }
  })))
}

#[instrument(name = "handler::leave_meetup", skip(app_state, path, auth_user), fields(meetup_id = %path.as_ref(), user_id = %auth_user.user_id))]
pub async fn leave_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  leave_meetup(&app_state.db_pool, path.into_inner(), auth_user.user_id).await?;

  Ok(HttpResponse::Ok().json(json!({ "message": "Left meetup successfully" })))
}
