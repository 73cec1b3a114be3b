use super::event::EventLocation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "meetup_category_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MeetupCategory {
  Business,
  Networking,
  Creative,
  Educational,
  Social,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attendee_status_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttendeeStatus {
  Joined,
  Maybe,
  Declined,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Meetup {
  pub id: Uuid,
  pub title: String,
  pub description: String,
  pub organizer_id: Uuid,
  pub category: MeetupCategory,
  pub date: DateTime<Utc>,
  pub location: Json<EventLocation>,
  pub max_attendees: i32,
  pub is_public: bool,
  pub requires_approval: bool,
  pub is_active: bool,
  pub tags: Vec<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MeetupAttendee {
  pub id: Uuid,
  pub meetup_id: Uuid,
  pub user_id: Uuid,
  pub status: AttendeeStatus,
  pub joined_at: DateTime<Utc>,
}
