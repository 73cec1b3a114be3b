//! Capacity-bounded join/leave for events and meetups.
//!
//! The two pipelines share the same guard sequence (past date, duplicate
//! entry, capacity); each transaction locks the parent row before counting,
//! so the active-participant count can never exceed capacity under
//! concurrent joins.

use crate::errors::{AppError, Result};
use crate::models::{
  AttendeeStatus, Event, EventRegistration, Meetup, MeetupAttendee, PaymentStatus,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

/// Hours before an event's start past which registration can no longer be
/// cancelled.
pub const EVENT_CANCELLATION_CUTOFF_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejection {
  PastDate,
  AlreadyMember,
  Full,
}

/// Shared join guards, checked in the same order for both pipelines.
pub fn check_join(
  resource_date: DateTime<Utc>,
  now: DateTime<Utc>,
  already_member: bool,
  active_count: i64,
  capacity: i64,
) -> Result<(), JoinRejection> {
  if resource_date < now {
    return Err(JoinRejection::PastDate);
  }
  if already_member {
    return Err(JoinRejection::AlreadyMember);
  }
  if active_count >= capacity {
    return Err(JoinRejection::Full);
  }
  Ok(())
}

/// Whether an event registration may still be cancelled: true until the
/// cutoff window before the event starts.
pub fn cancellation_window_open(event_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
  event_date - now >= Duration::hours(EVENT_CANCELLATION_CUTOFF_HOURS)
}

async fn fetch_active_event(tx: &mut sqlx::PgConnection, event_id: Uuid) -> Result<Event> {
  let event: Option<Event> = sqlx::query_as("SELECT * FROM events WHERE id = $1 AND is_active = TRUE FOR UPDATE")
    .bind(event_id)
    .fetch_optional(&mut *tx)
    .await?;
  event.ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

async fn fetch_active_meetup(tx: &mut sqlx::PgConnection, meetup_id: Uuid) -> Result<Meetup> {
  let meetup: Option<Meetup> = sqlx::query_as("SELECT * FROM meetups WHERE id = $1 AND is_active = TRUE FOR UPDATE")
    .bind(meetup_id)
    .fetch_optional(&mut *tx)
    .await?;
  meetup.ok_or_else(|| AppError::NotFound("Meetup not found".to_string()))
}

#[instrument(name = "registration::register_for_event", skip(pool), fields(event_id = %event_id, user_id = %user_id))]
pub async fn register_for_event(pool: &PgPool, event_id: Uuid, user_id: Uuid) -> Result<(Event, EventRegistration)> {
  let mut tx = pool.begin().await?;
  let event = fetch_active_event(&mut tx, event_id).await?;

  let (existing,): (i64,) =
    sqlx::query_as("SELECT COUNT(*) FROM event_registrations WHERE event_id = $1 AND user_id = $2")
      .bind(event.id)
      .bind(user_id)
      .fetch_one(&mut *tx)
      .await?;
  let (active,): (i64,) =
    sqlx::query_as("SELECT COUNT(*) FROM event_registrations WHERE event_id = $1 AND status = 'registered'")
      .bind(event.id)
      .fetch_one(&mut *tx)
      .await?;

  check_join(event.date, Utc::now(), existing > 0, active, i64::from(event.capacity)).map_err(|rejection| {
    AppError::BusinessRule(
      match rejection {
        JoinRejection::PastDate => "Cannot register for past events",
        JoinRejection::AlreadyMember => "Already registered for this event",
        JoinRejection::Full => "Event is full",
      }
      .to_string(),
    )
  })?;

  // Free events are paid by definition; priced ones await payment.
  let payment_status = if event.price > Decimal::ZERO {
    PaymentStatus::Pending
  } else {
    PaymentStatus::Paid
  };

  let registration: EventRegistration = sqlx::query_as(
    "INSERT INTO event_registrations (event_id, user_id, status, payment_status) \
     VALUES ($1, $2, 'registered', $3) \
     RETURNING *",
  )
  .bind(event.id)
  .bind(user_id)
  .bind(payment_status)
  .fetch_one(&mut *tx)
  .await?;

  tx.commit().await?;
  info!("Registered for event");
  Ok((event, registration))
}

#[instrument(name = "registration::cancel_event_registration", skip(pool), fields(event_id = %event_id, user_id = %user_id))]
pub async fn cancel_event_registration(pool: &PgPool, event_id: Uuid, user_id: Uuid) -> Result<()> {
  let mut tx = pool.begin().await?;
  let event = fetch_active_event(&mut tx, event_id).await?;

  let (existing,): (i64,) =
    sqlx::query_as("SELECT COUNT(*) FROM event_registrations WHERE event_id = $1 AND user_id = $2")
      .bind(event.id)
      .bind(user_id)
      .fetch_one(&mut *tx)
      .await?;
  if existing == 0 {
    return Err(AppError::BusinessRule("Not registered for this event".to_string()));
  }

  if !cancellation_window_open(event.date, Utc::now()) {
    return Err(AppError::BusinessRule(
      "Cannot cancel registration less than 24 hours before event".to_string(),
    ));
  }

  // Removal, not a status flip: rejoining later starts a fresh entry.
  sqlx::query("DELETE FROM event_registrations WHERE event_id = $1 AND user_id = $2")
    .bind(event.id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

  tx.commit().await?;
  info!("Event registration cancelled");
  Ok(())
}

#[instrument(name = "registration::join_meetup", skip(pool), fields(meetup_id = %meetup_id, user_id = %user_id))]
pub async fn join_meetup(pool: &PgPool, meetup_id: Uuid, user_id: Uuid) -> Result<(Meetup, MeetupAttendee)> {
  let mut tx = pool.begin().await?;
  let meetup = fetch_active_meetup(&mut tx, meetup_id).await?;

  let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM meetup_attendees WHERE meetup_id = $1 AND user_id = $2")
    .bind(meetup.id)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;
  let (active,): (i64,) =
    sqlx::query_as("SELECT COUNT(*) FROM meetup_attendees WHERE meetup_id = $1 AND status = 'joined'")
      .bind(meetup.id)
      .fetch_one(&mut *tx)
      .await?;

  check_join(meetup.date, Utc::now(), existing > 0, active, i64::from(meetup.max_attendees)).map_err(|rejection| {
    AppError::BusinessRule(
      match rejection {
        JoinRejection::PastDate => "Cannot join past meetups",
        JoinRejection::AlreadyMember => "Already joined this meetup",
        JoinRejection::Full => "Meetup is full",
      }
      .to_string(),
    )
  })?;

  // Approval-gated meetups park the attendee in 'maybe' until the organizer
  // decides; events carry no approval concept.
  let status = if meetup.requires_approval {
    AttendeeStatus::Maybe
  } else {
    AttendeeStatus::Joined
  };

  let attendee: MeetupAttendee = sqlx::query_as(
    "INSERT INTO meetup_attendees (meetup_id, user_id, status) VALUES ($1, $2, $3) RETURNING *",
  )
  .bind(meetup.id)
  .bind(user_id)
  .bind(status)
  .fetch_one(&mut *tx)
  .await?;

  tx.commit().await?;
  info!("Joined meetup");
  Ok((meetup, attendee))
}

#[instrument(name = "registration::leave_meetup", skip(pool), fields(meetup_id = %meetup_id, user_id = %user_id))]
pub async fn leave_meetup(pool: &PgPool, meetup_id: Uuid, user_id: Uuid) -> Result<()> {
  let mut tx = pool.begin().await?;
  let meetup = fetch_active_meetup(&mut tx, meetup_id).await?;

  let result = sqlx::query("DELETE FROM meetup_attendees WHERE meetup_id = $1 AND user_id = $2")
    .bind(meetup.id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;
  if result.rows_affected() == 0 {
    return Err(AppError::BusinessRule("Not attending this meetup".to_string()));
  }

  tx.commit().await?;
  info!("Left meetup");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn now() -> DateTime<Utc> {
    Utc::now()
  }

  #[test]
  fn join_guards_run_in_order() {
    let future = now() + Duration::days(7);
    assert_eq!(check_join(now() - Duration::hours(1), now(), false, 0, 10), Err(JoinRejection::PastDate));
    assert_eq!(check_join(future, now(), true, 0, 10), Err(JoinRejection::AlreadyMember));
    assert_eq!(check_join(future, now(), false, 10, 10), Err(JoinRejection::Full));
    assert_eq!(check_join(future, now(), false, 9, 10), Ok(()));
  }

  #[test]
  fn capacity_one_admits_exactly_one() {
    let future = now() + Duration::days(1);
    assert_eq!(check_join(future, now(), false, 0, 1), Ok(()));
    assert_eq!(check_join(future, now(), false, 1, 1), Err(JoinRejection::Full));
  }

  #[test]
  fn cancellation_cutoff_is_twenty_four_hours() {
    assert!(!cancellation_window_open(now() + Duration::hours(23), now()));
    assert!(cancellation_window_open(now() + Duration::hours(25), now()));
  }
}
