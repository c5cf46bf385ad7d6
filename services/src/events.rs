//! Event requests, moderation and enrollment.
//!
//! Events start `pending`; only an approved event takes enrollments and
//! check-ins. Approval is where the geofence is settled: an approved event
//! either has a full location and radius, or is exempt from validation.

use chrono::{DateTime, NaiveDate, Utc};
use common::format_validation_errors;
use db::is_unique_violation;
use db::models::enrollment::{self, EnrollmentStatus};
use db::models::event::{self, EventDraft, EventStatus};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::Deserialize;
use tracing::info;
use util::config;
use validator::{Validate, ValidationError};

use crate::error::EventError;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_dates_and_location"))]
pub struct NewEvent {
    #[validate(length(min = 3, max = 200, message = "Title must be between 3 and 200 characters"))]
    pub title: String,
    pub organizer_id: i64,
    pub campus: Option<String>,
    #[validate(range(min = 1, message = "Workload must be at least one hour"))]
    pub workload_hours: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub enrollment_closes_at: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[validate(range(min = 1, message = "Radius must be at least 1 meter"))]
    pub radius_meters: Option<i32>,
    #[serde(default)]
    pub remote_attendance_allowed: bool,
}

fn validate_dates_and_location(event: &NewEvent) -> Result<(), ValidationError> {
    if event.end_date < event.start_date {
        return Err(ValidationError::new("date_range")
            .with_message("End date must not be before start date".into()));
    }
    if event.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
        return Err(ValidationError::new("latitude")
            .with_message("Latitude must be between -90 and 90".into()));
    }
    if event.longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon)) {
        return Err(ValidationError::new("longitude")
            .with_message("Longitude must be between -180 and 180".into()));
    }
    Ok(())
}

/// Moderator decisions applied when approving. `None` keeps the requested value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Approval {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: Option<i32>,
    pub remote_attendance_allowed: Option<bool>,
    pub location_validation_waived: Option<bool>,
    pub coordinator: Option<String>,
    pub campus: Option<String>,
    pub workload_hours: Option<i32>,
}

pub struct EventService {
    db: DatabaseConnection,
}

impl EventService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find(&self, event_id: i64) -> Result<event::Model, EventError> {
        event::Entity::find_by_id(event_id)
            .one(&self.db)
            .await?
            .ok_or(EventError::NotFound(event_id))
    }

    pub async fn create_event(&self, request: NewEvent) -> Result<event::Model, EventError> {
        request
            .validate()
            .map_err(|e| EventError::Validation(format_validation_errors(&e)))?;

        let draft = EventDraft {
            title: request.title,
            organizer_id: request.organizer_id,
            campus: request.campus,
            workload_hours: request.workload_hours,
            start_date: request.start_date,
            end_date: request.end_date,
            enrollment_closes_at: request.enrollment_closes_at,
            latitude: request.latitude,
            longitude: request.longitude,
            radius_meters: Some(
                request
                    .radius_meters
                    .unwrap_or_else(config::default_radius_meters),
            ),
            remote_attendance_allowed: request.remote_attendance_allowed,
        };

        let created = event::Model::create(&self.db, &draft).await?;
        info!(event_id = created.id, join_code = %created.join_code, "event requested");
        Ok(created)
    }

    pub async fn approve(&self, event_id: i64, approval: Approval) -> Result<event::Model, EventError> {
        let current = self.find(event_id).await?;
        if current.status != EventStatus::Pending {
            return Err(EventError::InvalidTransition {
                from: current.status,
                action: "approve",
            });
        }

        let latitude = approval.latitude.or(current.latitude);
        let longitude = approval.longitude.or(current.longitude);
        let radius = approval.radius_meters.or(current.radius_meters);
        let remote = approval
            .remote_attendance_allowed
            .unwrap_or(current.remote_attendance_allowed);
        let waived = approval
            .location_validation_waived
            .unwrap_or(current.location_validation_waived);
        let exempt = waived || remote;

        match (latitude, longitude, radius) {
            (Some(lat), Some(lon), Some(r)) => {
                if GeoPoint::new(lat, lon).is_none() {
                    return Err(EventError::Validation(format!(
                        "Invalid event location ({lat}, {lon})"
                    )));
                }
                if r < 1 {
                    return Err(EventError::Validation(
                        "Radius must be at least 1 meter".into(),
                    ));
                }
            }
            _ if exempt => {}
            _ => return Err(EventError::GeofenceIncomplete),
        }

        let mut active: event::ActiveModel = current.into();
        active.latitude = Set(latitude);
        active.longitude = Set(longitude);
        active.radius_meters = Set(radius);
        active.remote_attendance_allowed = Set(remote);
        active.location_validation_waived = Set(waived);
        if approval.coordinator.is_some() {
            active.coordinator = Set(approval.coordinator);
        }
        if approval.campus.is_some() {
            active.campus = Set(approval.campus);
        }
        if approval.workload_hours.is_some() {
            active.workload_hours = Set(approval.workload_hours);
        }
        active.status = Set(EventStatus::Approved);
        active.updated_at = Set(Utc::now());

        let approved = active.update(&self.db).await?;
        info!(event_id, exempt, "event approved");
        Ok(approved)
    }

    pub async fn reject(&self, event_id: i64) -> Result<event::Model, EventError> {
        self.transition(event_id, "reject", &[EventStatus::Pending], EventStatus::Rejected)
            .await
    }

    pub async fn cancel(&self, event_id: i64) -> Result<event::Model, EventError> {
        self.transition(
            event_id,
            "cancel",
            &[EventStatus::Pending, EventStatus::Approved],
            EventStatus::Cancelled,
        )
        .await
    }

    async fn transition(
        &self,
        event_id: i64,
        action: &'static str,
        allowed_from: &[EventStatus],
        to: EventStatus,
    ) -> Result<event::Model, EventError> {
        let current = self.find(event_id).await?;
        if !allowed_from.contains(&current.status) {
            return Err(EventError::InvalidTransition {
                from: current.status,
                action,
            });
        }
        let updated = event::Model::set_status(&self.db, event_id, to).await?;
        info!(event_id, status = %to, "event status changed");
        Ok(updated)
    }

    /// Requests a seat. Repeating the request returns the existing enrollment;
    /// a cancelled one is reopened as pending.
    pub async fn enroll(&self, event_id: i64, user_id: i64) -> Result<enrollment::Model, EventError> {
        let event = self.find(event_id).await?;
        if event.status != EventStatus::Approved {
            return Err(EventError::NotAcceptingEnrollments(event.status));
        }
        if event.enrollment_closes_at.is_some_and(|closes| Utc::now() > closes) {
            return Err(EventError::EnrollmentClosed);
        }

        if let Some(existing) = enrollment::Model::find_for(&self.db, event_id, user_id).await? {
            return self.reopen_if_cancelled(existing).await;
        }

        match enrollment::Model::create(&self.db, event_id, user_id, EnrollmentStatus::Pending).await {
            Ok(created) => {
                info!(event_id, user_id, "enrollment requested");
                Ok(created)
            }
            Err(err) if is_unique_violation(&err) => {
                let existing = enrollment::Model::find_for(&self.db, event_id, user_id)
                    .await?
                    .ok_or(EventError::Database(err))?;
                self.reopen_if_cancelled(existing).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn reopen_if_cancelled(
        &self,
        existing: enrollment::Model,
    ) -> Result<enrollment::Model, EventError> {
        if existing.status != EnrollmentStatus::Cancelled {
            return Ok(existing);
        }
        Ok(enrollment::Model::set_status(&self.db, existing.id, EnrollmentStatus::Pending).await?)
    }

    pub async fn confirm_enrollment(&self, enrollment_id: i64) -> Result<enrollment::Model, EventError> {
        self.move_enrollment(enrollment_id, EnrollmentStatus::Confirmed).await
    }

    pub async fn cancel_enrollment(&self, enrollment_id: i64) -> Result<enrollment::Model, EventError> {
        self.move_enrollment(enrollment_id, EnrollmentStatus::Cancelled).await
    }

    async fn move_enrollment(
        &self,
        enrollment_id: i64,
        to: EnrollmentStatus,
    ) -> Result<enrollment::Model, EventError> {
        let current = enrollment::Entity::find_by_id(enrollment_id)
            .one(&self.db)
            .await?
            .ok_or(EventError::EnrollmentNotFound(enrollment_id))?;

        // Cancelled enrollments come back only through `enroll`.
        if current.status == to || current.status == EnrollmentStatus::Cancelled {
            return Err(EventError::EnrollmentAlready(current.status));
        }

        let updated = enrollment::Model::set_status(&self.db, enrollment_id, to).await?;
        info!(
            enrollment_id,
            event_id = updated.event_id,
            status = %to,
            "enrollment status changed"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{date, Seed};
    use chrono::Duration;

    fn request(organizer_id: i64) -> NewEvent {
        NewEvent {
            title: "Workshop X".into(),
            organizer_id,
            campus: Some("North".into()),
            workload_hours: Some(8),
            start_date: date(2025, 3, 10),
            end_date: date(2025, 3, 11),
            enrollment_closes_at: None,
            latitude: Some(0.0),
            longitude: Some(0.0),
            radius_meters: None,
            remote_attendance_allowed: false,
        }
    }

    #[tokio::test]
    async fn create_applies_default_radius_and_starts_pending() {
        let seed = Seed::new().await;
        let service = EventService::new(seed.db.clone());

        let ev = service.create_event(request(seed.organizer.id)).await.unwrap();
        assert_eq!(ev.status, EventStatus::Pending);
        assert_eq!(ev.radius_meters, Some(config::default_radius_meters()));
        assert_eq!(ev.join_code.len(), event::JOIN_CODE_LEN);
    }

    #[tokio::test]
    async fn create_rejects_invalid_input() {
        let seed = Seed::new().await;
        let service = EventService::new(seed.db.clone());

        let mut backwards = request(seed.organizer.id);
        backwards.end_date = date(2025, 3, 9);
        let mut off_map = request(seed.organizer.id);
        off_map.latitude = Some(91.0);
        let mut no_radius = request(seed.organizer.id);
        no_radius.radius_meters = Some(0);
        let mut short = request(seed.organizer.id);
        short.title = "X".into();

        let cases = [
            (backwards, "End date must not be before start date"),
            (off_map, "Latitude must be between -90 and 90"),
            (no_radius, "Radius must be at least 1 meter"),
            (short, "Title must be between 3 and 200 characters"),
        ];
        for (bad, expected) in cases {
            match service.create_event(bad).await.unwrap_err() {
                EventError::Validation(msg) => assert!(msg.contains(expected), "{msg}"),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn approval_enforces_geofence_unless_exempt() {
        let seed = Seed::new().await;
        let service = EventService::new(seed.db.clone());

        let mut no_location = request(seed.organizer.id);
        no_location.latitude = None;
        no_location.longitude = None;
        let ev = service.create_event(no_location.clone()).await.unwrap();
        assert!(matches!(
            service.approve(ev.id, Approval::default()).await,
            Err(EventError::GeofenceIncomplete)
        ));

        let waived = service
            .approve(
                ev.id,
                Approval {
                    location_validation_waived: Some(true),
                    coordinator: Some("Dr. Lima".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(waived.status, EventStatus::Approved);
        assert_eq!(waived.coordinator.as_deref(), Some("Dr. Lima"));

        let other = service.create_event(no_location).await.unwrap();
        let located = service
            .approve(
                other.id,
                Approval {
                    latitude: Some(-23.5),
                    longitude: Some(-46.6),
                    radius_meters: Some(250),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(located.geofence(), Some((-23.5, -46.6, 250)));
    }

    #[tokio::test]
    async fn approval_keeps_requested_flags_unless_overridden() {
        let seed = Seed::new().await;
        let service = EventService::new(seed.db.clone());

        let mut remote = request(seed.organizer.id);
        remote.latitude = None;
        remote.longitude = None;
        remote.remote_attendance_allowed = true;
        let ev = service.create_event(remote.clone()).await.unwrap();

        let approved = service.approve(ev.id, Approval::default()).await.unwrap();
        assert!(approved.remote_attendance_allowed);
        assert!(!approved.location_validation_waived);
        assert!(approved.geofence_exempt());

        let ev = service.create_event(remote).await.unwrap();
        assert!(matches!(
            service
                .approve(
                    ev.id,
                    Approval {
                        remote_attendance_allowed: Some(false),
                        ..Default::default()
                    },
                )
                .await,
            Err(EventError::GeofenceIncomplete)
        ));
    }

    #[tokio::test]
    async fn illegal_transitions_are_refused() {
        let seed = Seed::new().await;
        let service = EventService::new(seed.db.clone());
        let ev = service.create_event(request(seed.organizer.id)).await.unwrap();

        service.reject(ev.id).await.unwrap();
        assert!(matches!(
            service.approve(ev.id, Approval::default()).await,
            Err(EventError::InvalidTransition {
                from: EventStatus::Rejected,
                action: "approve"
            })
        ));
        assert!(matches!(
            service.cancel(ev.id).await,
            Err(EventError::InvalidTransition { .. })
        ));
        assert!(matches!(service.reject(4242).await, Err(EventError::NotFound(4242))));

        let ev = service.create_event(request(seed.organizer.id)).await.unwrap();
        service.approve(ev.id, Approval::default()).await.unwrap();
        let cancelled = service.cancel(ev.id).await.unwrap();
        assert_eq!(cancelled.status, EventStatus::Cancelled);
    }

    #[tokio::test]
    async fn enrollment_lifecycle() {
        let seed = Seed::new().await;
        let service = EventService::new(seed.db.clone());
        let user = seed.user("Alice", "alice@example.com", None).await;
        let ev = service.create_event(request(seed.organizer.id)).await.unwrap();

        assert!(matches!(
            service.enroll(ev.id, user.id).await,
            Err(EventError::NotAcceptingEnrollments(EventStatus::Pending))
        ));
        service.approve(ev.id, Approval::default()).await.unwrap();

        let pending = service.enroll(ev.id, user.id).await.unwrap();
        assert_eq!(pending.status, EnrollmentStatus::Pending);
        assert_eq!(service.enroll(ev.id, user.id).await.unwrap().id, pending.id);

        let confirmed = service.confirm_enrollment(pending.id).await.unwrap();
        assert!(confirmed.is_confirmed());
        assert!(matches!(
            service.confirm_enrollment(pending.id).await,
            Err(EventError::EnrollmentAlready(EnrollmentStatus::Confirmed))
        ));

        service.cancel_enrollment(pending.id).await.unwrap();
        assert!(matches!(
            service.confirm_enrollment(pending.id).await,
            Err(EventError::EnrollmentAlready(EnrollmentStatus::Cancelled))
        ));
        let reopened = service.enroll(ev.id, user.id).await.unwrap();
        assert_eq!(reopened.id, pending.id);
        assert_eq!(reopened.status, EnrollmentStatus::Pending);

        assert!(matches!(
            service.cancel_enrollment(999).await,
            Err(EventError::EnrollmentNotFound(999))
        ));
    }

    #[tokio::test]
    async fn enrollment_closes_at_deadline() {
        let seed = Seed::new().await;
        let service = EventService::new(seed.db.clone());
        let user = seed.user("Late", "late@example.com", None).await;

        let mut closed = request(seed.organizer.id);
        closed.enrollment_closes_at = Some(Utc::now() - Duration::hours(1));
        let ev = service.create_event(closed).await.unwrap();
        service.approve(ev.id, Approval::default()).await.unwrap();

        assert!(matches!(
            service.enroll(ev.id, user.id).await,
            Err(EventError::EnrollmentClosed)
        ));
    }
}
