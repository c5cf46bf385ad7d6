//! Keyword-gated, geofenced attendance check-in.
//!
//! An attempt passes through fixed gates in order: event, identity, keyword,
//! enrollment, duplicate, geofence. Only the final commit writes; the unique
//! index on (event, user, day) settles races between concurrent attempts.

use std::fmt::Display;
use std::sync::Arc;

use chrono::Utc;
use db::is_unique_violation;
use db::models::attendance_record::{self, CheckInChannel};
use db::models::enrollment;
use db::models::event;
use db::models::user;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tracing::{debug, info};

pub use db::models::attendance_record::Model as AttendanceRecord;

use crate::error::{CheckInError, CheckInRejection};
use crate::geo::{self, GeoPoint};
use crate::identity::IdentityProvider;
use crate::keywords::{self, KeywordDirectory};

/// Who is checking in.
#[derive(Debug, Clone, PartialEq)]
pub enum Claimant {
    /// The logged-in user reported by the injected [`IdentityProvider`].
    CurrentSession,
    /// Public form: a matriculation number or an email address.
    Public { identifier: String },
}

impl Claimant {
    pub fn public(identifier: impl Into<String>) -> Self {
        Claimant::Public {
            identifier: identifier.into(),
        }
    }

    fn channel(&self) -> CheckInChannel {
        match self {
            Claimant::CurrentSession => CheckInChannel::Authenticated,
            Claimant::Public { .. } => CheckInChannel::Public,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckInRequest {
    pub join_code: String,
    pub keyword: String,
    pub claimant: Claimant,
    /// Device position; `None` when the device could not produce a fix.
    pub location: Option<GeoPoint>,
}

impl CheckInRequest {
    pub fn new(join_code: impl Into<String>, keyword: impl Into<String>, claimant: Claimant) -> Self {
        Self {
            join_code: join_code.into(),
            keyword: keyword.into(),
            claimant,
            location: None,
        }
    }

    pub fn at(mut self, point: GeoPoint) -> Self {
        self.location = Some(point);
        self
    }

    /// Raw coordinates from the client; invalid numbers count as no fix.
    pub fn at_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.location = GeoPoint::new(latitude, longitude);
        self
    }

    /// Result of a geolocation attempt. A failed fix is treated exactly like
    /// a missing location.
    pub fn with_location_fix<E: Display>(mut self, fix: Result<GeoPoint, E>) -> Self {
        self.location = match fix {
            Ok(point) => Some(point),
            Err(err) => {
                debug!(error = %err, "location acquisition failed");
                None
            }
        };
        self
    }
}

/// Outcome of the geofence gate for an accepted attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceCheck {
    pub validated: bool,
    pub distance_meters: Option<f64>,
}

/// Applies the event's geofence policy to a captured location.
///
/// Only the event's own radius is used.
pub fn evaluate_geofence(
    event: &event::Model,
    location: Option<GeoPoint>,
) -> Result<GeofenceCheck, CheckInRejection> {
    if event.geofence_exempt() {
        return Ok(GeofenceCheck {
            validated: false,
            distance_meters: None,
        });
    }

    let point = location.ok_or(CheckInRejection::LocationNotCaptured)?;
    let (lat, lon, radius) = event
        .geofence()
        .ok_or(CheckInRejection::EventLocationUndefined)?;
    let center = GeoPoint::new(lat, lon).ok_or(CheckInRejection::EventLocationUndefined)?;

    let distance = point.distance_to(&center);
    let radius = f64::from(radius);
    if !geo::is_within_radius(distance, radius) {
        return Err(CheckInRejection::TooFar {
            distance_meters: distance,
            radius_meters: radius,
        });
    }

    Ok(GeofenceCheck {
        validated: true,
        distance_meters: Some(distance),
    })
}

pub struct CheckInProtocol {
    db: DatabaseConnection,
    identity: Arc<dyn IdentityProvider>,
    keywords: KeywordDirectory,
}

impl CheckInProtocol {
    pub fn new(db: DatabaseConnection, identity: Arc<dyn IdentityProvider>) -> Self {
        let keywords = KeywordDirectory::new(db.clone());
        Self {
            db,
            identity,
            keywords,
        }
    }

    /// Validates the attempt and records attendance for the keyword's day.
    pub async fn check_in(&self, request: CheckInRequest) -> Result<AttendanceRecord, CheckInError> {
        match self.run(&request).await {
            Err(CheckInError::Rejected(reason)) => {
                debug!(
                    join_code = %request.join_code,
                    channel = %request.claimant.channel(),
                    %reason,
                    "check-in rejected"
                );
                Err(CheckInError::Rejected(reason))
            }
            other => other,
        }
    }

    async fn run(&self, request: &CheckInRequest) -> Result<AttendanceRecord, CheckInError> {
        let event = event::Model::find_by_join_code(&self.db, &request.join_code)
            .await?
            .ok_or(CheckInRejection::EventNotFound)?;
        if !event.accepts_check_ins() {
            return Err(CheckInRejection::EventNotApproved.into());
        }

        let user = self
            .resolve_user(&request.claimant)
            .await?
            .ok_or(CheckInRejection::UserNotFound)?;

        let keyword_date = self
            .keywords
            .lookup(event.id, &request.keyword)
            .await?
            .ok_or(CheckInRejection::InvalidKeyword)?;

        let enrollment = enrollment::Model::find_confirmed(&self.db, event.id, user.id)
            .await?
            .ok_or(CheckInRejection::NotEnrolled)?;

        let day_index = keywords::day_index_for_date(&event, keyword_date);

        if attendance_record::Model::exists_for_day(&self.db, event.id, user.id, day_index).await? {
            return Err(CheckInRejection::AlreadyCheckedIn.into());
        }

        let geofence = evaluate_geofence(&event, request.location)?;

        let record = attendance_record::ActiveModel {
            event_id: Set(event.id),
            user_id: Set(user.id),
            enrollment_id: Set(enrollment.id),
            day_index: Set(day_index),
            checked_in_at: Set(Utc::now()),
            keyword: Set(request.keyword.trim().to_uppercase()),
            latitude: Set(request.location.map(|p| p.latitude())),
            longitude: Set(request.location.map(|p| p.longitude())),
            distance_meters: Set(geofence.distance_meters),
            location_validated: Set(geofence.validated),
            channel: Set(request.claimant.channel()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                CheckInError::Rejected(CheckInRejection::AlreadyCheckedIn)
            } else {
                CheckInError::Database(err)
            }
        })?;

        info!(
            event_id = event.id,
            user_id = user.id,
            day_index,
            location_validated = geofence.validated,
            "attendance recorded"
        );
        Ok(record)
    }

    async fn resolve_user(&self, claimant: &Claimant) -> Result<Option<user::Model>, CheckInError> {
        let user = match claimant {
            Claimant::CurrentSession => match self.identity.current_user_email() {
                Some(email) => user::Model::find_by_email(&self.db, &email).await?,
                None => None,
            },
            Claimant::Public { identifier } => {
                user::Model::find_by_identifier(&self.db, identifier).await?
            }
        };
        Ok(user)
    }
}
