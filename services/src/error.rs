//! Error and outcome types for the attendance core.
//!
//! Domain rejections are ordinary values the caller branches on; storage
//! failures are always carried in a separate `Database` variant.

use chrono::NaiveDate;
use db::models::enrollment::EnrollmentStatus;
use db::models::event::EventStatus;
use sea_orm::DbErr;

/// Why a check-in attempt was refused. Every variant is user-facing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckInRejection {
    #[error("No event matches this code")]
    EventNotFound,

    #[error("This event is not open for check-in")]
    EventNotApproved,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid keyword")]
    InvalidKeyword,

    #[error("You are not enrolled in this event")]
    NotEnrolled,

    #[error("Attendance already recorded for this day")]
    AlreadyCheckedIn,

    #[error("Could not capture your location")]
    LocationNotCaptured,

    #[error("The event location is not defined")]
    EventLocationUndefined,

    #[error("You are {distance_meters:.0} m from the event location; the limit is {radius_meters:.0} m")]
    TooFar {
        distance_meters: f64,
        radius_meters: f64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CheckInError {
    #[error(transparent)]
    Rejected(#[from] CheckInRejection),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl CheckInError {
    pub fn rejection(&self) -> Option<&CheckInRejection> {
        match self {
            CheckInError::Rejected(reason) => Some(reason),
            CheckInError::Database(_) => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KeywordError {
    #[error("Event {0} not found")]
    EventNotFound(i64),

    #[error("{date} is outside the event ({start} to {end})")]
    DateOutsideEvent {
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("Keyword must be 6 letters or digits, got {0:?}")]
    MalformedKeyword(String),

    #[error("Keyword {keyword} is already used for {date} of this event")]
    KeywordInUse { keyword: String, date: NaiveDate },

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("Event {0} not found")]
    EventNotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Invalid event data: {0}")]
    Validation(String),

    #[error("Event {0} not found")]
    NotFound(i64),

    #[error("Cannot {action} an event that is {from}")]
    InvalidTransition {
        from: EventStatus,
        action: &'static str,
    },

    #[error("An approved event needs a location and radius unless location validation is waived or remote attendance is allowed")]
    GeofenceIncomplete,

    #[error("Enrollment for this event is closed")]
    EnrollmentClosed,

    #[error("Event is {0} and does not accept enrollments")]
    NotAcceptingEnrollments(EventStatus),

    #[error("Enrollment {0} not found")]
    EnrollmentNotFound(i64),

    #[error("Enrollment is already {0}")]
    EnrollmentAlready(EnrollmentStatus),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}
