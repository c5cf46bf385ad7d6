use chrono::{DateTime, NaiveDate, Utc};
use rand::{Rng, thread_rng};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::is_unique_violation;

/// Alphabet for public join codes and day keywords.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const JOIN_CODE_LEN: usize = 6;

const JOIN_CODE_ATTEMPTS: usize = 5;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Public 6-character code used to find the event at check-in.
    pub join_code: String,
    pub title: String,
    pub campus: Option<String>,
    pub coordinator: Option<String>,
    pub workload_hours: Option<i32>,
    pub organizer_id: i64,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub enrollment_closes_at: Option<DateTime<Utc>>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: Option<i32>,
    pub remote_attendance_allowed: bool,
    pub location_validation_waived: bool,

    pub status: EventStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EventStatus {
    #[sea_orm(string_value = "pending")]
    Pending,

    #[sea_orm(string_value = "approved")]
    Approved,

    #[sea_orm(string_value = "rejected")]
    Rejected,

    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OrganizerId",
        to = "super::user::Column::Id"
    )]
    Organizer,
    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollments,
    #[sea_orm(has_many = "super::day_keyword::Entity")]
    DayKeywords,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    AttendanceRecords,
    #[sea_orm(has_many = "super::certificate::Entity")]
    Certificates,
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl Related<super::day_keyword::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DayKeywords.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AttendanceRecords.def()
    }
}

impl Related<super::certificate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Certificates.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Column values for a new event request. Status is always `pending`.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub organizer_id: i64,
    pub campus: Option<String>,
    pub workload_hours: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub enrollment_closes_at: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: Option<i32>,
    pub remote_attendance_allowed: bool,
}

pub fn generate_join_code() -> String {
    let mut rng = thread_rng();
    (0..JOIN_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

impl Model {
    /// Inserts a pending event with a freshly generated join code.
    ///
    /// A join-code collision is retried a few times before giving up.
    pub async fn create(db: &DatabaseConnection, draft: &EventDraft) -> Result<Model, DbErr> {
        let mut last_err = None;

        for _ in 0..JOIN_CODE_ATTEMPTS {
            let now = Utc::now();
            let active = ActiveModel {
                join_code: Set(generate_join_code()),
                title: Set(draft.title.trim().to_owned()),
                campus: Set(draft.campus.clone()),
                coordinator: Set(None),
                workload_hours: Set(draft.workload_hours),
                organizer_id: Set(draft.organizer_id),
                start_date: Set(draft.start_date),
                end_date: Set(draft.end_date),
                enrollment_closes_at: Set(draft.enrollment_closes_at),
                latitude: Set(draft.latitude),
                longitude: Set(draft.longitude),
                radius_meters: Set(draft.radius_meters),
                remote_attendance_allowed: Set(draft.remote_attendance_allowed),
                location_validation_waived: Set(false),
                status: Set(EventStatus::Pending),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };

            match active.insert(db).await {
                Ok(model) => return Ok(model),
                Err(err) if is_unique_violation(&err) => {
                    tracing::debug!("join code collision, regenerating");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or_else(|| DbErr::Custom("Could not allocate a join code".into())))
    }

    pub async fn find_by_join_code(
        db: &DatabaseConnection,
        join_code: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::JoinCode.eq(join_code.trim().to_uppercase()))
            .one(db)
            .await
    }

    pub async fn set_status(
        db: &DatabaseConnection,
        event_id: i64,
        status: EventStatus,
    ) -> Result<Model, DbErr> {
        let model = Entity::find_by_id(event_id)
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("Event {event_id} not found")))?;

        let mut active: ActiveModel = model.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }

    #[inline]
    pub fn accepts_check_ins(&self) -> bool {
        self.status == EventStatus::Approved
    }

    /// Waived or remote events skip the geofence entirely.
    #[inline]
    pub fn geofence_exempt(&self) -> bool {
        self.location_validation_waived || self.remote_attendance_allowed
    }

    /// Center and radius, only when all three are present.
    pub fn geofence(&self) -> Option<(f64, f64, i32)> {
        match (self.latitude, self.longitude, self.radius_meters) {
            (Some(lat), Some(lon), Some(radius)) => Some((lat, lon, radius)),
            _ => None,
        }
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}
