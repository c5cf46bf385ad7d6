use chrono::{NaiveDate, Utc};
use db::models::enrollment::{self, EnrollmentStatus};
use db::models::event::{self, EventDraft, EventStatus};
use db::models::user;
use db::test_utils::setup_test_db;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[derive(Debug, Clone)]
pub struct EventFixture {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub title: String,
    pub campus: Option<String>,
    pub coordinator: Option<String>,
    pub workload_hours: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: Option<i32>,
    pub remote: bool,
    pub waived: bool,
    pub status: EventStatus,
}

impl EventFixture {
    pub fn remote(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            title: "Remote Talk".into(),
            campus: None,
            coordinator: None,
            workload_hours: None,
            latitude: None,
            longitude: None,
            radius_meters: None,
            remote: true,
            waived: false,
            status: EventStatus::Approved,
        }
    }

    pub fn geofenced(start: NaiveDate, end: NaiveDate, lat: f64, lon: f64, radius: i32) -> Self {
        Self {
            latitude: Some(lat),
            longitude: Some(lon),
            radius_meters: Some(radius),
            remote: false,
            title: "Workshop X".into(),
            ..Self::remote(start, end)
        }
    }

    pub fn status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }
}

pub struct Seed {
    pub db: DatabaseConnection,
    pub organizer: user::Model,
}

impl Seed {
    pub async fn new() -> Self {
        let db = setup_test_db().await;
        let organizer = user::Model::create(&db, "Organizer", "organizer@example.com", None)
            .await
            .unwrap();
        Self { db, organizer }
    }

    pub async fn event(&self, fixture: EventFixture) -> event::Model {
        let created = event::Model::create(
            &self.db,
            &EventDraft {
                title: fixture.title.clone(),
                organizer_id: self.organizer.id,
                campus: fixture.campus.clone(),
                workload_hours: fixture.workload_hours,
                start_date: fixture.start,
                end_date: fixture.end,
                enrollment_closes_at: None,
                latitude: fixture.latitude,
                longitude: fixture.longitude,
                radius_meters: fixture.radius_meters,
                remote_attendance_allowed: fixture.remote,
            },
        )
        .await
        .unwrap();

        let mut active: event::ActiveModel = created.into();
        active.coordinator = Set(fixture.coordinator);
        active.location_validation_waived = Set(fixture.waived);
        active.status = Set(fixture.status);
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await.unwrap()
    }

    pub async fn user(&self, name: &str, email: &str, matriculation: Option<&str>) -> user::Model {
        user::Model::create(&self.db, name, email, matriculation)
            .await
            .unwrap()
    }

    pub async fn enroll(
        &self,
        event_id: i64,
        user_id: i64,
        status: EnrollmentStatus,
    ) -> enrollment::Model {
        enrollment::Model::create(&self.db, event_id, user_id, status)
            .await
            .unwrap()
    }

    pub async fn confirmed(&self, event_id: i64, user_id: i64) -> enrollment::Model {
        self.enroll(event_id, user_id, EnrollmentStatus::Confirmed).await
    }
}
