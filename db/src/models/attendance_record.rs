use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{FromQueryResult, PaginatorTrait, QuerySelect};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One check-in of one user on one day of an event.
///
/// Unique on (event_id, user_id, day_index); never updated once written.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub enrollment_id: i64,
    /// 1-based offset of the keyword's date from the event start date.
    pub day_index: i32,

    pub checked_in_at: DateTime<Utc>,
    pub keyword: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_meters: Option<f64>,
    pub location_validated: bool,
    pub channel: CheckInChannel,
}

/// How the check-in reached us.
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
pub enum CheckInChannel {
    /// Logged-in user, identity from the session.
    #[sea_orm(string_value = "authenticated")]
    Authenticated,

    /// Public form, identity from matriculation number or email.
    #[sea_orm(string_value = "public")]
    Public,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::event::Entity",
        from = "Column::EventId",
        to = "super::event::Column::Id"
    )]
    Event,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::enrollment::Entity",
        from = "Column::EnrollmentId",
        to = "super::enrollment::Column::Id"
    )]
    Enrollment,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn exists_for_day(
        db: &DatabaseConnection,
        event_id: i64,
        user_id: i64,
        day_index: i32,
    ) -> Result<bool, DbErr> {
        let count = Entity::find()
            .filter(Column::EventId.eq(event_id))
            .filter(Column::UserId.eq(user_id))
            .filter(Column::DayIndex.eq(day_index))
            .count(db)
            .await?;
        Ok(count > 0)
    }

    pub async fn count_for_user(
        db: &DatabaseConnection,
        event_id: i64,
        user_id: i64,
    ) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::EventId.eq(event_id))
            .filter(Column::UserId.eq(user_id))
            .count(db)
            .await
    }

    /// Day indices on which anyone checked in to the event.
    pub async fn distinct_days(db: &DatabaseConnection, event_id: i64) -> Result<Vec<i32>, DbErr> {
        Entity::find()
            .select_only()
            .column(Column::DayIndex)
            .distinct()
            .filter(Column::EventId.eq(event_id))
            .into_tuple::<i32>()
            .all(db)
            .await
    }

    /// Number of records per user for the event.
    pub async fn counts_by_user(
        db: &DatabaseConnection,
        event_id: i64,
    ) -> Result<HashMap<i64, u64>, DbErr> {
        #[derive(FromQueryResult)]
        struct Row {
            user_id: i64,
            cnt: i64,
        }

        let rows: Vec<Row> = Entity::find()
            .select_only()
            .column(Column::UserId)
            .column_as(Expr::expr(Func::count(Expr::col(Column::Id))), "cnt")
            .filter(Column::EventId.eq(event_id))
            .group_by(Column::UserId)
            .into_model::<Row>()
            .all(db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.user_id, r.cnt.max(0) as u64))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{enrollment, event, user};
    use crate::test_utils::setup_test_db;
    use chrono::NaiveDate;
    use sea_orm::ActiveValue::Set;

    struct Fixture {
        event: event::Model,
        alice: (user::Model, enrollment::Model),
        bob: (user::Model, enrollment::Model),
    }

    async fn fixture(db: &DatabaseConnection) -> Fixture {
        let org = user::Model::create(db, "Org", "org@example.com", None).await.unwrap();
        let ev = event::Model::create(
            db,
            &event::EventDraft {
                title: "Bootcamp".into(),
                organizer_id: org.id,
                campus: None,
                workload_hours: None,
                start_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 7, 3).unwrap(),
                enrollment_closes_at: None,
                latitude: None,
                longitude: None,
                radius_meters: None,
                remote_attendance_allowed: true,
            },
        )
        .await
        .unwrap();

        let mut people = Vec::new();
        for (name, email) in [("Alice", "alice@example.com"), ("Bob", "bob@example.com")] {
            let u = user::Model::create(db, name, email, None).await.unwrap();
            let e = enrollment::Model::create(db, ev.id, u.id, enrollment::EnrollmentStatus::Confirmed)
                .await
                .unwrap();
            people.push((u, e));
        }
        let bob = people.pop().unwrap();
        let alice = people.pop().unwrap();
        Fixture { event: ev, alice, bob }
    }

    async fn record(
        db: &DatabaseConnection,
        event_id: i64,
        who: &(user::Model, enrollment::Model),
        day_index: i32,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            event_id: Set(event_id),
            user_id: Set(who.0.id),
            enrollment_id: Set(who.1.id),
            day_index: Set(day_index),
            checked_in_at: Set(Utc::now()),
            keyword: Set("AB12CD".into()),
            latitude: Set(None),
            longitude: Set(None),
            distance_meters: Set(None),
            location_validated: Set(false),
            channel: Set(CheckInChannel::Public),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    #[tokio::test]
    async fn unique_index_rejects_second_record_for_same_day() {
        let db = setup_test_db().await;
        let f = fixture(&db).await;

        record(&db, f.event.id, &f.alice, 1).await.unwrap();
        let err = record(&db, f.event.id, &f.alice, 1).await.unwrap_err();
        assert!(crate::is_unique_violation(&err));
        assert!(Model::exists_for_day(&db, f.event.id, f.alice.0.id, 1).await.unwrap());
        assert!(!Model::exists_for_day(&db, f.event.id, f.alice.0.id, 2).await.unwrap());
    }

    #[tokio::test]
    async fn aggregates_count_days_and_users() {
        let db = setup_test_db().await;
        let f = fixture(&db).await;

        record(&db, f.event.id, &f.alice, 1).await.unwrap();
        record(&db, f.event.id, &f.alice, 3).await.unwrap();
        record(&db, f.event.id, &f.bob, 1).await.unwrap();

        let mut days = Model::distinct_days(&db, f.event.id).await.unwrap();
        days.sort();
        assert_eq!(days, vec![1, 3]);

        let counts = Model::counts_by_user(&db, f.event.id).await.unwrap();
        assert_eq!(counts.get(&f.alice.0.id), Some(&2));
        assert_eq!(counts.get(&f.bob.0.id), Some(&1));
        assert_eq!(Model::count_for_user(&db, f.event.id, f.bob.0.id).await.unwrap(), 1);
        assert_eq!(Model::count_for_user(&db, f.event.id, f.alice.0.id).await.unwrap(), 2);
    }
}
