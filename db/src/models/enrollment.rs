use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "enrollments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub status: EnrollmentStatus,
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
pub enum EnrollmentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,

    #[sea_orm(string_value = "confirmed")]
    Confirmed,

    #[sea_orm(string_value = "cancelled")]
    Cancelled,
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

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        event_id: i64,
        user_id: i64,
        status: EnrollmentStatus,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        ActiveModel {
            event_id: Set(event_id),
            user_id: Set(user_id),
            status: Set(status),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_for(
        db: &DatabaseConnection,
        event_id: i64,
        user_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::EventId.eq(event_id))
            .filter(Column::UserId.eq(user_id))
            .one(db)
            .await
    }

    /// The user's enrollment for the event, only when it is confirmed.
    pub async fn find_confirmed(
        db: &DatabaseConnection,
        event_id: i64,
        user_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::EventId.eq(event_id))
            .filter(Column::UserId.eq(user_id))
            .filter(Column::Status.eq(EnrollmentStatus::Confirmed))
            .one(db)
            .await
    }

    /// Confirmed enrollments of an event together with their users.
    pub async fn confirmed_with_users(
        db: &DatabaseConnection,
        event_id: i64,
    ) -> Result<Vec<(Model, super::user::Model)>, DbErr> {
        let rows = Entity::find()
            .filter(Column::EventId.eq(event_id))
            .filter(Column::Status.eq(EnrollmentStatus::Confirmed))
            .find_also_related(super::user::Entity)
            .all(db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(enrollment, user)| user.map(|u| (enrollment, u)))
            .collect())
    }

    pub async fn set_status(
        db: &DatabaseConnection,
        enrollment_id: i64,
        status: EnrollmentStatus,
    ) -> Result<Model, DbErr> {
        let model = Entity::find_by_id(enrollment_id)
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("Enrollment {enrollment_id} not found")))?;

        let mut active: ActiveModel = model.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }

    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.status == EnrollmentStatus::Confirmed
    }
}
