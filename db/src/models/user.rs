use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{Condition, Set};
use serde::Serialize;

/// Represents a person in the `users` table: attendee, organizer or admin.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Primary key ID (auto-incremented).
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Full name printed on certificates.
    pub name: String,
    /// Unique email address, stored lower-cased.
    pub email: String,
    /// Institutional matriculation number, if the person has one.
    pub matriculation: Option<String>,
    /// Timestamp when the user was created.
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollments,
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

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        name: &str,
        email: &str,
        matriculation: Option<&str>,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            name: Set(name.trim().to_owned()),
            email: Set(normalize_email(email)),
            matriculation: Set(matriculation.map(|m| m.trim().to_owned())),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::Email.eq(normalize_email(email)))
            .one(db)
            .await
    }

    /// Resolves a public check-in identifier, which may be either a
    /// matriculation number or an email address.
    pub async fn find_by_identifier(
        db: &DatabaseConnection,
        identifier: &str,
    ) -> Result<Option<Model>, DbErr> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Ok(None);
        }

        Entity::find()
            .filter(
                Condition::any()
                    .add(Column::Matriculation.eq(identifier))
                    .add(Column::Email.eq(normalize_email(identifier))),
            )
            .one(db)
            .await
    }
}
