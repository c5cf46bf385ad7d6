use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::PaginatorTrait;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "certificates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub holder_name: String,
    /// Human-shareable code printed on the certificate.
    pub validation_code: String,
    /// SHA-256 hex digest, the canonical public lookup key.
    pub content_hash: String,
    pub issued_at: DateTime<Utc>,
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

/// Field values for one issuance of a certificate.
#[derive(Debug, Clone)]
pub struct CertificateFields {
    pub event_id: i64,
    pub user_id: i64,
    pub holder_name: String,
    pub validation_code: String,
    pub content_hash: String,
    pub issued_at: DateTime<Utc>,
}

impl Model {
    /// Inserts or refreshes the single certificate row for (event, user).
    pub async fn upsert(db: &DatabaseConnection, fields: CertificateFields) -> Result<Model, DbErr> {
        let (event_id, user_id) = (fields.event_id, fields.user_id);
        let active = ActiveModel {
            event_id: Set(fields.event_id),
            user_id: Set(fields.user_id),
            holder_name: Set(fields.holder_name),
            validation_code: Set(fields.validation_code),
            content_hash: Set(fields.content_hash),
            issued_at: Set(fields.issued_at),
            ..Default::default()
        };

        Entity::insert(active)
            .on_conflict(
                OnConflict::columns([Column::EventId, Column::UserId])
                    .update_columns([
                        Column::HolderName,
                        Column::ValidationCode,
                        Column::ContentHash,
                        Column::IssuedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        Self::find_for(db, event_id, user_id).await?.ok_or_else(|| {
            DbErr::RecordNotFound(format!(
                "Certificate for event {event_id} and user {user_id} vanished after upsert"
            ))
        })
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

    pub async fn find_by_content_hash(
        db: &DatabaseConnection,
        content_hash: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::ContentHash.eq(content_hash))
            .one(db)
            .await
    }

    pub async fn find_by_validation_code(
        db: &DatabaseConnection,
        validation_code: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::ValidationCode.eq(validation_code))
            .one(db)
            .await
    }

    pub async fn count_for_event(db: &DatabaseConnection, event_id: i64) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::EventId.eq(event_id))
            .count(db)
            .await
    }
}
