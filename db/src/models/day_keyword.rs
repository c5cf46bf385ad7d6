use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::QueryOrder;
use serde::Serialize;

/// The secret keyword gating check-in for one calendar day of an event.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "day_keywords")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub event_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub keyword_date: NaiveDate,

    /// Stored upper-cased.
    pub keyword: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::event::Entity",
        from = "Column::EventId",
        to = "super::event::Column::Id"
    )]
    Event,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Stores `keyword` for (event, date), overwriting any previous value.
    pub async fn upsert(
        db: &DatabaseConnection,
        event_id: i64,
        keyword_date: NaiveDate,
        keyword: &str,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        let active = ActiveModel {
            event_id: Set(event_id),
            keyword_date: Set(keyword_date),
            keyword: Set(keyword.to_uppercase()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Entity::insert(active)
            .on_conflict(
                OnConflict::columns([Column::EventId, Column::KeywordDate])
                    .update_columns([Column::Keyword, Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        Entity::find_by_id((event_id, keyword_date))
            .one(db)
            .await?
            .ok_or_else(|| {
                DbErr::RecordNotFound(format!(
                    "Keyword for event {event_id} on {keyword_date} vanished after upsert"
                ))
            })
    }

    /// Current keyword row matching `keyword` for the event, if any.
    ///
    /// A keyword belongs to at most one date per event.
    pub async fn find_by_keyword(
        db: &DatabaseConnection,
        event_id: i64,
        keyword: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::EventId.eq(event_id))
            .filter(Column::Keyword.eq(keyword.trim().to_uppercase()))
            .one(db)
            .await
    }

    pub async fn for_event(db: &DatabaseConnection, event_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::EventId.eq(event_id))
            .order_by_asc(Column::KeywordDate)
            .all(db)
            .await
    }
}
