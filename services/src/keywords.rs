//! Per-day secret keywords that gate check-in.

use chrono::NaiveDate;
use db::is_unique_violation;
use db::models::day_keyword::Model as DayKeyword;
use db::models::event::{self, CODE_ALPHABET};
use rand::Rng;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use tracing::{debug, info};

use crate::error::KeywordError;

pub const KEYWORD_LEN: usize = 6;

const GENERATE_ATTEMPTS: usize = 8;

/// Number of distinct keywords (36^6, about 2.18 billion).
///
/// Keywords are unique within one event but may repeat across events;
/// lookups are always scoped to one event.
pub const KEYWORD_SPACE: u64 = 2_176_782_336;

pub fn random_keyword() -> String {
    let mut rng = rand::rng();
    (0..KEYWORD_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Trimmed, upper-cased keyword, or `None` if it is not 6 ASCII letters/digits.
pub fn normalize_keyword(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let well_formed =
        trimmed.len() == KEYWORD_LEN && trimmed.bytes().all(|b| b.is_ascii_alphanumeric());
    well_formed.then(|| trimmed.to_ascii_uppercase())
}

/// 1-based day of the event that `date` falls on.
pub fn day_index_for_date(event: &event::Model, date: NaiveDate) -> i32 {
    ((date - event.start_date).num_days() + 1) as i32
}

pub struct KeywordDirectory {
    db: DatabaseConnection,
}

impl KeywordDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Draws a fresh keyword for the day, replacing any earlier one.
    ///
    /// A draw that repeats another day's keyword of the same event is
    /// discarded and drawn again.
    pub async fn generate(&self, event_id: i64, date: NaiveDate) -> Result<String, KeywordError> {
        let event = self.event_covering(event_id, date).await?;

        let mut attempt = 1;
        loop {
            match self.store(&event, date, &random_keyword()).await {
                Err(KeywordError::KeywordInUse { .. }) if attempt < GENERATE_ATTEMPTS => {
                    debug!(event_id, %date, attempt, "generated keyword already in use, redrawing");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Stores an organizer-chosen keyword for the day, replacing any earlier one.
    ///
    /// Fails with [`KeywordError::KeywordInUse`] when another date of the
    /// event already holds the keyword.
    pub async fn assign(
        &self,
        event_id: i64,
        date: NaiveDate,
        keyword: &str,
    ) -> Result<String, KeywordError> {
        let keyword = normalize_keyword(keyword)
            .ok_or_else(|| KeywordError::MalformedKeyword(keyword.to_owned()))?;
        let event = self.event_covering(event_id, date).await?;
        self.store(&event, date, &keyword).await
    }

    async fn event_covering(&self, event_id: i64, date: NaiveDate) -> Result<event::Model, KeywordError> {
        let event = event::Entity::find_by_id(event_id)
            .one(&self.db)
            .await?
            .ok_or(KeywordError::EventNotFound(event_id))?;

        if !event.contains_date(date) {
            return Err(KeywordError::DateOutsideEvent {
                date,
                start: event.start_date,
                end: event.end_date,
            });
        }
        Ok(event)
    }

    async fn store(
        &self,
        event: &event::Model,
        date: NaiveDate,
        keyword: &str,
    ) -> Result<String, KeywordError> {
        let in_use = |held_on: NaiveDate| KeywordError::KeywordInUse {
            keyword: keyword.to_owned(),
            date: held_on,
        };

        if let Some(holder) = DayKeyword::find_by_keyword(&self.db, event.id, keyword).await? {
            if holder.keyword_date != date {
                return Err(in_use(holder.keyword_date));
            }
            return Ok(holder.keyword);
        }

        let row = match DayKeyword::upsert(&self.db, event.id, date, keyword).await {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => {
                // Lost a race with another date taking the same keyword.
                let held_on = DayKeyword::find_by_keyword(&self.db, event.id, keyword)
                    .await?
                    .map(|holder| holder.keyword_date)
                    .ok_or(KeywordError::Database(err))?;
                return Err(in_use(held_on));
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            event_id = event.id,
            %date,
            day_index = day_index_for_date(event, date),
            "day keyword set"
        );
        Ok(row.keyword)
    }

    /// The date whose current keyword matches, case-insensitively.
    ///
    /// `None` covers unknown and superseded keywords alike.
    pub async fn lookup(&self, event_id: i64, keyword: &str) -> Result<Option<NaiveDate>, DbErr> {
        let Some(keyword) = normalize_keyword(keyword) else {
            return Ok(None);
        };
        Ok(DayKeyword::find_by_keyword(&self.db, event_id, &keyword)
            .await?
            .map(|row| row.keyword_date))
    }

    pub async fn keywords_for_event(&self, event_id: i64) -> Result<Vec<DayKeyword>, DbErr> {
        DayKeyword::for_event(&self.db, event_id).await
    }
}
