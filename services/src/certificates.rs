//! Bulk certificate issuance for an event.

use chrono::{DateTime, Utc};
use db::models::certificate::{self, CertificateFields};
use db::models::enrollment;
use db::models::event;
use db::models::user;
use futures::stream::{self, StreamExt};
use rand::Rng;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use util::config;

use crate::eligibility::{EligibilityCalculator, EventAttendance};
use crate::error::IssuanceError;

pub const VALIDATION_SUFFIX_LEN: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct IssuanceFailure {
    pub user_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IssuanceReport {
    pub issued: usize,
    /// Ineligible users plus failures.
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<IssuanceFailure>,
}

/// `CERT-<join code>-<8 random letters/digits>`.
pub fn validation_code(join_code: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..VALIDATION_SUFFIX_LEN)
        .map(|_| event::CODE_ALPHABET[rng.random_range(0..event::CODE_ALPHABET.len())] as char)
        .collect();
    format!("CERT-{join_code}-{suffix}")
}

/// SHA-256 over the holder, event and issuance instant plus a random nonce.
///
/// Two issuances never share a hash, even for the same holder and event.
pub fn content_hash(email: &str, event: &event::Model, issued_at: DateTime<Utc>) -> String {
    let nonce: u64 = rand::rng().random();
    let timestamp = issued_at
        .timestamp_nanos_opt()
        .unwrap_or_else(|| issued_at.timestamp_micros());

    let mut hasher = Sha256::new();
    hasher.update(format!("{email}|{}|{}|{timestamp}|{nonce}", event.id, event.title));
    hex::encode(hasher.finalize())
}

enum Outcome {
    Issued,
    Ineligible,
    Failed(IssuanceFailure),
}

pub struct CertificateIssuer {
    db: DatabaseConnection,
    eligibility: EligibilityCalculator,
}

impl CertificateIssuer {
    pub fn new(db: DatabaseConnection) -> Self {
        let eligibility = EligibilityCalculator::new(db.clone());
        Self { db, eligibility }
    }

    pub fn with_calculator(db: DatabaseConnection, eligibility: EligibilityCalculator) -> Self {
        Self { db, eligibility }
    }

    /// Issues or re-issues certificates for every eligible confirmed attendee.
    ///
    /// One user's failure is reported and never stops the rest of the batch.
    pub async fn issue_for_event(&self, event_id: i64) -> Result<IssuanceReport, IssuanceError> {
        let event = event::Entity::find_by_id(event_id)
            .one(&self.db)
            .await?
            .ok_or(IssuanceError::EventNotFound(event_id))?;

        let attendees = enrollment::Model::confirmed_with_users(&self.db, event_id).await?;
        let attendance = self.eligibility.assess_event(event_id).await?;

        let outcomes: Vec<Outcome> = stream::iter(attendees)
            .map(|(_, user)| self.issue_one(&event, &attendance, user))
            .buffer_unordered(config::issuance_concurrency())
            .collect()
            .await;

        let mut report = IssuanceReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Issued => report.issued += 1,
                Outcome::Ineligible => report.skipped += 1,
                Outcome::Failed(failure) => {
                    report.skipped += 1;
                    report.failed += 1;
                    report.failures.push(failure);
                }
            }
        }

        info!(
            event_id,
            issued = report.issued,
            skipped = report.skipped,
            failed = report.failed,
            "certificate issuance finished"
        );
        Ok(report)
    }

    async fn issue_one(
        &self,
        event: &event::Model,
        attendance: &EventAttendance,
        user: user::Model,
    ) -> Outcome {
        if !attendance.for_user(user.id).eligible {
            return Outcome::Ineligible;
        }

        match self.upsert_certificate(event, &user).await {
            Ok(_) => Outcome::Issued,
            Err(err) => {
                warn!(event_id = event.id, user_id = user.id, error = %err, "certificate upsert failed");
                Outcome::Failed(IssuanceFailure {
                    user_id: user.id,
                    reason: err.to_string(),
                })
            }
        }
    }

    async fn upsert_certificate(
        &self,
        event: &event::Model,
        user: &user::Model,
    ) -> Result<certificate::Model, DbErr> {
        let issued_at = Utc::now();
        certificate::Model::upsert(
            &self.db,
            CertificateFields {
                event_id: event.id,
                user_id: user.id,
                holder_name: user.name.clone(),
                validation_code: validation_code(&event.join_code),
                content_hash: content_hash(&user.email, event, issued_at),
                issued_at,
            },
        )
        .await
    }
}
