use chrono::{DateTime, NaiveDate, Utc};
use db::models::certificate;
use db::models::event;
use db::models::user;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use serde::Serialize;

pub const NOT_INFORMED: &str = "Not informed";

/// Everything a public verification page shows for one certificate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateView {
    pub holder_name: String,
    pub holder_email: String,
    pub validation_code: String,
    pub content_hash: String,
    pub issued_at: DateTime<Utc>,
    pub event_title: String,
    pub campus: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub workload_hours: String,
    pub coordinator: String,
}

fn informed(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| NOT_INFORMED.to_owned())
}

impl CertificateView {
    fn assemble(cert: certificate::Model, event: event::Model, holder: Option<user::Model>) -> Self {
        Self {
            holder_name: cert.holder_name,
            holder_email: informed(holder.map(|u| u.email)),
            validation_code: cert.validation_code,
            content_hash: cert.content_hash,
            issued_at: cert.issued_at,
            event_title: event.title,
            campus: informed(event.campus),
            start_date: event.start_date,
            end_date: event.end_date,
            workload_hours: informed(event.workload_hours.map(|h| h.to_string())),
            coordinator: informed(event.coordinator),
        }
    }
}

pub struct CertificateLookup {
    db: DatabaseConnection,
}

impl CertificateLookup {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a certificate by content hash, falling back to validation code.
    pub async fn resolve(&self, code_or_hash: &str) -> Result<Option<CertificateView>, DbErr> {
        let needle = code_or_hash.trim();
        if needle.is_empty() {
            return Ok(None);
        }

        let cert = match certificate::Model::find_by_content_hash(&self.db, needle).await? {
            Some(cert) => cert,
            None => match certificate::Model::find_by_validation_code(&self.db, needle).await? {
                Some(cert) => cert,
                None => return Ok(None),
            },
        };

        let Some(event) = event::Entity::find_by_id(cert.event_id).one(&self.db).await? else {
            return Ok(None);
        };
        let holder = user::Entity::find_by_id(cert.user_id).one(&self.db).await?;

        Ok(Some(CertificateView::assemble(cert, event, holder)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{date, EventFixture, Seed};
    use db::models::certificate::CertificateFields;

    async fn stored(seed: &Seed, fixture: EventFixture) -> certificate::Model {
        let ev = seed.event(fixture).await;
        let user = seed.user("Alice Souza", "alice@example.com", None).await;
        certificate::Model::upsert(
            &seed.db,
            CertificateFields {
                event_id: ev.id,
                user_id: user.id,
                holder_name: user.name.clone(),
                validation_code: format!("CERT-{}-ABCD1234", ev.join_code),
                content_hash: "f".repeat(64),
                issued_at: Utc::now(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn resolves_by_either_identifier() {
        let seed = Seed::new().await;
        let mut fixture = EventFixture::remote(date(2025, 3, 10), date(2025, 3, 11));
        fixture.campus = Some("North".into());
        fixture.coordinator = Some("Dr. Lima".into());
        fixture.workload_hours = Some(8);
        let cert = stored(&seed, fixture).await;
        let lookup = CertificateLookup::new(seed.db.clone());

        let by_code = lookup.resolve(&cert.validation_code).await.unwrap().unwrap();
        let by_hash = lookup
            .resolve(&format!("  {}\n", cert.content_hash))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_code, by_hash);
        assert_eq!(by_code.holder_name, "Alice Souza");
        assert_eq!(by_code.holder_email, "alice@example.com");
        assert_eq!(by_code.campus, "North");
        assert_eq!(by_code.workload_hours, "8");
        assert_eq!(by_code.coordinator, "Dr. Lima");
        assert_eq!(by_code.start_date, date(2025, 3, 10));
    }

    #[tokio::test]
    async fn missing_details_render_placeholder() {
        let seed = Seed::new().await;
        let cert = stored(&seed, EventFixture::remote(date(2025, 3, 10), date(2025, 3, 10))).await;

        let view = CertificateLookup::new(seed.db.clone())
            .resolve(&cert.validation_code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.campus, NOT_INFORMED);
        assert_eq!(view.coordinator, NOT_INFORMED);
        assert_eq!(view.workload_hours, NOT_INFORMED);
    }

    #[tokio::test]
    async fn unknown_or_partial_input_finds_nothing() {
        let seed = Seed::new().await;
        let cert = stored(&seed, EventFixture::remote(date(2025, 3, 10), date(2025, 3, 10))).await;
        let lookup = CertificateLookup::new(seed.db.clone());

        assert!(lookup.resolve("CERT-NOPE-00000000").await.unwrap().is_none());
        assert!(lookup.resolve("   ").await.unwrap().is_none());
        assert!(lookup.resolve(&cert.validation_code[..10]).await.unwrap().is_none());
        assert!(lookup
            .resolve(&cert.validation_code.to_lowercase())
            .await
            .unwrap()
            .is_none());
    }
}
