use std::collections::HashMap;

use db::models::attendance_record;
use sea_orm::{DatabaseConnection, DbErr};
use serde::Serialize;
use util::config;

/// Rounded attendance percentage. An event with no attendance yet counts as
/// one day so the ratio stays defined.
pub fn ratio_percent(days_present: u64, total_days: u64) -> u32 {
    let total = total_days.max(1);
    let ratio = (100.0 * days_present as f64 / total as f64).round();
    ratio.clamp(0.0, u32::MAX as f64) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    pub days_present: u64,
    pub total_days: u64,
    pub ratio_percent: u32,
    pub eligible: bool,
}

/// Attendance snapshot for a whole event.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventAttendance {
    /// Distinct days on which anyone checked in.
    pub total_days: u64,
    pub days_by_user: HashMap<i64, u64>,
    threshold_percent: u32,
}

impl EventAttendance {
    pub fn for_user(&self, user_id: i64) -> Eligibility {
        let days_present = self.days_by_user.get(&user_id).copied().unwrap_or(0);
        let ratio = ratio_percent(days_present, self.total_days);
        Eligibility {
            days_present,
            total_days: self.total_days,
            ratio_percent: ratio,
            eligible: ratio >= self.threshold_percent,
        }
    }
}

pub struct EligibilityCalculator {
    db: DatabaseConnection,
    threshold_percent: u32,
}

impl EligibilityCalculator {
    /// Uses the configured `ELIGIBILITY_THRESHOLD_PERCENT`.
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_threshold(db, config::eligibility_threshold_percent())
    }

    pub fn with_threshold(db: DatabaseConnection, threshold_percent: u32) -> Self {
        Self {
            db,
            threshold_percent,
        }
    }

    pub fn threshold_percent(&self) -> u32 {
        self.threshold_percent
    }

    pub async fn eligibility_ratio(&self, event_id: i64, user_id: i64) -> Result<u32, DbErr> {
        Ok(self.assess(event_id, user_id).await?.ratio_percent)
    }

    pub async fn assess(&self, event_id: i64, user_id: i64) -> Result<Eligibility, DbErr> {
        let total_days = attendance_record::Model::distinct_days(&self.db, event_id)
            .await?
            .len() as u64;
        let days_present =
            attendance_record::Model::count_for_user(&self.db, event_id, user_id).await?;
        let ratio = ratio_percent(days_present, total_days);

        Ok(Eligibility {
            days_present,
            total_days,
            ratio_percent: ratio,
            eligible: ratio >= self.threshold_percent,
        })
    }

    /// Two queries regardless of how many users attended.
    pub async fn assess_event(&self, event_id: i64) -> Result<EventAttendance, DbErr> {
        let total_days = attendance_record::Model::distinct_days(&self.db, event_id)
            .await?
            .len() as u64;
        let days_by_user = attendance_record::Model::counts_by_user(&self.db, event_id).await?;

        Ok(EventAttendance {
            total_days,
            days_by_user,
            threshold_percent: self.threshold_percent,
        })
    }
}
