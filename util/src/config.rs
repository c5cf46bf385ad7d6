//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    /// Geofence radius given to new events when the organizer does not set one.
    pub default_radius_meters: i32,
    /// Minimum attendance percentage required for a certificate.
    pub eligibility_threshold_percent: u32,
    /// How many certificate upserts run at once during bulk issuance.
    pub issuance_concurrency: usize,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Missing or malformed values fall back to their defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "event-attendance".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "services=info,db=info,migration=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "attendance.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/attendance.db".into()),
            default_radius_meters: parsed_or("DEFAULT_RADIUS_METERS", 100),
            eligibility_threshold_percent: parsed_or("ELIGIBILITY_THRESHOLD_PERCENT", 75),
            issuance_concurrency: parsed_or("ISSUANCE_CONCURRENCY", 8usize).max(1),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// A poisoned lock still yields the last written configuration.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = AppConfig::from_env();
        }
    }

    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_log_file(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_file = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_default_radius_meters(value: i32) {
        AppConfig::set_field(|cfg| cfg.default_radius_meters = value);
    }

    pub fn set_eligibility_threshold_percent(value: u32) {
        AppConfig::set_field(|cfg| cfg.eligibility_threshold_percent = value);
    }

    pub fn set_issuance_concurrency(value: usize) {
        AppConfig::set_field(|cfg| cfg.issuance_concurrency = value.max(1));
    }
}

// --- Free accessors ---

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

pub fn default_radius_meters() -> i32 {
    AppConfig::global().default_radius_meters
}

pub fn eligibility_threshold_percent() -> u32 {
    AppConfig::global().eligibility_threshold_percent
}

pub fn issuance_concurrency() -> usize {
    AppConfig::global().issuance_concurrency
}
