pub mod models;
pub mod test_utils;

use sea_orm::{Database, DatabaseConnection, DbErr, SqlErr};
use std::path::Path;
use util::config;

pub async fn connect() -> Result<DatabaseConnection, DbErr> {
    let path_or_url = config::database_path();
    // If it's already a DSN, use it as-is; otherwise treat it as a SQLite file path.
    let url = if path_or_url.starts_with("sqlite:") {
        path_or_url
    } else {
        // SQLite won't create intermediate dirs.
        if let Some(parent) = Path::new(&path_or_url).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        format!("sqlite://{path_or_url}?mode=rwc")
    };

    tracing::debug!(%url, "connecting to database");
    Database::connect(&url).await
}

/// True when `err` is a unique/primary-key constraint violation.
///
/// Callers use this to turn a lost insert race into the matching domain outcome.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
        || err.to_string().contains("UNIQUE constraint failed")
}
