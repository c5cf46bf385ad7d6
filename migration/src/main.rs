use std::{fs, path::Path, process::ExitCode};

use common::logger::init_logging;
use migration::Migrator;
use util::config;

mod runner;

// Every invocation re-applies all migrations; each one is idempotent.
#[tokio::main]
async fn main() -> ExitCode {
    let _log_guard = init_logging(
        &config::log_file(),
        &config::log_level(),
        config::log_to_stdout(),
    );

    let db_path = config::database_path();
    let url = format!("sqlite://{}?mode=rwc", db_path);
    let args: Vec<String> = std::env::args().collect();

    tracing::info!(
        project = %config::project_name(),
        env = %config::env(),
        db = %db_path,
        command = args.get(1).map(String::as_str).unwrap_or("up"),
        "migration command started"
    );

    let result = match args.get(1).map(|s| s.as_str()) {
        Some("clean") => {
            remove_db_file(&db_path);
            Ok(())
        }
        Some("fresh") => {
            remove_db_file(&db_path);
            create_db_dir(&db_path);
            runner::run_all_migrations(&url).await
        }
        _ => {
            create_db_dir(&db_path);
            runner::run_all_migrations(&url).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "migration failed");
            eprintln!("Migration failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn remove_db_file(path: &str) {
    let db_path = Path::new(path);
    if !db_path.exists() {
        println!("DB file does not exist: {}", db_path.display());
        return;
    }
    match fs::remove_file(db_path) {
        Ok(()) => println!("Deleted DB: {}", db_path.display()),
        Err(err) => eprintln!("Failed to delete {}: {err}", db_path.display()),
    }
}

fn create_db_dir(path: &str) {
    if let Some(parent) = Path::new(path).parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            eprintln!("Failed to create DB directory {}: {err}", parent.display());
        }
    }
}
