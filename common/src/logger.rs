use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global tracing subscriber.
///
/// Logs always go to a daily-rolling file under the directory of `log_file`
/// (or `logs/` for a bare file name); `log_to_stdout` adds an ANSI stdout layer.
/// `log_level` is an `EnvFilter` directive such as `services=info,db=warn`.
///
/// Keep the returned guard alive for the lifetime of the process, dropping it
/// flushes the file writer.
pub fn init_logging(log_file: &str, log_level: &str, log_to_stdout: bool) -> WorkerGuard {
    let (dir, file_name) = split_log_path(log_file);
    fs::create_dir_all(&dir).ok();

    let file_appender = rolling::daily(&dir, &file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = log_to_stdout.then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(true)
    });

    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    // try_init: a second call (tests, embedding apps) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init();

    guard
}

fn split_log_path(log_file: &str) -> (String, String) {
    let path = Path::new(log_file);
    let file_name = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app.log".to_string());
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_string_lossy().into_owned(),
        _ => "logs".to_string(),
    };
    (dir, file_name)
}
