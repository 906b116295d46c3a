//! Logging Infrastructure
//!
//! `tracing` fmt subscriber; level from `LOG_LEVEL` (any `EnvFilter`
//! directive), optional daily rolling file in `LOG_DIR`.

use std::path::Path;
use tracing_subscriber::EnvFilter;

type InitResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Initialize the logger at `info`, stdout only
pub fn init_logger() -> InitResult {
    init_logger_with_file(None, None)
}

/// Initialize the logger with optional file output
///
/// Falls back to stdout when `log_dir` does not exist.
pub fn init_logger_with_file(
    log_level: Option<&str>,
    log_dir: Option<&str>,
) -> InitResult {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir {
        let log_path = Path::new(dir);
        if log_path.is_dir() {
            let file_appender = tracing_appender::rolling::daily(log_path, "draft-sync");
            return subscriber.with_ansi(false).with_writer(file_appender).try_init();
        }
    }

    subscriber.try_init()
}
