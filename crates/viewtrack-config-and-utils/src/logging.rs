//! Logging initialization for the client.
//!
//! Thin wrapper over the observability package: structured JSONL goes to
//! `~/.viewtrack/logs/client.jsonl`, with `RUST_LOG` taking precedence over
//! the configured level.

use crate::Paths;
use observability::LogConfig;

/// Initialize the logging system.
///
/// Set `VIEWTRACK_LOG_STDERR=1` to mirror log lines to stderr.
pub fn init_logging(level: &str, paths: &Paths) {
    let also_stderr = std::env::var("VIEWTRACK_LOG_STDERR")
        .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    observability::init_with_config(LogConfig {
        service_name: "viewtrack".into(),
        default_level: level.to_string(),
        log_path: Some(paths.log_file()),
        also_stderr,
    });
}
