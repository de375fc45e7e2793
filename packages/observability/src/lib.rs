//! # Observability
//!
//! Centralized logging setup for the viewtrack workspace.
//!
//! Crates are **log producers** only: they use the standard `tracing` macros
//! and know nothing about where the output goes. The binary calls
//! [`init`] or [`init_with_config`] once at startup.
//!
//! By default every line is written as JSON to `~/.viewtrack/logs/client.jsonl`
//! (append-only, flushed per line), so the file can be followed with
//! `tail -f ~/.viewtrack/logs/client.jsonl | jq`.
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "viewtrack".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//!     tracing::info!("client started");
//! }
//! ```

mod writer;

pub use writer::{CentralLogWriter, WriterFactory};

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, attached to the startup line.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.viewtrack/logs/client.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit compact logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Central log file location.
fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".viewtrack").join("logs").join("client.jsonl"))
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize logging with default settings for the named service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// Installs the JSONL file layer and, when requested, a compact stderr layer.
/// If the log file cannot be opened the subscriber falls back to stderr.
/// Calling this more than once is a no-op.
pub fn init_with_config(config: LogConfig) {
    let log_path = config.log_path.clone().or_else(default_log_path);

    let file_writer = match log_path.as_deref().map(CentralLogWriter::new) {
        Some(Ok(writer)) => Some(writer),
        Some(Err(err)) => {
            eprintln!("observability: failed to open log file {:?}: {}", log_path, err);
            None
        }
        None => None,
    };
    let want_stderr = config.also_stderr || file_writer.is_none();

    let file_layer = file_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_target(true)
            .with_writer(WriterFactory::new(writer))
            .with_filter(env_filter(&config.default_level))
    });

    let stderr_layer = want_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter(&config.default_level))
    });

    let installed = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            service = %config.service_name,
            log_path = ?log_path,
            pid = std::process::id(),
            "observability initialized"
        );
    }
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
