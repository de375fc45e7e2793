//! Configuration, paths, and logging setup for the viewtrack client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_COLLECTOR_URL, DEFAULT_LOG_LEVEL, DEFAULT_RETRY_PERIOD_SECS};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
