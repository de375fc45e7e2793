//! Client for the viewtrack event collector.
//!
//! [`Collector`] is the seam the rest of the client talks to. [`HttpCollector`]
//! implements it over HTTPS; the `testing` feature adds an in-process
//! implementation for test suites.

mod error;
mod http;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{CollectorError, CollectorResult};
pub use http::HttpCollector;

use async_trait::async_trait;
use event_protocol_types::{
    ApiResponse, CreateSessionData, Event, IdentityHeaders, ParticipantConfig,
};
use serde_json::Value;

/// Remote collector operations.
#[async_trait]
pub trait Collector: Send + Sync {
    /// URL events are posted to. Recorded on queued entries so a retry goes
    /// to the same endpoint.
    fn events_url(&self) -> String;

    /// Submit one enriched event.
    async fn submit_event(
        &self,
        url: &str,
        event: &Event,
        headers: &IdentityHeaders,
    ) -> CollectorResult<ApiResponse<Value>>;

    /// Ask the collector for a new session identifier.
    async fn create_session(
        &self,
        headers: &IdentityHeaders,
    ) -> CollectorResult<ApiResponse<CreateSessionData>>;

    /// Fetch the participant's configuration.
    async fn fetch_config(
        &self,
        headers: &IdentityHeaders,
    ) -> CollectorResult<ApiResponse<ParticipantConfig>>;
}
