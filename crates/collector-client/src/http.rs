//! HTTP collector client.

use crate::{Collector, CollectorError, CollectorResult};
use async_trait::async_trait;
use event_protocol_types::{
    ApiResponse, CreateSessionData, Event, IdentityHeaders, ParticipantConfig,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::{debug, warn};

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Collector reached over HTTP(S).
#[derive(Clone)]
pub struct HttpCollector {
    http_client: Client,
    base_url: String,
}

impl HttpCollector {
    /// Create a client for the collector rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> CollectorResult<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            http_client,
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn with_identity(request: RequestBuilder, headers: &IdentityHeaders) -> RequestBuilder {
        headers
            .pairs()
            .into_iter()
            .fold(request, |request, (name, value)| request.header(name, value))
    }
}

/// Interpret a collector response.
///
/// A failure envelope is returned as-is whatever the status; anything else
/// must be a success status with a parseable envelope.
async fn read_envelope<T: DeserializeOwned>(response: Response) -> CollectorResult<ApiResponse<T>> {
    let status = response.status();
    let body = response.text().await?;

    match serde_json::from_str::<ApiResponse<T>>(&body) {
        Ok(envelope @ ApiResponse::Failure { .. }) => Ok(envelope),
        Ok(envelope) if status.is_success() => Ok(envelope),
        Ok(_) => Err(CollectorError::Status {
            status: status.as_u16(),
            body_summary: summarize_response_body(&body),
        }),
        Err(err) if status.is_success() => {
            warn!(status = %status, body_summary = %summarize_response_body(&body), "Malformed collector response");
            Err(CollectorError::Json(err))
        }
        Err(_) => Err(CollectorError::Status {
            status: status.as_u16(),
            body_summary: summarize_response_body(&body),
        }),
    }
}

#[async_trait]
impl Collector for HttpCollector {
    fn events_url(&self) -> String {
        self.endpoint("events")
    }

    async fn submit_event(
        &self,
        url: &str,
        event: &Event,
        headers: &IdentityHeaders,
    ) -> CollectorResult<ApiResponse<Value>> {
        debug!(url = %url, local_uuid = %event.local_uuid, kind = event.kind.as_str(), "Submitting event");

        let request = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .json(event);
        let response = Self::with_identity(request, headers).send().await?;

        read_envelope(response).await
    }

    async fn create_session(
        &self,
        headers: &IdentityHeaders,
    ) -> CollectorResult<ApiResponse<CreateSessionData>> {
        let url = self.endpoint("sessions");
        debug!(url = %url, "Creating session");

        let request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .body("{}");
        let response = Self::with_identity(request, headers).send().await?;

        read_envelope(response).await
    }

    async fn fetch_config(
        &self,
        headers: &IdentityHeaders,
    ) -> CollectorResult<ApiResponse<ParticipantConfig>> {
        let url = self.endpoint("config");
        debug!(url = %url, "Fetching participant config");

        let request = self
            .http_client
            .get(&url)
            .header("Accept", "application/json");
        let response = Self::with_identity(request, headers).send().await?;

        read_envelope(response).await
    }
}
