//! Event delivery pipeline.

use crate::{Clock, OutboxResult, PageContext, QueueStore};
use collector_client::Collector;
use event_protocol_types::{ApiResponse, Event, IdentityHeaders, StoredEvent};
use participant_auth::{IdentityState, SessionCoordinator};
use std::sync::Arc;
use tracing::{debug, warn};

/// Enriches events, submits them, and reconciles the retry queue with the
/// collector's answer.
pub struct DeliveryPipeline {
    identity: Arc<IdentityState>,
    sessions: Arc<SessionCoordinator>,
    collector: Arc<dyn Collector>,
    queue: Arc<QueueStore>,
    page: Arc<PageContext>,
    clock: Arc<dyn Clock>,
}

impl DeliveryPipeline {
    pub fn new(
        sessions: Arc<SessionCoordinator>,
        collector: Arc<dyn Collector>,
        queue: Arc<QueueStore>,
        page: Arc<PageContext>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identity: sessions.identity().clone(),
            sessions,
            collector,
            queue,
            page,
            clock,
        }
    }

    pub fn queue(&self) -> &Arc<QueueStore> {
        &self.queue
    }

    /// Deliver one event for the current participant.
    ///
    /// Returns `Ok(false)` without queueing when nobody is signed in, and
    /// `Ok(false)` for any transient delivery failure (the queued copy, if
    /// retained, is left for the retry sweep). Errors only when a session
    /// could not be established.
    pub async fn post_event(&self, event: Event, retain_for_retry: bool) -> OutboxResult<bool> {
        let Some(headers) = self.identity.headers() else {
            debug!(kind = event.kind.as_str(), "No participant code, event not sent");
            return Ok(false);
        };

        let url = self.collector.events_url();
        self.deliver(event, &url, &headers, retain_for_retry).await
    }

    /// Deliver under explicit identity to an explicit endpoint.
    pub(crate) async fn deliver(
        &self,
        mut event: Event,
        url: &str,
        headers: &IdentityHeaders,
        retain_for_retry: bool,
    ) -> OutboxResult<bool> {
        if event.context.is_none() {
            event.context = self.page.referrer();
        }
        event.extension_version = Some(self.page.client_version().to_string());
        event.tab_active = self.page.tab_active();

        if event.session_uuid.is_none() {
            event.session_uuid = Some(self.sessions.ensure_session().await?);
        }

        if retain_for_retry {
            self.queue.enqueue(StoredEvent::first_attempt(
                event.clone(),
                url,
                headers.participant_code(),
                self.clock.now(),
            ));
        }

        if event.url.is_none() {
            event.url = self.page.location();
        }

        let response = match self.collector.submit_event(url, &event, headers).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    local_uuid = %event.local_uuid,
                    kind = event.kind.as_str(),
                    error = %err,
                    "Event submission failed"
                );
                return Ok(false);
            }
        };

        if response.is_delivered() {
            let removed = self.queue.remove_by_local_uuid(&event.local_uuid);
            debug!(
                local_uuid = %event.local_uuid,
                kind = event.kind.as_str(),
                removed = removed,
                "Event delivered"
            );
            return Ok(true);
        }

        if let ApiResponse::Failure { code, message } = &response {
            warn!(
                local_uuid = %event.local_uuid,
                code = %code,
                message = %message,
                "Collector rejected event"
            );
        }
        Ok(false)
    }
}
