//! In-process collector for tests.
//!
//! Behaves like the real collector where it matters to the client: events
//! are stored once per `localUuid` and a repeat is answered with
//! `EVENT_ALREADY_EXISTS_OK`. It can be taken offline, forced to reject
//! events, and slowed down on session creation.

use crate::{Collector, CollectorError, CollectorResult};
use async_trait::async_trait;
use event_protocol_types::{
    ApiResponse, CreateSessionData, Event, IdentityHeaders, ParticipantConfig,
    EVENT_ALREADY_EXISTS_OK,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// A submission as seen by the collector.
#[derive(Debug, Clone)]
pub struct Submission {
    pub event: Event,
    pub participant_code: String,
}

pub struct ScriptedCollector {
    events_url: String,
    online: AtomicBool,
    submissions: Mutex<Vec<Submission>>,
    stored: Mutex<Vec<Event>>,
    event_failure: Mutex<Option<(String, String)>>,
    session_calls: AtomicUsize,
    session_delay: Mutex<Duration>,
    session_failure: Mutex<Option<String>>,
    config: Mutex<Option<ParticipantConfig>>,
    config_calls: AtomicUsize,
}

impl Default for ScriptedCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCollector {
    pub fn new() -> Self {
        Self {
            events_url: "https://collector.test/events".to_string(),
            online: AtomicBool::new(true),
            submissions: Mutex::new(Vec::new()),
            stored: Mutex::new(Vec::new()),
            event_failure: Mutex::new(None),
            session_calls: AtomicUsize::new(0),
            session_delay: Mutex::new(Duration::ZERO),
            session_failure: Mutex::new(None),
            config: Mutex::new(None),
            config_calls: AtomicUsize::new(0),
        }
    }

    /// Take the collector offline (every call fails at the transport level).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Answer every event submission with this failure.
    pub fn fail_events_with(&self, code: &str, message: &str) {
        *self.event_failure.lock() = Some((code.to_string(), message.to_string()));
    }

    pub fn clear_event_failure(&self) {
        *self.event_failure.lock() = None;
    }

    /// Mark an event as already stored server-side.
    pub fn preload_event(&self, event: Event) {
        self.stored.lock().push(event);
    }

    /// Delay applied to every session creation call.
    pub fn set_session_delay(&self, delay: Duration) {
        *self.session_delay.lock() = delay;
    }

    /// Reject session creation with this message.
    pub fn fail_sessions_with(&self, message: &str) {
        *self.session_failure.lock() = Some(message.to_string());
    }

    pub fn set_config(&self, config: ParticipantConfig) {
        *self.config.lock() = Some(config);
    }

    /// Every submission attempt, including failed and duplicate ones.
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }

    /// Events the collector stored, once each.
    pub fn stored_events(&self) -> Vec<Event> {
        self.stored.lock().clone()
    }

    /// How many times an event with this id was stored (at most once).
    pub fn stored_count(&self, local_uuid: &str) -> usize {
        self.stored
            .lock()
            .iter()
            .filter(|event| event.local_uuid == local_uuid)
            .count()
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn config_calls(&self) -> usize {
        self.config_calls.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> CollectorResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CollectorError::Unavailable("offline".to_string()))
        }
    }
}

#[async_trait]
impl Collector for ScriptedCollector {
    fn events_url(&self) -> String {
        self.events_url.clone()
    }

    async fn submit_event(
        &self,
        _url: &str,
        event: &Event,
        headers: &IdentityHeaders,
    ) -> CollectorResult<ApiResponse<Value>> {
        self.submissions.lock().push(Submission {
            event: event.clone(),
            participant_code: headers.participant_code().to_string(),
        });
        self.ensure_online()?;

        if let Some((code, message)) = self.event_failure.lock().clone() {
            return Ok(ApiResponse::failure(code, message));
        }

        let mut stored = self.stored.lock();
        if stored.iter().any(|e| e.local_uuid == event.local_uuid) {
            return Ok(ApiResponse::failure(
                EVENT_ALREADY_EXISTS_OK,
                "event already stored",
            ));
        }
        stored.push(event.clone());
        Ok(ApiResponse::Success { data: None })
    }

    async fn create_session(
        &self,
        _headers: &IdentityHeaders,
    ) -> CollectorResult<ApiResponse<CreateSessionData>> {
        let call = self.session_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.session_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.ensure_online()?;

        if let Some(message) = self.session_failure.lock().clone() {
            return Ok(ApiResponse::failure("SESSION_REJECTED", message));
        }
        Ok(ApiResponse::success(CreateSessionData {
            session_uuid: format!("session-{}", call),
        }))
    }

    async fn fetch_config(
        &self,
        _headers: &IdentityHeaders,
    ) -> CollectorResult<ApiResponse<ParticipantConfig>> {
        self.config_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;

        match self.config.lock().clone() {
            Some(config) => Ok(ApiResponse::success(config)),
            None => Ok(ApiResponse::failure("CONFIG_NOT_FOUND", "no config")),
        }
    }
}
