//! Process-wide client facade.

use crate::ClientResult;
use collector_client::{Collector, HttpCollector};
use event_outbox::{
    Clock, DeliveryPipeline, PageContext, QueueStore, RetryConfig, RetryScheduler, SweepReport,
    SystemClock, TaskHandle, TaskScheduler,
};
use event_protocol_types::{Event, IdentityHeaders, ParticipantConfig};
use parking_lot::Mutex;
use participant_auth::{IdentityState, ParticipantConfigFetcher, SessionCoordinator};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use viewtrack_config_and_utils::{Config, Paths};
use viewtrack_storage::{FileStore, MemoryStore, Stores};

/// Tunables taken from [`Config`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub client_version: String,
    pub compress_queue: bool,
    pub retry: RetryConfig,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ClientOptions {
    fn from(config: &Config) -> Self {
        Self {
            client_version: config.client_version.clone(),
            compress_queue: config.compress_queue,
            retry: RetryConfig {
                period: config.retry_period(),
                retry_delay: config.retry_delay(),
                max_attempts: config.max_retry_attempts,
            },
        }
    }
}

/// Snapshot of client state for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub participant_code: Option<String>,
    pub session_uuid: Option<String>,
    pub pending_events: usize,
    pub retry_running: bool,
}

/// What became of a page view handed to [`InstrumentationClient::send_page_view`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageViewOutcome {
    /// The collector stored the event.
    Delivered,
    /// Not delivered yet; the retry sweep will resend it.
    Queued,
    /// Dropped: nobody is signed in, or no session could be obtained.
    NotSent,
}

/// The instrumentation client.
pub struct InstrumentationClient {
    identity: Arc<IdentityState>,
    sessions: Arc<SessionCoordinator>,
    pipeline: Arc<DeliveryPipeline>,
    retry: Arc<RetryScheduler>,
    config_fetcher: ParticipantConfigFetcher,
    page: Arc<PageContext>,
    retry_task: Mutex<Option<TaskHandle>>,
}

impl InstrumentationClient {
    pub fn new(
        stores: Stores,
        collector: Arc<dyn Collector>,
        clock: Arc<dyn Clock>,
        options: ClientOptions,
    ) -> Self {
        let identity = Arc::new(IdentityState::new(stores.clone()));
        let sessions = Arc::new(SessionCoordinator::new(identity.clone(), collector.clone()));
        let queue = Arc::new(QueueStore::new(stores.local.clone(), options.compress_queue));
        let page = Arc::new(PageContext::new(options.client_version));

        let pipeline = Arc::new(DeliveryPipeline::new(
            sessions.clone(),
            collector.clone(),
            queue,
            page.clone(),
            clock.clone(),
        ));
        let retry = Arc::new(RetryScheduler::new(
            pipeline.clone(),
            identity.clone(),
            clock,
            options.retry,
        ));
        let config_fetcher =
            ParticipantConfigFetcher::new(identity.clone(), collector, stores.local.clone());

        Self {
            identity,
            sessions,
            pipeline,
            retry,
            config_fetcher,
            page,
            retry_task: Mutex::new(None),
        }
    }

    /// Build a client persisting under `paths` and talking HTTP to the
    /// configured collector. The session scope lives in memory.
    pub fn from_config(config: &Config, paths: &Paths) -> ClientResult<Self> {
        paths.ensure_dirs()?;

        let local = Arc::new(FileStore::open(paths.storage_file())?);
        let session = Arc::new(MemoryStore::new());
        let stores = Stores::namespaced(&config.storage_namespace, local, session);

        let collector = Arc::new(HttpCollector::new(
            config.collector_url()?.as_str(),
            config.request_timeout(),
        )?);

        info!(
            collector_url = %config.collector_url,
            storage = %paths.storage_file().display(),
            "Client initialized"
        );
        Ok(Self::new(
            stores,
            collector,
            Arc::new(SystemClock),
            ClientOptions::from(config),
        ))
    }

    /// Start the periodic retry sweep. The first sweep runs immediately.
    ///
    /// Does nothing if already started.
    pub fn start(&self, scheduler: &dyn TaskScheduler) {
        let mut task = self.retry_task.lock();
        if task.is_some() {
            return;
        }
        *task = Some(self.retry.clone().start(scheduler));
    }

    /// Stop the periodic retry sweep.
    pub fn stop(&self) {
        if let Some(task) = self.retry_task.lock().take() {
            task.cancel();
            info!("Retry scheduler stopped");
        }
    }

    /// Deliver an event; see [`DeliveryPipeline::post_event`].
    pub async fn post_event(&self, event: Event, retain_for_retry: bool) -> ClientResult<bool> {
        Ok(self.pipeline.post_event(event, retain_for_retry).await?)
    }

    /// Record a page view for the current page.
    ///
    /// Failures are logged, not returned. The event is only queued for retry
    /// once a session exists, so a failed session request drops it.
    pub async fn send_page_view(&self) -> PageViewOutcome {
        let event = Event::page_view();
        let local_uuid = event.local_uuid.clone();

        match self.pipeline.post_event(event, true).await {
            Ok(true) => PageViewOutcome::Delivered,
            Ok(false) if self.pipeline.queue().contains(&local_uuid) => PageViewOutcome::Queued,
            Ok(false) => PageViewOutcome::NotSent,
            Err(err) => {
                warn!(error = %err, "Page view not sent");
                PageViewOutcome::NotSent
            }
        }
    }

    /// Run one retry sweep now.
    pub async fn flush(&self) -> SweepReport {
        self.retry.sweep().await
    }

    pub fn set_tab_active(&self, active: Option<bool>) {
        self.page.set_tab_active(active);
    }

    /// Record a navigation to `location`.
    pub fn set_page(&self, location: Option<String>, referrer: Option<String>) {
        self.page.set_page(location, referrer);
    }

    pub fn set_auth(&self, code: &str) -> ClientResult<()> {
        Ok(self.identity.set_auth(code)?)
    }

    pub fn get_auth(&self) -> Option<String> {
        self.identity.get_auth()
    }

    pub fn get_session(&self) -> Option<String> {
        self.identity.get_session()
    }

    pub fn get_headers(&self) -> Option<IdentityHeaders> {
        self.identity.headers()
    }

    pub async fn ensure_session(&self) -> ClientResult<String> {
        Ok(self.sessions.ensure_session().await?)
    }

    pub async fn new_session(&self) -> ClientResult<String> {
        Ok(self.sessions.new_session().await?)
    }

    pub fn logged_in_youtube(&self) -> bool {
        self.identity.logged_in_youtube()
    }

    pub fn set_logged_in_youtube(&self, logged_in: bool) -> ClientResult<()> {
        Ok(self.identity.set_logged_in_youtube(logged_in)?)
    }

    /// Clear identity, session, queue, and cached config, then notify
    /// listeners.
    pub fn logout(&self) {
        self.identity.logout();
    }

    pub fn add_on_logout_listener<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.identity.add_on_logout_listener(listener);
    }

    pub async fn get_config(&self) -> ClientResult<ParticipantConfig> {
        Ok(self.config_fetcher.get_config().await?)
    }

    pub fn cached_config(&self) -> Option<ParticipantConfig> {
        self.config_fetcher.cached_config()
    }

    pub fn queue_status(&self) -> QueueStatus {
        QueueStatus {
            participant_code: self.identity.get_auth(),
            session_uuid: self.identity.get_session(),
            pending_events: self.pipeline.queue().pending_count(),
            retry_running: self.retry_task.lock().is_some(),
        }
    }
}

impl Drop for InstrumentationClient {
    fn drop(&mut self) {
        if let Some(task) = self.retry_task.get_mut().take() {
            task.cancel();
        }
    }
}
