//! Periodic retry sweep over the durable queue.

use crate::{Clock, DeliveryPipeline, PeriodicTask, TaskHandle, TaskScheduler};
use chrono::{DateTime, Utc};
use event_protocol_types::StoredEvent;
use futures_util::FutureExt;
use participant_auth::IdentityState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Retry timing.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Time between sweeps.
    pub period: Duration,
    /// Minimum time since the last attempt before an entry is retried.
    pub retry_delay: Duration,
    /// Drop entries after this many attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60),
            retry_delay: Duration::from_secs(60),
            max_attempts: None,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries submitted this sweep.
    pub attempted: usize,
    /// Entries confirmed delivered.
    pub delivered: usize,
    /// Entries discarded without delivery (identity gone or attempts exhausted).
    pub dropped: usize,
    /// Entries left in the queue afterwards.
    pub remaining: usize,
}

fn is_entry_due(entry: &StoredEvent, now: DateTime<Utc>, retry_delay: Duration) -> bool {
    if entry.try_immediately {
        return true;
    }
    chrono::Duration::from_std(retry_delay)
        .ok()
        .and_then(|delay| entry.last_attempt.checked_add_signed(delay))
        .is_some_and(|due_at| now >= due_at)
}

/// Re-submits queued events that are due and prunes delivered ones.
pub struct RetryScheduler {
    pipeline: Arc<DeliveryPipeline>,
    identity: Arc<IdentityState>,
    clock: Arc<dyn Clock>,
    config: RetryConfig,
    sweeping: Mutex<()>,
}

impl RetryScheduler {
    pub fn new(
        pipeline: Arc<DeliveryPipeline>,
        identity: Arc<IdentityState>,
        clock: Arc<dyn Clock>,
        config: RetryConfig,
    ) -> Self {
        Self {
            pipeline,
            identity,
            clock,
            config,
            sweeping: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Register the periodic sweep. The first sweep runs right away.
    pub fn start(self: Arc<Self>, scheduler: &dyn TaskScheduler) -> TaskHandle {
        info!(
            period_secs = self.config.period.as_secs(),
            retry_delay_secs = self.config.retry_delay.as_secs(),
            "Starting retry scheduler"
        );

        let period = self.config.period;
        let task: PeriodicTask = Arc::new(move || {
            let this = self.clone();
            async move {
                this.sweep().await;
            }
            .boxed()
        });
        scheduler.run_periodically(period, task)
    }

    /// Run one sweep over the queue.
    ///
    /// A sweep that starts while another is running does nothing.
    pub async fn sweep(&self) -> SweepReport {
        let Ok(_guard) = self.sweeping.try_lock() else {
            debug!("Sweep already in progress, skipping");
            return SweepReport::default();
        };

        let queue = self.pipeline.queue();
        let mut entries = queue.load();
        let now = self.clock.now();
        let mut report = SweepReport::default();

        for index in 0..entries.len() {
            let entry = &mut entries[index];
            if entry.persisted || !is_entry_due(entry, now, self.config.retry_delay) {
                continue;
            }

            if let Some(max_attempts) = self.config.max_attempts {
                if entry.attempts >= max_attempts {
                    warn!(
                        local_uuid = %entry.local_uuid(),
                        attempts = entry.attempts,
                        max_attempts = max_attempts,
                        "Dropping event after max attempts"
                    );
                    entry.persisted = true;
                    report.dropped += 1;
                    continue;
                }
            }

            entry.attempts += 1;
            entry.try_immediately = false;

            let Some(headers) = self.identity.headers_for(&entry.participant_code) else {
                debug!(local_uuid = %entry.local_uuid(), "Dropping event without identity");
                entry.persisted = true;
                report.dropped += 1;
                continue;
            };

            report.attempted += 1;
            let event = entry.event.clone();
            let url = entry.url.clone();

            match self.pipeline.deliver(event, &url, &headers, false).await {
                Ok(true) => {
                    let local_uuid = entries[index].local_uuid().to_string();
                    for queued in entries.iter_mut() {
                        if queued.local_uuid() == local_uuid {
                            queued.persisted = true;
                        }
                    }
                    report.delivered += 1;
                }
                Ok(false) => entries[index].last_attempt = now,
                Err(err) => {
                    warn!(
                        local_uuid = %entries[index].local_uuid(),
                        error = %err,
                        "Retry attempt failed"
                    );
                    entries[index].last_attempt = now;
                }
            }
        }

        report.remaining = queue.merge_swept(&entries);

        if report.attempted > 0 || report.dropped > 0 {
            info!(
                attempted = report.attempted,
                delivered = report.delivered,
                dropped = report.dropped,
                remaining = report.remaining,
                "Retry sweep complete"
            );
        }
        report
    }
}
