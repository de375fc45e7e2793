//! Timer seam: "run after a delay" and "run periodically".

use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Work run on every tick of a periodic schedule.
pub type PeriodicTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Handle to scheduled work. Dropping it leaves the work running.
pub struct TaskHandle {
    handle: JoinHandle<()>,
}

impl TaskHandle {
    /// Stop the scheduled work.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Schedules deferred and recurring work.
pub trait TaskScheduler: Send + Sync {
    /// Run `task` once after `delay`.
    fn run_after(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TaskHandle;

    /// Run `task` every `period`, the first time immediately.
    ///
    /// A tick never overlaps the previous one; a slow run delays the
    /// following ticks instead of bunching them up.
    fn run_periodically(&self, period: Duration, task: PeriodicTask) -> TaskHandle;
}

/// Scheduler backed by the ambient Tokio runtime.
///
/// Must be used from within a runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl TaskScheduler for TokioScheduler {
    fn run_after(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TaskHandle {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        TaskHandle { handle }
    }

    fn run_periodically(&self, period: Duration, task: PeriodicTask) -> TaskHandle {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                debug!(period_secs = period.as_secs(), "Periodic task tick");
                task().await;
            }
        });
        TaskHandle { handle }
    }
}
