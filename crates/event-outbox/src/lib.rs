//! Durable event delivery for the viewtrack client.
//!
//! This crate provides:
//! - QueueStore: retry queue persisted in the local scope, optionally compressed
//! - DeliveryPipeline: enriches, submits, and deduplicates single events
//! - RetryScheduler: periodic sweep that re-submits due entries
//! - TaskScheduler/Clock: time seams so sweeps can be driven deterministically

mod clock;
mod error;
mod page_context;
mod pipeline;
mod queue_store;
mod retry;
mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{OutboxError, OutboxResult};
pub use page_context::PageContext;
pub use pipeline::DeliveryPipeline;
pub use queue_store::QueueStore;
pub use retry::{RetryConfig, RetryScheduler, SweepReport};
pub use scheduler::{PeriodicTask, TaskHandle, TaskScheduler, TokioScheduler};
