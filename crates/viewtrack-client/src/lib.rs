//! Viewtrack instrumentation client.
//!
//! [`InstrumentationClient`] wires the pieces together: identity and session
//! state, the delivery pipeline, the durable retry queue, and its periodic
//! sweep. Construct one per process and share it.

mod client;
mod error;

pub use client::{ClientOptions, InstrumentationClient, PageViewOutcome, QueueStatus};
pub use error::{ClientError, ClientResult};
