//! Participant identity, session bootstrap, and participant config.
//!
//! - [`IdentityState`]: participant code and session identifier, cached in
//!   memory and backed by the local/session stores, with logout reset.
//! - [`SessionCoordinator`]: obtains a session identifier from the collector,
//!   coalescing concurrent requests into a single call.
//! - [`ParticipantConfigFetcher`]: fetches and caches the participant config.

mod error;
mod identity;
mod participant_config;
mod session;

pub use error::{AuthError, AuthResult};
pub use identity::{IdentityState, LogoutListener};
pub use participant_config::ParticipantConfigFetcher;
pub use session::SessionCoordinator;
