//! Participant identity state.

use crate::{AuthError, AuthResult};
use event_protocol_types::IdentityHeaders;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};
use viewtrack_storage::{KeyValueStore, StorageKeys, Stores};

/// Callback run after logout has cleared all persisted state.
pub type LogoutListener = Arc<dyn Fn() + Send + Sync>;

/// Keys removed from the local scope on logout.
const LOGOUT_LOCAL_KEYS: [&str; 4] = [
    StorageKeys::PARTICIPANT_CODE,
    StorageKeys::EVENTS,
    StorageKeys::EVENTS_COMPRESSED,
    StorageKeys::CONFIG,
];

/// Participant code and session identifier for this process.
///
/// Values are cached in memory and written through to storage: the
/// participant code to the local scope, the session identifier to the
/// session scope. A session identifier only means something while a
/// participant code is set.
pub struct IdentityState {
    stores: Stores,
    participant_code: RwLock<Option<String>>,
    session_uuid: RwLock<Option<String>>,
    listeners: Mutex<Vec<LogoutListener>>,
}

fn read_key(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value.filter(|v| !v.is_empty()),
        Err(err) => {
            warn!(key = %key, error = %err, "Failed to read identity key");
            None
        }
    }
}

impl IdentityState {
    /// Hydrate identity from storage.
    pub fn new(stores: Stores) -> Self {
        let participant_code = read_key(stores.local.as_ref(), StorageKeys::PARTICIPANT_CODE);
        let session_uuid = participant_code
            .as_ref()
            .and_then(|_| read_key(stores.session.as_ref(), StorageKeys::SESSION_UUID));

        debug!(
            has_participant = participant_code.is_some(),
            has_session = session_uuid.is_some(),
            "Loaded identity state"
        );

        Self {
            stores,
            participant_code: RwLock::new(participant_code),
            session_uuid: RwLock::new(session_uuid),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Persist and adopt a participant code.
    ///
    /// Switching to a different participant drops the previous session.
    pub fn set_auth(&self, code: &str) -> AuthResult<()> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::MissingIdentity);
        }

        let mut current = self.participant_code.write();
        self.stores.local.set(StorageKeys::PARTICIPANT_CODE, code)?;

        if current.as_deref() != Some(code) {
            let mut session = self.session_uuid.write();
            if session.take().is_some() {
                self.stores.session.delete(StorageKeys::SESSION_UUID)?;
                debug!("Dropped session of previous participant");
            }
        }

        *current = Some(code.to_string());
        info!("Participant code set");
        Ok(())
    }

    /// Current participant code.
    pub fn get_auth(&self) -> Option<String> {
        self.participant_code.read().clone()
    }

    /// Cached session identifier.
    pub fn get_session(&self) -> Option<String> {
        self.session_uuid.read().clone()
    }

    /// Persist and cache a session identifier.
    pub fn set_session(&self, session_uuid: &str) -> AuthResult<()> {
        let mut session = self.session_uuid.write();
        self.stores.session.set(StorageKeys::SESSION_UUID, session_uuid)?;
        *session = Some(session_uuid.to_string());
        Ok(())
    }

    /// Headers for the current participant.
    pub fn headers(&self) -> Option<IdentityHeaders> {
        self.participant_code
            .read()
            .as_deref()
            .and_then(IdentityHeaders::new)
    }

    /// Headers for the participant an event was captured under.
    ///
    /// `None` when that code is empty or nobody is signed in any more.
    pub fn headers_for(&self, participant_code: &str) -> Option<IdentityHeaders> {
        if self.participant_code.read().is_none() {
            return None;
        }
        IdentityHeaders::new(participant_code)
    }

    pub fn logged_in_youtube(&self) -> bool {
        read_key(self.stores.local.as_ref(), StorageKeys::LOGGED_IN_YOUTUBE).as_deref()
            == Some("true")
    }

    pub fn set_logged_in_youtube(&self, logged_in: bool) -> AuthResult<()> {
        self.stores.local.set(
            StorageKeys::LOGGED_IN_YOUTUBE,
            if logged_in { "true" } else { "false" },
        )?;
        Ok(())
    }

    /// Register a callback run after every logout.
    pub fn add_on_logout_listener<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.lock().push(Arc::new(listener));
    }

    /// Clear participant code, session identifier, retry queue, and cached
    /// config, then notify listeners.
    ///
    /// Storage is cleared before any listener runs. Individual storage
    /// failures are logged; logout itself never fails.
    pub fn logout(&self) {
        {
            let mut code = self.participant_code.write();
            let mut session = self.session_uuid.write();

            for key in LOGOUT_LOCAL_KEYS {
                if let Err(err) = self.stores.local.delete(key) {
                    warn!(key = %key, error = %err, "Failed to clear key on logout");
                }
            }
            if let Err(err) = self.stores.session.delete(StorageKeys::SESSION_UUID) {
                warn!(error = %err, "Failed to clear session on logout");
            }

            *code = None;
            *session = None;
        }
        info!("Participant logged out");

        let listeners: Vec<LogoutListener> = self.listeners.lock().clone();
        for listener in listeners {
            listener();
        }
    }
}
