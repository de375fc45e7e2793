//! Session bootstrap with single-flight request coalescing.

use crate::{AuthError, AuthResult, IdentityState};
use collector_client::Collector;
use event_protocol_types::{ApiResponse, IdentityHeaders};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

type SessionRequest = Shared<BoxFuture<'static, Result<String, String>>>;

/// Request in flight, keyed by the participant it was issued for.
struct InFlight {
    participant_code: String,
    request: SessionRequest,
}

/// Obtains session identifiers from the collector.
///
/// At most one session request per participant is outstanding at a time.
/// Callers arriving while one is pending await the same result.
pub struct SessionCoordinator {
    identity: Arc<IdentityState>,
    collector: Arc<dyn Collector>,
    in_flight: Mutex<Option<InFlight>>,
}

async fn request_session(
    collector: Arc<dyn Collector>,
    headers: IdentityHeaders,
) -> Result<String, String> {
    match collector.create_session(&headers).await {
        Ok(ApiResponse::Success {
            data: Some(data),
        }) if !data.session_uuid.is_empty() => Ok(data.session_uuid),
        Ok(ApiResponse::Success { .. }) => {
            Err("collector returned no session identifier".to_string())
        }
        Ok(ApiResponse::Failure { code, message }) => {
            if message.is_empty() {
                Err(code)
            } else {
                Err(message)
            }
        }
        Err(err) => Err(err.to_string()),
    }
}

impl SessionCoordinator {
    pub fn new(identity: Arc<IdentityState>, collector: Arc<dyn Collector>) -> Self {
        Self {
            identity,
            collector,
            in_flight: Mutex::new(None),
        }
    }

    pub fn identity(&self) -> &Arc<IdentityState> {
        &self.identity
    }

    /// Whether a session request is currently outstanding.
    pub fn is_creating(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Ask the collector for a session identifier without persisting it.
    ///
    /// Joins the outstanding request for the current participant if there
    /// is one. The slot is cleared once the request settles, so a later
    /// call issues a fresh request.
    pub async fn create_session(&self) -> AuthResult<String> {
        let headers = self.identity.headers().ok_or(AuthError::MissingIdentity)?;

        let request = {
            let mut slot = self.in_flight.lock();
            let joinable = slot
                .as_ref()
                .filter(|in_flight| in_flight.participant_code == headers.participant_code())
                .map(|in_flight| in_flight.request.clone());

            match joinable {
                Some(request) => {
                    debug!("Joining in-flight session request");
                    request
                }
                None => {
                    let participant_code = headers.participant_code().to_string();
                    let request = request_session(self.collector.clone(), headers)
                        .boxed()
                        .shared();
                    *slot = Some(InFlight {
                        participant_code,
                        request: request.clone(),
                    });
                    request
                }
            }
        };

        let result = request.clone().await;

        {
            let mut slot = self.in_flight.lock();
            let settled = slot
                .as_ref()
                .is_some_and(|in_flight| in_flight.request.ptr_eq(&request));
            if settled {
                *slot = None;
            }
        }

        result.map_err(|message| {
            warn!(error = %message, "Session creation failed");
            AuthError::SessionCreationFailed(message)
        })
    }

    /// Create a session and persist it for the participant that asked.
    ///
    /// If the participant logged out or changed while the request was
    /// pending, the identifier is discarded.
    pub async fn new_session(&self) -> AuthResult<String> {
        let participant_code = self.identity.get_auth().ok_or(AuthError::MissingIdentity)?;

        let session_uuid = self.create_session().await?;

        if self.identity.get_auth().as_deref() != Some(participant_code.as_str()) {
            warn!("Participant changed during session creation; discarding session");
            return Err(AuthError::MissingIdentity);
        }

        self.identity.set_session(&session_uuid)?;
        info!(session_uuid = %session_uuid, "Session created");
        Ok(session_uuid)
    }

    /// Cached session identifier, or a newly created one.
    pub async fn ensure_session(&self) -> AuthResult<String> {
        if let Some(session_uuid) = self.identity.get_session() {
            return Ok(session_uuid);
        }
        self.new_session().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collector_client::testing::ScriptedCollector;
    use futures_util::future::join_all;
    use std::time::Duration;
    use viewtrack_storage::{StorageKeys, Stores};

    fn setup() -> (Stores, Arc<ScriptedCollector>, SessionCoordinator) {
        let stores = Stores::in_memory();
        let identity = Arc::new(IdentityState::new(stores.clone()));
        let collector = Arc::new(ScriptedCollector::new());
        let coordinator = SessionCoordinator::new(identity, collector.clone());
        (stores, collector, coordinator)
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_share_one_call() {
        let (_, collector, coordinator) = setup();
        coordinator.identity().set_auth("P1").unwrap();
        collector.set_session_delay(Duration::from_millis(500));

        let results = join_all((0..5).map(|_| coordinator.create_session())).await;

        assert_eq!(collector.session_calls(), 1);
        for result in results {
            assert_eq!(result.unwrap(), "session-1");
        }
        assert!(!coordinator.is_creating());
    }

    #[tokio::test]
    async fn settled_request_is_not_reused() {
        let (_, collector, coordinator) = setup();
        coordinator.identity().set_auth("P1").unwrap();

        let first = coordinator.create_session().await.unwrap();
        let second = coordinator.create_session().await.unwrap();

        assert_eq!(first, "session-1");
        assert_eq!(second, "session-2");
        assert_eq!(collector.session_calls(), 2);
    }

    #[tokio::test]
    async fn create_session_requires_identity() {
        let (_, collector, coordinator) = setup();

        let err = coordinator.create_session().await.unwrap_err();
        assert!(matches!(err, AuthError::MissingIdentity));
        assert_eq!(collector.session_calls(), 0);
    }

    #[tokio::test]
    async fn failure_carries_collector_message() {
        let (_, collector, coordinator) = setup();
        coordinator.identity().set_auth("P1").unwrap();
        collector.fail_sessions_with("study closed");

        let err = coordinator.new_session().await.unwrap_err();
        assert!(matches!(err, AuthError::SessionCreationFailed(ref m) if m == "study closed"));
        assert_eq!(coordinator.identity().get_session(), None);
        assert!(!coordinator.is_creating());
    }

    #[tokio::test]
    async fn failed_request_clears_slot_for_retry() {
        let (_, collector, coordinator) = setup();
        coordinator.identity().set_auth("P1").unwrap();
        collector.set_online(false);

        assert!(matches!(
            coordinator.ensure_session().await,
            Err(AuthError::SessionCreationFailed(_))
        ));

        collector.set_online(true);
        assert_eq!(coordinator.ensure_session().await.unwrap(), "session-2");
        assert_eq!(collector.session_calls(), 2);
    }

    #[tokio::test]
    async fn new_session_persists_to_session_scope() {
        let (stores, _, coordinator) = setup();
        coordinator.identity().set_auth("P1").unwrap();

        let session_uuid = coordinator.new_session().await.unwrap();

        assert_eq!(coordinator.identity().get_session(), Some(session_uuid.clone()));
        assert_eq!(
            stores.session.get(StorageKeys::SESSION_UUID).unwrap(),
            Some(session_uuid)
        );
    }

    #[tokio::test]
    async fn ensure_session_reuses_cached_identifier() {
        let (_, collector, coordinator) = setup();
        coordinator.identity().set_auth("P1").unwrap();
        coordinator.identity().set_session("s-existing").unwrap();

        assert_eq!(coordinator.ensure_session().await.unwrap(), "s-existing");
        assert_eq!(collector.session_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_during_request_discards_session() {
        let (stores, collector, coordinator) = setup();
        coordinator.identity().set_auth("P1").unwrap();
        collector.set_session_delay(Duration::from_millis(200));

        let (result, _) = tokio::join!(coordinator.new_session(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            coordinator.identity().logout();
        });

        assert!(matches!(result, Err(AuthError::MissingIdentity)));
        assert_eq!(coordinator.identity().get_session(), None);
        assert_eq!(stores.session.get(StorageKeys::SESSION_UUID).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn participant_switch_does_not_join_stale_request() {
        let (_, collector, coordinator) = setup();
        coordinator.identity().set_auth("P1").unwrap();
        collector.set_session_delay(Duration::from_millis(200));

        let (first, second) = tokio::join!(coordinator.new_session(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            coordinator.identity().set_auth("P2").unwrap();
            coordinator.new_session().await
        });

        assert!(matches!(first, Err(AuthError::MissingIdentity)));
        assert_eq!(second.unwrap(), "session-2");
        assert_eq!(collector.session_calls(), 2);
        assert_eq!(
            coordinator.identity().get_session().as_deref(),
            Some("session-2")
        );
    }
}
