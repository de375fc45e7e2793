//! Participant config fetch and cache.

use crate::{AuthError, AuthResult, IdentityState};
use collector_client::Collector;
use event_protocol_types::{ApiResponse, ParticipantConfig};
use std::sync::Arc;
use tracing::{debug, warn};
use viewtrack_storage::{KeyValueStore, StorageKeys};

/// Fetches the participant's configuration and keeps the last good copy in
/// the local scope.
pub struct ParticipantConfigFetcher {
    identity: Arc<IdentityState>,
    collector: Arc<dyn Collector>,
    local: Arc<dyn KeyValueStore>,
}

impl ParticipantConfigFetcher {
    pub fn new(
        identity: Arc<IdentityState>,
        collector: Arc<dyn Collector>,
        local: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            identity,
            collector,
            local,
        }
    }

    /// Fetch the config for the current participant and cache it.
    pub async fn get_config(&self) -> AuthResult<ParticipantConfig> {
        let headers = self.identity.headers().ok_or(AuthError::MissingIdentity)?;

        let config = match self.collector.fetch_config(&headers).await {
            Ok(ApiResponse::Success { data: Some(config) }) => config,
            Ok(ApiResponse::Success { data: None }) => {
                return Err(AuthError::ConfigFetchFailed(
                    "collector returned no config".to_string(),
                ))
            }
            Ok(ApiResponse::Failure { code, message }) => {
                return Err(AuthError::ConfigFetchFailed(format!("{}: {}", code, message)))
            }
            Err(err) => return Err(AuthError::ConfigFetchFailed(err.to_string())),
        };

        match serde_json::to_string(&config) {
            Ok(json) => self.local.set(StorageKeys::CONFIG, &json)?,
            Err(err) => warn!(error = %err, "Failed to serialize participant config"),
        }
        debug!(keys = config.0.len(), "Participant config fetched");
        Ok(config)
    }

    /// Last fetched config, if any. A corrupted cache is discarded.
    pub fn cached_config(&self) -> Option<ParticipantConfig> {
        let json = match self.local.get(StorageKeys::CONFIG) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "Failed to read cached participant config");
                return None;
            }
        };

        match serde_json::from_str(&json) {
            Ok(config) => Some(config),
            Err(err) => {
                warn!(error = %err, "Discarding corrupted participant config cache");
                if let Err(err) = self.local.delete(StorageKeys::CONFIG) {
                    warn!(error = %err, "Failed to delete participant config cache");
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collector_client::testing::ScriptedCollector;
    use serde_json::json;
    use viewtrack_storage::Stores;

    fn setup() -> (Stores, Arc<ScriptedCollector>, ParticipantConfigFetcher) {
        let stores = Stores::in_memory();
        let identity = Arc::new(IdentityState::new(stores.clone()));
        let collector = Arc::new(ScriptedCollector::new());
        let fetcher =
            ParticipantConfigFetcher::new(identity, collector.clone(), stores.local.clone());
        (stores, collector, fetcher)
    }

    fn config() -> ParticipantConfig {
        serde_json::from_value(json!({"phase": 2, "arm": "treatment"})).unwrap()
    }

    #[tokio::test]
    async fn fetch_caches_config() {
        let (stores, collector, fetcher) = setup();
        fetcher.identity.set_auth("P1").unwrap();
        collector.set_config(config());

        let fetched = fetcher.get_config().await.unwrap();
        assert_eq!(fetched, config());
        assert_eq!(fetcher.cached_config(), Some(config()));
        assert!(stores.local.has(StorageKeys::CONFIG).unwrap());
    }

    #[tokio::test]
    async fn fetch_requires_identity() {
        let (_, collector, fetcher) = setup();

        assert!(matches!(
            fetcher.get_config().await,
            Err(AuthError::MissingIdentity)
        ));
        assert_eq!(collector.config_calls(), 0);
    }

    #[tokio::test]
    async fn failure_keeps_previous_cache() {
        let (_, collector, fetcher) = setup();
        fetcher.identity.set_auth("P1").unwrap();
        collector.set_config(config());
        fetcher.get_config().await.unwrap();

        collector.set_online(false);
        assert!(matches!(
            fetcher.get_config().await,
            Err(AuthError::ConfigFetchFailed(_))
        ));
        assert_eq!(fetcher.cached_config(), Some(config()));
    }

    #[tokio::test]
    async fn missing_config_is_fetch_failure() {
        let (_, _, fetcher) = setup();
        fetcher.identity.set_auth("P1").unwrap();

        let err = fetcher.get_config().await.unwrap_err();
        assert!(matches!(err, AuthError::ConfigFetchFailed(ref m) if m.starts_with("CONFIG_NOT_FOUND")));
    }

    #[test]
    fn corrupted_cache_is_discarded() {
        let (stores, _, fetcher) = setup();
        stores.local.set(StorageKeys::CONFIG, "{not json").unwrap();

        assert_eq!(fetcher.cached_config(), None);
        assert!(!stores.local.has(StorageKeys::CONFIG).unwrap());
    }

    #[tokio::test]
    async fn logout_clears_cache() {
        let (_, collector, fetcher) = setup();
        fetcher.identity.set_auth("P1").unwrap();
        collector.set_config(config());
        fetcher.get_config().await.unwrap();

        fetcher.identity.logout();
        assert_eq!(fetcher.cached_config(), None);
    }
}
