//! Collector wire types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Header carrying the participant identity on every collector request.
pub const PARTICIPANT_CODE_HEADER: &str = "X-Participant-Code";

/// Failure code meaning the collector already stored this event.
pub const EVENT_ALREADY_EXISTS_OK: &str = "EVENT_ALREADY_EXISTS_OK";

/// Collector response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", bound(deserialize = "T: Deserialize<'de>"))]
pub enum ApiResponse<T> {
    Success {
        #[serde(default)]
        data: Option<T>,
    },
    Failure {
        code: String,
        #[serde(default)]
        message: String,
    },
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::Success { data: Some(data) }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failure {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Success, or the collector reporting it already has this event.
    pub fn is_delivered(&self) -> bool {
        match self {
            Self::Success { .. } => true,
            Self::Failure { code, .. } => code == EVENT_ALREADY_EXISTS_OK,
        }
    }
}

/// Payload of a successful session creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionData {
    pub session_uuid: String,
}

/// Per-participant configuration. The client only stores and hands it out;
/// its contents belong to the consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantConfig(pub Map<String, Value>);

impl ParticipantConfig {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Deserialize one entry into a typed value.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Identity headers for collector requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityHeaders {
    participant_code: String,
}

impl IdentityHeaders {
    /// `None` when the participant code is empty: such requests can never be
    /// attributed.
    pub fn new(participant_code: impl Into<String>) -> Option<Self> {
        let participant_code = participant_code.into();
        if participant_code.trim().is_empty() {
            return None;
        }
        Some(Self { participant_code })
    }

    pub fn participant_code(&self) -> &str {
        &self.participant_code
    }

    /// Header name/value pairs to attach to a request.
    pub fn pairs(&self) -> [(&'static str, &str); 1] {
        [(PARTICIPANT_CODE_HEADER, self.participant_code.as_str())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope() {
        let response: ApiResponse<CreateSessionData> =
            serde_json::from_value(json!({"type": "success", "data": {"sessionUuid": "s-1"}}))
                .unwrap();
        assert_eq!(
            response,
            ApiResponse::success(CreateSessionData {
                session_uuid: "s-1".to_string()
            })
        );
        assert!(response.is_delivered());
    }

    #[test]
    fn test_success_without_data() {
        let response: ApiResponse<Value> =
            serde_json::from_value(json!({"type": "success"})).unwrap();
        assert_eq!(response, ApiResponse::Success { data: None });
    }

    #[test]
    fn test_already_exists_counts_as_delivered() {
        let response: ApiResponse<Value> = serde_json::from_value(json!({
            "type": "failure",
            "code": "EVENT_ALREADY_EXISTS_OK",
            "message": "duplicate localUuid"
        }))
        .unwrap();
        assert!(response.is_delivered());

        let other: ApiResponse<Value> = ApiResponse::failure("INVALID_EVENT", "bad");
        assert!(!other.is_delivered());
    }

    #[test]
    fn test_identity_headers_require_code() {
        assert!(IdentityHeaders::new("").is_none());
        assert!(IdentityHeaders::new("   ").is_none());

        let headers = IdentityHeaders::new("P1").unwrap();
        assert_eq!(headers.participant_code(), "P1");
        assert_eq!(headers.pairs(), [("X-Participant-Code", "P1")]);
    }

    #[test]
    fn test_participant_config_typed_lookup() {
        let config: ParticipantConfig =
            serde_json::from_value(json!({"phase": 2, "arm": "control"})).unwrap();
        assert_eq!(config.get_as::<u32>("phase"), Some(2));
        assert_eq!(config.get_as::<String>("arm").as_deref(), Some("control"));
        assert_eq!(config.get_as::<u32>("arm"), None);
        assert!(config.get("missing").is_none());
    }
}
