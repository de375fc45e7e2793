//! Retry queue entries and their persisted record shape.

use crate::Event;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a persisted queue could not be reconstructed.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The blob is not a JSON array of records.
    #[error("Malformed queue JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// `lastAttempt` is not an RFC 3339 timestamp.
    #[error("Invalid lastAttempt timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },

    /// A required field is present but empty.
    #[error("Empty field in stored event: {0}")]
    EmptyField(&'static str),
}

/// A queued event awaiting (re)delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    /// The wrapped event, already enriched with its session identifier.
    pub event: Event,
    /// Collector URL the event is submitted to.
    pub url: String,
    /// Participant the event was captured under.
    pub participant_code: String,
    pub last_attempt: DateTime<Utc>,
    pub attempts: u32,
    /// Delivery confirmed; the entry is pruned at the end of the sweep.
    pub persisted: bool,
    /// Skip the retry delay on the next sweep.
    pub try_immediately: bool,
}

impl StoredEvent {
    /// Envelope for an event that is about to be submitted for the first time.
    pub fn first_attempt(
        event: Event,
        url: impl Into<String>,
        participant_code: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event,
            url: url.into(),
            participant_code: participant_code.into(),
            last_attempt: now,
            attempts: 1,
            persisted: false,
            try_immediately: true,
        }
    }

    pub fn local_uuid(&self) -> &str {
        &self.event.local_uuid
    }
}

/// Serde shape of a [`StoredEvent`]. Timestamps travel as strings and are
/// reparsed explicitly by the `TryFrom` conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEventRecord {
    pub event: Event,
    pub url: String,
    pub participant_code: String,
    pub last_attempt: String,
    pub attempts: u32,
    pub persisted: bool,
    pub try_immediately: bool,
}

impl From<&StoredEvent> for StoredEventRecord {
    fn from(stored: &StoredEvent) -> Self {
        Self {
            event: stored.event.clone(),
            url: stored.url.clone(),
            participant_code: stored.participant_code.clone(),
            last_attempt: stored
                .last_attempt
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            attempts: stored.attempts,
            persisted: stored.persisted,
            try_immediately: stored.try_immediately,
        }
    }
}

impl TryFrom<StoredEventRecord> for StoredEvent {
    type Error = RecordError;

    fn try_from(record: StoredEventRecord) -> Result<Self, Self::Error> {
        if record.event.local_uuid.is_empty() {
            return Err(RecordError::EmptyField("event.localUuid"));
        }
        if record.url.is_empty() {
            return Err(RecordError::EmptyField("url"));
        }

        let last_attempt = DateTime::parse_from_rfc3339(&record.last_attempt)
            .map_err(|source| RecordError::Timestamp {
                value: record.last_attempt.clone(),
                source,
            })?
            .with_timezone(&Utc);

        Ok(Self {
            event: record.event,
            url: record.url,
            participant_code: record.participant_code,
            last_attempt,
            attempts: record.attempts,
            persisted: record.persisted,
            try_immediately: record.try_immediately,
        })
    }
}

/// Serialize a queue as a JSON array of records.
pub fn encode_stored_events(events: &[StoredEvent]) -> Result<String, serde_json::Error> {
    let records: Vec<StoredEventRecord> = events.iter().map(StoredEventRecord::from).collect();
    serde_json::to_string(&records)
}

/// Parse a queue blob. Any malformed record rejects the whole blob.
pub fn decode_stored_events(json: &str) -> Result<Vec<StoredEvent>, RecordError> {
    let records: Vec<StoredEventRecord> = serde_json::from_str(json)?;
    records.into_iter().map(StoredEvent::try_from).collect()
}
