//! Durable retry queue.

use crate::{OutboxError, OutboxResult};
use event_protocol_types::{decode_stored_events, encode_stored_events, StoredEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};
use viewtrack_storage::{KeyValueStore, StorageKeys};

const FLAG_COMPRESSED: &str = "true";
const FLAG_PLAIN: &str = "false";
const EMPTY_QUEUE: &str = "[]";

fn decompress(blob: &str) -> OutboxResult<String> {
    let wide = lz_str::decompress_from_utf16(blob)
        .ok_or_else(|| OutboxError::Compression("blob is not valid lz-string data".to_string()))?;
    String::from_utf16(&wide).map_err(|err| OutboxError::Compression(err.to_string()))
}

/// Retry queue persisted under the `events` key of the local scope.
///
/// `load` and `save` never fail: a corrupted blob is discarded and read as
/// an empty queue, and a failed save writes an empty placeholder instead of
/// leaving a partial blob behind.
pub struct QueueStore {
    store: Arc<dyn KeyValueStore>,
    compress: bool,
}

impl QueueStore {
    pub fn new(store: Arc<dyn KeyValueStore>, compress: bool) -> Self {
        Self { store, compress }
    }

    /// All queued entries in insertion order.
    pub fn load(&self) -> Vec<StoredEvent> {
        match self.try_load() {
            Ok(events) => events,
            Err(OutboxError::Storage(err)) => {
                warn!(error = %err, "Failed to read event queue");
                Vec::new()
            }
            Err(err) => {
                warn!(error = %err, "Discarding corrupted event queue");
                self.clear();
                Vec::new()
            }
        }
    }

    fn try_load(&self) -> OutboxResult<Vec<StoredEvent>> {
        let Some(blob) = self.store.get(StorageKeys::EVENTS)? else {
            return Ok(Vec::new());
        };
        let compressed =
            self.store.get(StorageKeys::EVENTS_COMPRESSED)?.as_deref() == Some(FLAG_COMPRESSED);

        let json = if compressed { decompress(&blob)? } else { blob };
        Ok(decode_stored_events(&json)?)
    }

    /// Replace the queue contents.
    pub fn save(&self, events: &[StoredEvent]) {
        if let Err(err) = self.try_save(events) {
            error!(
                error = %err,
                count = events.len(),
                "Failed to persist event queue, writing empty placeholder"
            );
            let placeholder = self
                .store
                .set(StorageKeys::EVENTS, EMPTY_QUEUE)
                .and_then(|_| self.store.set(StorageKeys::EVENTS_COMPRESSED, FLAG_PLAIN));
            if let Err(err) = placeholder {
                error!(error = %err, "Failed to write empty event queue placeholder");
            }
        }
    }

    fn try_save(&self, events: &[StoredEvent]) -> OutboxResult<()> {
        let json = encode_stored_events(events)?;

        if self.compress {
            let blob = lz_str::compress_to_utf16(json.as_str());
            if decompress(&blob)? != json {
                return Err(OutboxError::Compression(
                    "compressed blob does not round-trip".to_string(),
                ));
            }
            self.store.set(StorageKeys::EVENTS, &blob)?;
            self.store.set(StorageKeys::EVENTS_COMPRESSED, FLAG_COMPRESSED)?;
        } else {
            self.store.set(StorageKeys::EVENTS, &json)?;
            self.store.set(StorageKeys::EVENTS_COMPRESSED, FLAG_PLAIN)?;
        }

        debug!(count = events.len(), compressed = self.compress, "Saved event queue");
        Ok(())
    }

    /// Append an entry, replacing any queued entry for the same event.
    pub fn enqueue(&self, entry: StoredEvent) {
        let mut events = self.load();
        events.retain(|queued| queued.local_uuid() != entry.local_uuid());
        events.push(entry);
        self.save(&events);
    }

    /// Remove every entry for this event. Returns how many were removed.
    pub fn remove_by_local_uuid(&self, local_uuid: &str) -> usize {
        let mut events = self.load();
        let before = events.len();
        events.retain(|queued| queued.local_uuid() != local_uuid);

        let removed = before - events.len();
        if removed > 0 {
            self.save(&events);
        }
        removed
    }

    /// Fold the outcome of a sweep into the current queue.
    ///
    /// Entries the sweep saw are replaced by their swept copy, or dropped if
    /// marked persisted. Entries added since the sweep loaded are kept, and
    /// entries removed since then stay removed. Returns the new queue length.
    pub fn merge_swept(&self, swept: &[StoredEvent]) -> usize {
        let swept: HashMap<&str, &StoredEvent> = swept
            .iter()
            .map(|entry| (entry.local_uuid(), entry))
            .collect();

        let merged: Vec<StoredEvent> = self
            .load()
            .into_iter()
            .map(|current| match swept.get(current.local_uuid()) {
                Some(entry) => (*entry).clone(),
                None => current,
            })
            .filter(|entry| !entry.persisted)
            .collect();

        self.save(&merged);
        merged.len()
    }

    /// Delete the queue and its compression flag.
    pub fn clear(&self) {
        for key in [StorageKeys::EVENTS, StorageKeys::EVENTS_COMPRESSED] {
            if let Err(err) = self.store.delete(key) {
                warn!(key = %key, error = %err, "Failed to delete event queue key");
            }
        }
    }

    /// Whether an entry for this event is queued.
    pub fn contains(&self, local_uuid: &str) -> bool {
        self.load()
            .iter()
            .any(|queued| queued.local_uuid() == local_uuid)
    }

    pub fn pending_count(&self) -> usize {
        self.load().len()
    }
}
