//! Storage key constants.

/// Keys persisted by the client.
pub struct StorageKeys;

impl StorageKeys {
    /// Participant code (long-lived)
    pub const PARTICIPANT_CODE: &'static str = "participantCode";

    /// Server-issued session identifier (session scope)
    pub const SESSION_UUID: &'static str = "sessionUuid";

    /// Retry queue blob (JSON array of stored events, optionally compressed)
    pub const EVENTS: &'static str = "events";

    /// `"true"` iff the `events` blob is compressed
    pub const EVENTS_COMPRESSED: &'static str = "lz-string";

    /// Last fetched participant config (JSON)
    pub const CONFIG: &'static str = "config";

    /// Whether the participant is signed in to YouTube (`"true"`/`"false"`)
    pub const LOGGED_IN_YOUTUBE: &'static str = "loggedInYouTube";
}
