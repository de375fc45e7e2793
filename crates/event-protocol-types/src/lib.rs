//! Pure data types shared by the viewtrack crates.

mod api;
mod event;
mod stored;

pub use api::{
    ApiResponse, CreateSessionData, IdentityHeaders, ParticipantConfig,
    EVENT_ALREADY_EXISTS_OK, PARTICIPANT_CODE_HEADER,
};
pub use event::{Event, EventKind};
pub use stored::{
    decode_stored_events, encode_stored_events, RecordError, StoredEvent, StoredEventRecord,
};
