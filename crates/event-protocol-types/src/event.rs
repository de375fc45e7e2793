//! Behavioral events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What was observed, with its type-specific payload.
///
/// Serialized inline with the event under a `"type"` tag, e.g.
/// `{"type":"TILE_CLICKED","videoId":"abc","position":3,...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum EventKind {
    /// A page finished loading.
    PageView,
    /// Accumulated playback time for a video.
    WatchTime {
        video_id: String,
        watched_seconds: f64,
    },
    /// The home feed was rendered.
    HomeShown { video_ids: Vec<String> },
    /// A video tile was clicked.
    TileClicked {
        video_id: String,
        position: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        section: Option<String>,
    },
    /// Recommendations next to a video were rendered.
    RecommendationsShown {
        video_id: String,
        recommended_ids: Vec<String>,
    },
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageView => "PAGE_VIEW",
            Self::WatchTime { .. } => "WATCH_TIME",
            Self::HomeShown { .. } => "HOME_SHOWN",
            Self::TileClicked { .. } => "TILE_CLICKED",
            Self::RecommendationsShown { .. } => "RECOMMENDATIONS_SHOWN",
        }
    }
}

/// An observed event.
///
/// `local_uuid` is generated once at creation and is the deduplication key
/// for the event's whole lifetime. The optional context fields are filled
/// lazily, once, by the delivery pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub local_uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_active: Option<bool>,
}

impl Event {
    /// Create an event with a fresh local identifier.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            local_uuid: Uuid::new_v4().to_string(),
            session_uuid: None,
            url: None,
            context: None,
            extension_version: None,
            tab_active: None,
        }
    }

    pub fn page_view() -> Self {
        Self::new(EventKind::PageView)
    }

    /// Set the page URL the event was observed on.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the referrer/context string.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}
