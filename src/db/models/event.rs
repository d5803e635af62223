//! Event data models.
//!
//! An event is the persisted form of a successful verdict. Events are
//! append-only and always carry a confidence in `1..=100`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Focus,
    Distraction,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Focus => "focus",
            EventKind::Distraction => "distraction",
        }
    }

    /// Message used when the verdict came without a reason.
    pub fn fallback_message(&self) -> &'static str {
        match self {
            EventKind::Focus => "Focus maintained",
            EventKind::Distraction => "Distraction detected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub message: String,
    pub confidence: u8,
    pub created_at: DateTime<Utc>,
}

/// An event that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub session_id: String,
    pub kind: EventKind,
    pub message: String,
    pub confidence: u8,
    pub created_at: DateTime<Utc>,
}
