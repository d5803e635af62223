//! Session data models.
//!
//! A session is active while `ended_at` and `focus_score` are both unset;
//! ending it sets both at once and the row is never touched again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Event;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub task: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub focus_score: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Whole seconds since the session started, floored at zero.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.started_at).num_seconds().max(0) as u64
    }
}

/// A session together with every event recorded against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionWithEvents {
    #[serde(flatten)]
    pub session: Session,
    pub events: Vec<Event>,
}
