use serde::{Deserialize, Serialize};

use crate::db::models::EventKind;

/// Outcome of a single classification, before any persistence decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub distracted: bool,
    /// 0–100. Zero means the sample produced no usable signal.
    pub confidence: u8,
    pub reason: String,
    /// Normalized loudness in `[0, 1]`; audio verdicts only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
}

/// What happens to a verdict once it reaches ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Discard,
    Record(EventKind),
}

impl Verdict {
    /// A zero-confidence verdict carrying only an explanation.
    pub fn inconclusive(reason: impl Into<String>) -> Self {
        Self {
            distracted: false,
            confidence: 0,
            reason: reason.into(),
            level: None,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.confidence > 0
    }

    pub fn kind(&self) -> EventKind {
        if self.distracted {
            EventKind::Distraction
        } else {
            EventKind::Focus
        }
    }

    pub fn fate(&self) -> Fate {
        if self.is_successful() {
            Fate::Record(self.kind())
        } else {
            Fate::Discard
        }
    }
}
