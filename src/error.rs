//! Errors surfaced to callers of the monitoring service.
//!
//! Classifier and audio failures never show up here: they become
//! zero-confidence verdicts. Only client mistakes and storage faults do.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// The session does not exist or is owned by another user.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The session was already ended; its score is frozen.
    #[error("Session already ended: {0}")]
    SessionAlreadyEnded(String),

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl MonitorError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MonitorError::SessionNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
