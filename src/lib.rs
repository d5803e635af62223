//! Focus monitoring core: classifies webcam frames and microphone chunks
//! into focus/distraction verdicts, records them against work sessions and
//! scores each session when it ends.

pub mod analysis;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod monitoring;
pub mod utils;

pub use analysis::Verdict;
pub use classifier::{ClassifierError, ClassifierGateway, ClassifyRequest, FrameClassifier};
pub use config::MonitorConfig;
pub use db::{Database, Event, EventKind, Session, SessionWithEvents};
pub use error::{MonitorError, Result};
pub use monitoring::{
    AudioSubmission, FrameSubmission, MonitoringService, ProcessedSample, SessionStats,
};
