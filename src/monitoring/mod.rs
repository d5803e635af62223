pub mod coordinator;
pub mod ingest;
pub mod scoring;
pub mod service;

pub use coordinator::{SessionCoordinator, SessionStats, HISTORY_LIMIT};
pub use ingest::{Ingestion, VerdictIngestor};
pub use service::{AudioSubmission, FrameSubmission, MonitoringService, ProcessedSample};
