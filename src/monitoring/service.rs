//! Facade over the monitoring pipeline.
//!
//! Every public method here maps one-to-one onto a command a controller
//! layer exposes. Classification never fails from the caller's point of view:
//! problems come back as zero-confidence verdicts.

use std::sync::Arc;

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{analyze_waveform, waveform::UNSUPPORTED_FORMAT, Verdict},
    classifier::{gateway::ANALYSIS_FAILED, ClassifierGateway, FrameClassifier},
    config::MonitorConfig,
    db::{Database, Session, SessionWithEvents},
    error::Result,
    utils::payload::{decode_base64, strip_data_uri},
};

use super::{
    coordinator::{SessionCoordinator, SessionStats},
    ingest::VerdictIngestor,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_warn};

/// A webcam frame submitted for classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSubmission {
    /// Base64 image, optionally with a `data:` URI prefix.
    pub image: String,
    pub timestamp: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// A short audio chunk submitted for ambient-noise analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSubmission {
    /// Base64 WAV, optionally with a `data:` URI prefix.
    pub audio: String,
    pub timestamp: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSample {
    pub processed: bool,
    /// Echoed from the submission.
    pub timestamp: String,
    pub verdict: Verdict,
}

impl ProcessedSample {
    fn new(timestamp: &str, verdict: Verdict) -> Self {
        Self {
            processed: true,
            timestamp: timestamp.to_string(),
            verdict,
        }
    }
}

pub struct MonitoringService {
    gateway: ClassifierGateway,
    ingestor: VerdictIngestor,
    sessions: SessionCoordinator,
}

impl MonitoringService {
    pub fn new(gateway: ClassifierGateway, db: Database) -> Self {
        Self {
            gateway,
            ingestor: VerdictIngestor::new(db.clone()),
            sessions: SessionCoordinator::new(db),
        }
    }

    /// Open the configured database and talk to Gemini.
    pub fn from_config(config: &MonitorConfig) -> AnyResult<Self> {
        let db = Database::new(config.database_path.clone()).with_context(|| {
            format!(
                "Failed to open database at {}",
                config.database_path.display()
            )
        })?;
        let gateway =
            ClassifierGateway::from_config(config).context("Failed to build frame classifier")?;
        Ok(Self::new(gateway, db))
    }

    /// Use `classifier` in place of the HTTP client, keeping the configured
    /// default credential and model.
    pub fn with_classifier(
        config: &MonitorConfig,
        classifier: Arc<dyn FrameClassifier>,
        db: Database,
    ) -> Self {
        let gateway = ClassifierGateway::new(
            classifier,
            config.gemini_api_key.clone(),
            Some(config.gemini_model.clone()),
        );
        Self::new(gateway, db)
    }

    pub async fn start_session(&self, user_id: &str, task: &str) -> Result<Session> {
        self.sessions.start_session(user_id, task).await
    }

    pub async fn end_session(&self, user_id: &str, session_id: &str) -> Result<Session> {
        self.sessions.end_session(user_id, session_id).await
    }

    pub async fn process_frame(&self, user_id: &str, frame: &FrameSubmission) -> ProcessedSample {
        let verdict = self
            .gateway
            .classify_frame(&frame.image, frame.api_key.as_deref(), frame.model.as_deref())
            .await;

        self.ingestor
            .ingest(user_id, frame.session_id.as_deref(), &verdict)
            .await;
        ProcessedSample::new(&frame.timestamp, verdict)
    }

    pub async fn process_audio(&self, user_id: &str, audio: &AudioSubmission) -> ProcessedSample {
        let verdict = analyze_audio_payload(&audio.audio).await;

        self.ingestor
            .ingest(user_id, audio.session_id.as_deref(), &verdict)
            .await;
        ProcessedSample::new(&audio.timestamp, verdict)
    }

    pub async fn session_stats(&self, user_id: &str) -> Result<SessionStats> {
        self.sessions.session_stats(user_id).await
    }

    pub async fn user_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        self.sessions.recent_sessions(user_id).await
    }

    pub async fn session(&self, user_id: &str, session_id: &str) -> Result<SessionWithEvents> {
        self.sessions.session(user_id, session_id).await
    }
}

async fn analyze_audio_payload(payload: &str) -> Verdict {
    let (_, body) = strip_data_uri(payload);
    let bytes = match decode_base64(body) {
        Ok(bytes) => bytes,
        Err(err) => {
            log_warn!("audio payload is not valid base64: {err}");
            return Verdict::inconclusive(UNSUPPORTED_FORMAT);
        }
    };

    match tokio::task::spawn_blocking(move || analyze_waveform(&bytes)).await {
        Ok(verdict) => verdict,
        Err(err) => {
            log_error!("audio analysis task failed: {err}");
            Verdict::inconclusive(ANALYSIS_FAILED)
        }
    }
}
