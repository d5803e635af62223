use std::{sync::Arc, time::Duration};

use serde::Deserialize;

use super::{gemini::GeminiClient, ClassifierError, ClassifyRequest, FrameClassifier};
use crate::{
    analysis::Verdict,
    config::MonitorConfig,
    utils::payload::{decode_base64, strip_data_uri},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub const NO_CREDENTIAL: &str = "no credential configured";
pub const RATE_LIMITED: &str = "rate limited";
pub const INVALID_CREDENTIAL: &str = "invalid credential";
pub const ANALYSIS_FAILED: &str = "analysis failed";

const FALLBACK_MIME_TYPE: &str = "image/jpeg";

const FRAME_PROMPT: &str = r#"You are looking at a single webcam frame of someone who declared a focus session.
Decide whether they are currently distracted or focused.
Distracted: looking away from the screen for a long time, using a phone, talking with someone else, away from the desk.
Focused: looking at the screen, typing, reading.

Reply with one JSON object and nothing else:
{"distracted": boolean, "confidence": number from 0 to 100, "reason": "short description of what they are doing"}"#;

#[derive(Deserialize)]
struct RawVerdict {
    distracted: bool,
    confidence: f64,
    #[serde(default)]
    reason: Option<String>,
}

/// Turns one webcam frame into a `Verdict`, never an error.
pub struct ClassifierGateway {
    classifier: Arc<dyn FrameClassifier>,
    default_credential: Option<String>,
    default_model: String,
}

impl ClassifierGateway {
    pub fn new(
        classifier: Arc<dyn FrameClassifier>,
        default_credential: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let default_credential = default_credential.filter(|key| !key.trim().is_empty());
        if default_credential.is_some() {
            log_info!("Frame classifier initialized with a default credential");
        } else {
            log_warn!("No default classifier credential; callers must supply their own");
        }

        Self {
            classifier,
            default_credential,
            default_model: default_model
                .filter(|model| !model.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    /// Gateway backed by the Gemini HTTP API as configured.
    pub fn from_config(config: &MonitorConfig) -> Result<Self, ClassifierError> {
        let client = GeminiClient::new(
            config.gemini_base_url.clone(),
            config.request_timeout_secs.map(Duration::from_secs),
        )?;

        Ok(Self::new(
            Arc::new(client),
            config.gemini_api_key.clone(),
            Some(config.gemini_model.clone()),
        ))
    }

    fn resolve_credential<'a>(&'a self, credential: Option<&'a str>) -> Option<&'a str> {
        credential
            .filter(|key| !key.trim().is_empty())
            .or(self.default_credential.as_deref())
    }

    fn resolve_model<'a>(&'a self, model: Option<&'a str>) -> &'a str {
        model
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.default_model)
    }

    /// Classify a base64 frame (data-URI prefix allowed).
    ///
    /// `credential` and `model` override the configured defaults when present.
    pub async fn classify_frame(
        &self,
        image_base64: &str,
        credential: Option<&str>,
        model: Option<&str>,
    ) -> Verdict {
        let Some(credential) = self.resolve_credential(credential) else {
            return Verdict::inconclusive(NO_CREDENTIAL);
        };
        let model = self.resolve_model(model);

        let (declared_mime, image_base64) = strip_data_uri(image_base64);
        let image_bytes = match decode_base64(image_base64) {
            Ok(bytes) => bytes,
            Err(err) => {
                log_warn!("frame payload is not valid base64: {err}");
                return Verdict::inconclusive(ANALYSIS_FAILED);
            }
        };
        let mime_type = image::guess_format(&image_bytes)
            .map(|format| format.to_mime_type())
            .ok()
            .or(declared_mime)
            .unwrap_or(FALLBACK_MIME_TYPE);

        log_info!("Classifying {mime_type} frame with model {model}");

        let request = ClassifyRequest {
            prompt: FRAME_PROMPT,
            image_base64,
            mime_type,
            model,
            credential,
        };

        let result = self
            .classifier
            .classify(request)
            .await
            .and_then(|text| parse_verdict(&text));

        match result {
            Ok(verdict) => verdict,
            Err(err) => {
                log_error!("Frame classification failed: {err}");
                failure_verdict(&err)
            }
        }
    }
}

/// Remove markdown code fences the model sometimes wraps its JSON in.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse the classifier's reply into a verdict, clamping confidence to 0–100.
pub fn parse_verdict(text: &str) -> Result<Verdict, ClassifierError> {
    let raw: RawVerdict = serde_json::from_str(&strip_code_fences(text))
        .map_err(|e| ClassifierError::Response(e.to_string()))?;

    Ok(Verdict {
        distracted: raw.distracted,
        confidence: raw.confidence.clamp(0.0, 100.0).round() as u8,
        reason: raw.reason.unwrap_or_default().trim().to_string(),
        level: None,
    })
}

/// Map a classifier failure onto a zero-confidence verdict.
///
/// Only failures reported by the remote side are inspected for quota
/// wording; an unreadable reply is always "analysis failed".
pub fn failure_verdict(err: &ClassifierError) -> Verdict {
    let reason = match err {
        ClassifierError::Status { status: 429, .. } => RATE_LIMITED,
        ClassifierError::Status { message, .. } if mentions_quota(message) => RATE_LIMITED,
        ClassifierError::Status {
            status: 400 | 401 | 403,
            ..
        } => INVALID_CREDENTIAL,
        ClassifierError::Transport(message) if mentions_quota(message) => RATE_LIMITED,
        ClassifierError::Status { .. }
        | ClassifierError::Transport(_)
        | ClassifierError::Response(_) => ANALYSIS_FAILED,
    };

    Verdict::inconclusive(reason)
}

fn mentions_quota(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("429") || message.contains("quota")
}
