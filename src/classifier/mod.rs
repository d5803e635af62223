//! Remote frame classification.
//!
//! `FrameClassifier` is the seam to the generative-AI service; `GeminiClient`
//! is the production implementation and `ClassifierGateway` turns whatever it
//! returns, failures included, into a `Verdict`.

pub mod gateway;
pub mod gemini;

use async_trait::async_trait;
use thiserror::Error;

pub use gateway::ClassifierGateway;
pub use gemini::GeminiClient;

/// Failures reported by a remote classifier.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("unreadable classifier response: {0}")]
    Response(String),
}

/// One image classification call.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyRequest<'a> {
    pub prompt: &'a str,
    /// Bare base64 image data (no data-URI prefix).
    pub image_base64: &'a str,
    pub mime_type: &'a str,
    pub model: &'a str,
    pub credential: &'a str,
}

#[async_trait]
pub trait FrameClassifier: Send + Sync {
    /// Send the image and prompt, returning the model's raw text reply.
    async fn classify(&self, request: ClassifyRequest<'_>) -> Result<String, ClassifierError>;
}
