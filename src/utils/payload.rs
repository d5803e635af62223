//! Helpers for the base64 payloads clients submit (webcam frames, audio chunks).

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Split an optional `data:<mime>;base64,` prefix off a payload.
///
/// Returns the declared MIME type (if any) and the bare base64 text.
pub fn strip_data_uri(payload: &str) -> (Option<&str>, &str) {
    let trimmed = payload.trim();
    if let Some(rest) = trimmed.strip_prefix("data:") {
        if let Some((mime, body)) = rest.split_once(";base64,") {
            let mime = (!mime.is_empty()).then_some(mime);
            return (mime, body);
        }
    }
    (None, trimmed)
}

pub fn decode_base64(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(payload.trim())
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
