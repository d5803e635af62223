//! Ambient-noise verdicts from raw RIFF/WAVE buffers.
//!
//! Pure and synchronous: parse the container, compute the RMS loudness of the
//! 16-bit samples, and derive a verdict from loudness alone.

use thiserror::Error;

use super::verdict::Verdict;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const UNSUPPORTED_FORMAT: &str = "unsupported format";

/// Loudness at or above which a sample counts as a distraction.
pub const DISTRACTION_LEVEL: f64 = 0.15;

const RIFF_MARKER: &[u8; 4] = b"RIFF";
const WAVE_MARKER: &[u8; 4] = b"WAVE";
const FMT_CHUNK: &[u8; 4] = b"fmt ";
const DATA_CHUNK: &[u8; 4] = b"data";

const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const FMT_MIN_LEN: usize = 16;
const FMT_EXTENSIBLE_LEN: usize = 40;

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WavError {
    #[error("missing RIFF/WAVE markers")]
    MissingMarkers,
    #[error("chunk extends past end of buffer")]
    Truncated,
    #[error("encoding {0:#06x} is not integer PCM")]
    NotPcm(u16),
    #[error("{0}-bit samples are not supported")]
    SampleWidth(u16),
    #[error("no fmt chunk")]
    MissingFormat,
    #[error("no data chunk")]
    MissingData,
    #[error("data chunk holds no samples")]
    NoSamples,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

/// A validated 16-bit PCM clip borrowing its sample bytes from the input.
#[derive(Debug)]
pub struct PcmClip<'a> {
    pub format: PcmFormat,
    data: &'a [u8],
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn parse_format(body: &[u8]) -> Result<PcmFormat, WavError> {
    if body.len() < FMT_MIN_LEN {
        return Err(WavError::Truncated);
    }

    let mut encoding = read_u16(body, 0).ok_or(WavError::Truncated)?;
    let channels = read_u16(body, 2).ok_or(WavError::Truncated)?;
    let sample_rate = read_u32(body, 4).ok_or(WavError::Truncated)?;
    let bits_per_sample = read_u16(body, 14).ok_or(WavError::Truncated)?;

    // The first two bytes of the sub-format GUID carry the real encoding tag.
    if encoding == WAVE_FORMAT_EXTENSIBLE {
        if body.len() < FMT_EXTENSIBLE_LEN {
            return Err(WavError::Truncated);
        }
        encoding = read_u16(body, 24).ok_or(WavError::Truncated)?;
    }

    if encoding != WAVE_FORMAT_PCM {
        return Err(WavError::NotPcm(encoding));
    }
    if bits_per_sample != 16 {
        return Err(WavError::SampleWidth(bits_per_sample));
    }

    Ok(PcmFormat {
        channels,
        sample_rate,
        bits_per_sample,
    })
}

/// Walk the chunk list of a RIFF/WAVE buffer and pick out `fmt ` and `data`.
pub fn parse_wav(bytes: &[u8]) -> Result<PcmClip<'_>, WavError> {
    if bytes.len() < RIFF_HEADER_LEN
        || &bytes[0..4] != RIFF_MARKER
        || &bytes[8..12] != WAVE_MARKER
    {
        return Err(WavError::MissingMarkers);
    }

    let mut format: Option<PcmFormat> = None;
    let mut data: Option<&[u8]> = None;
    let mut cursor = RIFF_HEADER_LEN;

    while format.is_none() || data.is_none() {
        let Some(header) = cursor
            .checked_add(CHUNK_HEADER_LEN)
            .and_then(|end| bytes.get(cursor..end))
        else {
            break;
        };

        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let body_start = cursor + CHUNK_HEADER_LEN;
        let body_end = body_start.checked_add(size).ok_or(WavError::Truncated)?;

        if &header[0..4] == FMT_CHUNK {
            let body = bytes.get(body_start..body_end).ok_or(WavError::Truncated)?;
            format = Some(parse_format(body)?);
        } else if &header[0..4] == DATA_CHUNK {
            data = Some(bytes.get(body_start..body_end).ok_or(WavError::Truncated)?);
        }

        // Chunk bodies are padded to an even length.
        cursor = body_end.checked_add(size & 1).ok_or(WavError::Truncated)?;
    }

    let format = format.ok_or(WavError::MissingFormat)?;
    let data = data.ok_or(WavError::MissingData)?;
    if data.len() < 2 {
        return Err(WavError::NoSamples);
    }

    Ok(PcmClip { format, data })
}

impl PcmClip<'_> {
    pub fn sample_count(&self) -> usize {
        self.data.len() / 2
    }

    /// Root-mean-square of all samples, each normalized by 32768.
    pub fn rms(&self) -> f64 {
        let sum_of_squares: f64 = self
            .data
            .chunks_exact(2)
            .map(|pair| {
                let sample = f64::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0;
                sample * sample
            })
            .sum();

        (sum_of_squares / self.sample_count() as f64).sqrt()
    }

    pub fn duration_ms(&self) -> Option<u64> {
        let channels = u64::from(self.format.channels);
        let sample_rate = u64::from(self.format.sample_rate);
        if channels == 0 || sample_rate == 0 {
            return None;
        }
        let frames = self.sample_count() as u64 / channels;
        Some(frames * 1000 / sample_rate)
    }
}

/// Derive an ambient-noise verdict from a WAV buffer.
///
/// Anything that is not 16-bit integer PCM yields a zero-confidence
/// "unsupported format" verdict.
pub fn analyze_waveform(bytes: &[u8]) -> Verdict {
    let clip = match parse_wav(bytes) {
        Ok(clip) => clip,
        Err(err) => {
            log_warn!("rejecting audio sample ({} bytes): {err}", bytes.len());
            return Verdict::inconclusive(UNSUPPORTED_FORMAT);
        }
    };

    let level = clip.rms().min(1.0);
    let distracted = level >= DISTRACTION_LEVEL;
    let confidence = (level * 200.0).round().min(100.0) as u8;

    let reason = if distracted {
        match clip.duration_ms() {
            Some(ms) => format!("high ambient noise over {ms} ms"),
            None => "high ambient noise".to_string(),
        }
    } else {
        "ambient noise low".to_string()
    };

    Verdict {
        distracted,
        confidence,
        reason,
        level: Some(level),
    }
}
