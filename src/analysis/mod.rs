pub mod verdict;
pub mod waveform;

pub use verdict::{Fate, Verdict};
pub use waveform::{analyze_waveform, parse_wav, PcmClip, PcmFormat, WavError};
