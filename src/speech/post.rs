//! Post-processing stages applied after synthesis
//!
//! Pitch shifting and compressed export are delegated to external tools
//! behind these traits.

use super::synth::{is_unity, UNITY_EPSILON};
use crate::{Result, StudioError};
use std::path::Path;

/// Lowest sample rate handed to the resampler
pub const MIN_RESAMPLE_RATE: u32 = 8000;

/// Attenuation used instead of a literal zero gain
pub const SILENCE_DB: f64 = -120.0;

/// Changes pitch while keeping duration
pub trait PitchShifter: Send + Sync {
    /// Write a pitch-shifted copy of `src` to `dest`
    fn shift_pitch(&self, src: &Path, dest: &Path, pitch: f32) -> Result<()>;
}

/// Encodes a WAV file into a compressed container
pub trait Encoder: Send + Sync {
    /// Encode `pcm` into `out`, applying the volume as a dB gain
    fn export_compressed(&self, pcm: &Path, out: &Path, format: ExportFormat, volume: f32)
        -> Result<()>;
}

/// Output container chosen from the destination extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Wav,
    Mp3,
    Ogg,
    Flac,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "wav" => Ok(ExportFormat::Wav),
            "mp3" => Ok(ExportFormat::Mp3),
            "ogg" => Ok(ExportFormat::Ogg),
            "flac" => Ok(ExportFormat::Flac),
            _ => Err(StudioError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Format identifier understood by the encoder
    pub fn identifier(self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
            ExportFormat::Ogg => "ogg",
            ExportFormat::Flac => "flac",
        }
    }

    /// Whether the format is written by the encoder rather than natively
    pub fn is_compressed(self) -> bool {
        self != ExportFormat::Wav
    }
}

/// Resampler filter for a pitch shift
///
/// Raising the sample rate by `pitch` shifts pitch and shortens the audio;
/// the tempo change by `1/pitch` restores the duration.
pub fn pitch_filter(frame_rate: u32, pitch: f32) -> String {
    let pitch = f64::from(pitch);
    let asetrate = ((f64::from(frame_rate) * pitch).round() as u32).max(MIN_RESAMPLE_RATE);
    let atempo = 1.0 / pitch;
    format!("asetrate={},atempo={:.5}", asetrate, atempo)
}

/// Gain in dB for a linear volume, `None` when no change is needed
pub fn volume_gain_db(volume: f32) -> Option<f64> {
    if volume < UNITY_EPSILON {
        return Some(SILENCE_DB);
    }
    if is_unity(volume) {
        return None;
    }
    Some(20.0 * f64::from(volume).log10())
}
