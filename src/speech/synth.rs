//! Speech synthesizer abstraction
//!
//! The synthesizer is an external engine that turns text into a WAV file.
//! Only speaking rate is handed to it (as a length scale); pitch and volume
//! are applied afterwards in post-processing because the engine's own pitch
//! control is not reliable.

use crate::Result;
use std::path::{Path, PathBuf};

/// Rate that maps to a length scale of 1.0
pub const DEFAULT_REFERENCE_RATE: u32 = 180;
pub const MIN_LENGTH_SCALE: f32 = 0.5;
pub const MAX_LENGTH_SCALE: f32 = 2.0;

pub const PITCH_MIN: f32 = 0.5;
pub const PITCH_MAX: f32 = 2.0;

/// Tolerance used whenever pitch or volume is compared against 1.0
pub const UNITY_EPSILON: f32 = 0.001;

/// Parameters for one synthesis request, built fresh from the current selection
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisConfig {
    /// Voice model path, `None` when nothing is selected
    pub voice_id: Option<PathBuf>,
    /// Words-per-minute-like speaking rate
    pub rate: u32,
    /// Linear volume in [0, 2]
    pub volume: f32,
    /// Pitch multiplier in [0.5, 2.0]
    pub pitch: f32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            voice_id: None,
            rate: DEFAULT_REFERENCE_RATE,
            volume: 0.9,
            pitch: 1.0,
        }
    }
}

/// Fully resolved synthesizer invocation
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: PathBuf,
    pub length_scale: f32,
    pub output: PathBuf,
}

/// Speech synthesizer trait
///
/// Implementations run synchronously; callers that must stay responsive
/// dispatch them to a worker thread.
pub trait Synthesizer: Send + Sync {
    /// Render `request.text` into a WAV file at `request.output`
    fn synthesize(&self, request: &SynthesisRequest) -> Result<()>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Convert a user-facing rate to the synthesizer's length scale
///
/// Non-positive rates fall back to 1.0.
pub fn rate_to_length_scale(rate: u32, reference_rate: u32) -> f32 {
    if rate == 0 {
        return 1.0;
    }
    let scale = reference_rate as f32 / rate as f32;
    scale.clamp(MIN_LENGTH_SCALE, MAX_LENGTH_SCALE)
}

/// True when `value` is close enough to 1.0 to skip processing
pub fn is_unity(value: f32) -> bool {
    (value - 1.0).abs() < UNITY_EPSILON
}

/// True when the pitch lies inside the supported range
pub fn pitch_in_range(pitch: f32) -> bool {
    (PITCH_MIN..=PITCH_MAX).contains(&pitch)
}

/// Expected configuration sibling of a voice model (`model.onnx.json`)
pub fn model_config_path(model: &Path) -> PathBuf {
    let mut name = model.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}
