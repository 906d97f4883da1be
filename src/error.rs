//! Error types for ttstudio

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ttstudio
#[derive(Error, Debug)]
pub enum StudioError {
    /// Request rejected before any work started (empty text, no voice)
    #[error("{0}")]
    Validation(String),

    #[error("Voice model not found: {}", .0.display())]
    VoiceMissing(PathBuf),

    #[error("Voice configuration not found for {}. Rename the .json file to .onnx.json.", .0.display())]
    ConfigMissing(PathBuf),

    #[error("{tool} not found. {remediation}")]
    ToolUnavailable { tool: String, remediation: String },

    /// External tool ran but exited non-zero; `detail` is its own diagnostic output
    #[error("{detail}")]
    ProcessFailed { tool: String, detail: String },

    #[error("Pitch {0} outside the allowed range (50% to 200%)")]
    PitchOutOfRange(f32),

    #[error("Unsupported sample width: {0} bytes (only 16-bit PCM is supported)")]
    UnsupportedSampleFormat(u16),

    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for ttstudio operations
pub type Result<T> = std::result::Result<T, StudioError>;

impl StudioError {
    /// Failure of the synthesizer process, carrying its diagnostic text
    pub fn synthesis_failed(detail: impl Into<String>) -> Self {
        StudioError::ProcessFailed {
            tool: "piper".to_string(),
            detail: detail.into(),
        }
    }
}

impl From<String> for StudioError {
    fn from(s: String) -> Self {
        StudioError::Other(s)
    }
}

impl From<&str> for StudioError {
    fn from(s: &str) -> Self {
        StudioError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(e: serde_json::Error) -> Self {
        StudioError::Config(format!("JSON error: {}", e))
    }
}

impl From<tempfile::PersistError> for StudioError {
    fn from(e: tempfile::PersistError) -> Self {
        StudioError::Io(e.error)
    }
}

impl From<tempfile::PathPersistError> for StudioError {
    fn from(e: tempfile::PathPersistError) -> Self {
        StudioError::Io(e.error)
    }
}
