//! Voice model discovery
//!
//! A voice is a `.onnx` model file. Its configuration lives next to it as
//! `<model>.onnx.json`; when present, a few descriptive fields are read from it.

use super::synth::model_config_path;
use crate::Result;
use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extension that marks a voice model
pub const MODEL_EXTENSION: &str = "onnx";

/// A voice available for synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceDescriptor {
    /// Path to the model file, used as the voice id
    pub id: PathBuf,
    /// Model file stem
    pub display_name: String,
    /// Language code from the model configuration
    pub language: Option<String>,
    /// Quality tier from the model configuration
    pub quality: Option<String>,
    /// Native sample rate from the model configuration
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelConfig {
    #[serde(default)]
    audio: AudioSection,
    language: Option<LanguageSection>,
}

#[derive(Debug, Default, Deserialize)]
struct AudioSection {
    sample_rate: Option<u32>,
    quality: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LanguageSection {
    code: Option<String>,
}

impl VoiceDescriptor {
    /// Describe a model file, reading its configuration if one exists
    pub fn from_model(path: &Path) -> Self {
        let display_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let config = read_model_config(path).unwrap_or_default();

        Self {
            id: path.to_path_buf(),
            display_name,
            language: config.language.and_then(|l| l.code),
            quality: config.audio.quality,
            sample_rate: config.audio.sample_rate,
        }
    }
}

fn read_model_config(model: &Path) -> Option<ModelConfig> {
    let path = model_config_path(model);
    let text = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&text) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Ignoring unreadable voice config {}: {}", path.display(), e);
            None
        }
    }
}

/// List voice models in `dir`, sorted by path
///
/// A missing directory yields an empty list.
pub fn list_voices(dir: &Path) -> Result<Vec<VoiceDescriptor>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Voices directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut models = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == MODEL_EXTENSION) {
            models.push(path);
        }
    }
    models.sort();

    debug!("Found {} voices in {}", models.len(), dir.display());
    Ok(models.iter().map(|p| VoiceDescriptor::from_model(p)).collect())
}
