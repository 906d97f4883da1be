//! Synthesis service
//!
//! Façade over the voice directory, the synthesizer and the post-processing
//! tools. Every operation is keyed by explicit file paths; the only mutable
//! field is the voices directory.

use crate::audio::pcm::{apply_gain, read_pcm_file, write_pcm_file, Gain};
use crate::speech::backends::ffmpeg::FfmpegTools;
use crate::speech::backends::piper::PiperSynth;
use crate::speech::post::{Encoder, ExportFormat, PitchShifter};
use crate::speech::synth::{
    is_unity, rate_to_length_scale, SynthesisConfig, SynthesisRequest, Synthesizer,
};
use crate::speech::voices::{list_voices, VoiceDescriptor};
use crate::state::config::Config;
use crate::{Result, StudioError};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;

/// Upper bound of the linear volume control
pub const MAX_VOLUME: f32 = 2.0;

/// Entry point for synthesis and post-processing
pub struct SynthesisService {
    voices_dir: PathBuf,
    reference_rate: u32,
    synthesizer: Arc<dyn Synthesizer>,
    pitch_shifter: Arc<dyn PitchShifter>,
    encoder: Arc<dyn Encoder>,
}

impl SynthesisService {
    pub fn new(
        voices_dir: PathBuf,
        reference_rate: u32,
        synthesizer: Arc<dyn Synthesizer>,
        pitch_shifter: Arc<dyn PitchShifter>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        Self {
            voices_dir,
            reference_rate,
            synthesizer,
            pitch_shifter,
            encoder,
        }
    }

    /// Build the service with the Piper and ffmpeg backends named in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let synth = PiperSynth::new(&config.piper_command())?;
        let ffmpeg = Arc::new(FfmpegTools::new(&config.ffmpeg_program()));
        info!(
            "Service using {} with ffmpeg '{}'",
            synth.name(),
            config.ffmpeg_program()
        );

        Ok(Self::new(
            config.voices_dir(),
            config.reference_rate(),
            Arc::new(synth),
            ffmpeg.clone(),
            ffmpeg,
        ))
    }

    pub fn voices_dir(&self) -> &Path {
        &self.voices_dir
    }

    /// Switch the voices directory; the next listing reflects it
    pub fn set_voices_dir(&mut self, dir: PathBuf) {
        info!("Voices directory set to {}", dir.display());
        self.voices_dir = dir;
    }

    /// Enumerate voices in the current directory (never cached)
    pub fn list_voices(&self) -> Result<Vec<VoiceDescriptor>> {
        list_voices(&self.voices_dir)
    }

    /// Shared handle to the synthesizer for background execution
    pub fn synthesizer(&self) -> Arc<dyn Synthesizer> {
        Arc::clone(&self.synthesizer)
    }

    pub fn reference_rate(&self) -> u32 {
        self.reference_rate
    }

    /// Validate a request and resolve it into a synthesizer invocation
    pub fn build_request(
        &self,
        text: &str,
        config: &SynthesisConfig,
        output: &Path,
    ) -> Result<SynthesisRequest> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StudioError::Validation(
                "Type some text to generate audio.".to_string(),
            ));
        }
        let voice = config
            .voice_id
            .clone()
            .ok_or_else(|| StudioError::Validation("Select a .onnx voice.".to_string()))?;

        Ok(SynthesisRequest {
            text: text.to_string(),
            voice,
            length_scale: rate_to_length_scale(config.rate, self.reference_rate),
            output: output.to_path_buf(),
        })
    }

    /// Synthesize on the calling thread into a fresh temporary WAV file
    pub fn synthesize_to_temp(&self, text: &str, config: &SynthesisConfig) -> Result<TempPath> {
        let output = new_temp_wav()?;
        let request = self.build_request(text, config, &output)?;
        self.synthesizer.synthesize(&request)?;
        Ok(output)
    }

    pub fn shift_pitch(&self, src: &Path, dest: &Path, pitch: f32) -> Result<()> {
        self.pitch_shifter.shift_pitch(src, dest, pitch)
    }

    /// Handle to the pitch shifter, for the preview cache
    pub fn pitch_shifter(&self) -> &dyn PitchShifter {
        self.pitch_shifter.as_ref()
    }

    /// Write `src` to `dest` with a linear volume applied
    ///
    /// Volume is clamped to [0, 2]. Audio that is not 16-bit is copied
    /// through unchanged.
    pub fn apply_gain_to_file(&self, src: &Path, dest: &Path, volume: f32) -> Result<()> {
        let factor = volume.clamp(0.0, MAX_VOLUME);
        if is_unity(factor) {
            return copy_through(src, dest);
        }

        let buffer = match read_pcm_file(src) {
            Ok(buffer) => buffer,
            Err(StudioError::UnsupportedSampleFormat(width)) => {
                warn!("{}, volume left unchanged", StudioError::UnsupportedSampleFormat(width));
                return copy_through(src, dest);
            }
            Err(e) => return Err(e),
        };
        match apply_gain(&buffer, factor) {
            Gain::Applied(out) => write_pcm_file(dest, &out),
            Gain::Identity => copy_through(src, dest),
            Gain::Unsupported(width) => {
                warn!("{}, volume left unchanged", StudioError::UnsupportedSampleFormat(width));
                copy_through(src, dest)
            }
        }
    }

    pub fn export_compressed(
        &self,
        pcm: &Path,
        out: &Path,
        format: ExportFormat,
        volume: f32,
    ) -> Result<()> {
        self.encoder.export_compressed(pcm, out, format, volume)
    }

    /// Post-process a synthesis result and write it to `out`
    ///
    /// The container is chosen from the extension of `out`. Pitch is
    /// rendered into a scratch file that is removed on every exit path.
    pub fn export(&self, src: &Path, out: &Path, pitch: f32, volume: f32) -> Result<()> {
        let format = ExportFormat::from_path(out)?;

        let mut pitched: Option<TempPath> = None;
        let source = if is_unity(pitch) {
            src
        } else {
            let scratch: &Path = pitched.insert(new_temp_wav()?);
            self.shift_pitch(src, scratch, pitch)?;
            scratch
        };

        if format.is_compressed() {
            self.export_compressed(source, out, format, volume)
        } else {
            self.apply_gain_to_file(source, out, volume)
        }
    }
}

fn copy_through(src: &Path, dest: &Path) -> Result<()> {
    if src != dest {
        fs::copy(src, dest)?;
    }
    Ok(())
}

/// Allocate an empty temporary WAV file, removed when the handle drops
pub fn new_temp_wav() -> Result<TempPath> {
    let file = tempfile::Builder::new()
        .prefix("ttstudio-")
        .suffix(".wav")
        .tempfile()?;
    let path = file.into_temp_path();
    debug!("Allocated {}", path.display());
    Ok(path)
}
