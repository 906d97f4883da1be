//! ffmpeg backend for pitch shifting and compressed export
//!
//! Both operations render into a scratch file next to the destination and
//! rename it into place, so an existing destination is never left half
//! written.
//!
//! Dependencies:
//! - ffmpeg (install with: sudo apt install ffmpeg)

use crate::audio::pcm::frame_rate_of;
use crate::platform::find_executable;
use crate::speech::post::{pitch_filter, volume_gain_db, Encoder, ExportFormat, PitchShifter};
use crate::speech::synth::{is_unity, pitch_in_range};
use crate::{Result, StudioError};
use log::{debug, info};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempPath;

const PITCH_REMEDIATION: &str = "Install ffmpeg to change pitch, or keep pitch at 100%.";
const ENCODER_REMEDIATION: &str = "Install ffmpeg to export compressed formats.";

/// Pitch shifter and encoder backed by the ffmpeg executable
pub struct FfmpegTools {
    program: String,
}

impl FfmpegTools {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    /// Run an ffmpeg command, turning a non-zero exit into `ProcessFailed`
    fn run(&self, mut cmd: Command, fallback: &str) -> Result<()> {
        debug!("Running {:?}", cmd);
        let output = cmd.output()?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        Err(StudioError::ProcessFailed {
            tool: self.program.clone(),
            detail: if detail.is_empty() {
                fallback.to_string()
            } else {
                detail
            },
        })
    }
}

/// Reserve a scratch file in the destination's directory
///
/// Same directory means the final rename stays on one filesystem. The file
/// is deleted if it is dropped before being persisted.
fn scratch_beside(dest: &Path, suffix: &str) -> Result<TempPath> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file = tempfile::Builder::new()
        .prefix(".ttstudio-")
        .suffix(suffix)
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}

impl PitchShifter for FfmpegTools {
    fn shift_pitch(&self, src: &Path, dest: &Path, pitch: f32) -> Result<()> {
        if is_unity(pitch) {
            if src != dest {
                fs::copy(src, dest)?;
            }
            return Ok(());
        }

        if !pitch_in_range(pitch) {
            return Err(StudioError::PitchOutOfRange(pitch));
        }

        let ffmpeg = find_executable(&self.program, PITCH_REMEDIATION)?;
        let filter = pitch_filter(frame_rate_of(src)?, pitch);
        let scratch = scratch_beside(dest, ".wav")?;

        let mut cmd = Command::new(ffmpeg);
        cmd.args(["-y", "-loglevel", "error", "-i"])
            .arg(src)
            .args(["-filter:a", filter.as_str()])
            .arg(&*scratch);
        self.run(cmd, "Failed to change pitch.")?;

        scratch.persist(dest)?;
        info!("Pitch {:.2} applied: {}", pitch, dest.display());
        Ok(())
    }
}

impl Encoder for FfmpegTools {
    fn export_compressed(
        &self,
        pcm: &Path,
        out: &Path,
        format: ExportFormat,
        volume: f32,
    ) -> Result<()> {
        let ffmpeg = find_executable(&self.program, ENCODER_REMEDIATION)
            .map_err(|e| StudioError::EncoderUnavailable(e.to_string()))?;
        let suffix = format!(".{}", format.identifier());
        let scratch = scratch_beside(out, &suffix)?;

        let mut cmd = Command::new(ffmpeg);
        cmd.args(["-y", "-loglevel", "error", "-i"]).arg(pcm);
        if let Some(db) = volume_gain_db(volume) {
            let gain = format!("volume={:.2}dB", db);
            cmd.args(["-filter:a", gain.as_str()]);
        }
        cmd.args(["-f", format.identifier()]).arg(&*scratch);
        self.run(cmd, "Failed to encode audio.")?;

        scratch.persist(out)?;
        info!("Exported {} ({})", out.display(), format.identifier());
        Ok(())
    }
}
