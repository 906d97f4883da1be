//! Piper backend
//!
//! Runs the `piper` command line once per request, writing a WAV file.
//! The command is configurable so `python3 -m piper` works as well as an
//! installed `piper` script.
//!
//! Dependencies:
//! - piper-tts (install with: pip install piper-tts)

use crate::platform::{find_executable, ToolCommand};
use crate::speech::synth::{model_config_path, SynthesisRequest, Synthesizer};
use crate::{Result, StudioError};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const REMEDIATION: &str = "Install it with: pip install piper-tts";

/// Piper synthesizer invoked as a subprocess
pub struct PiperSynth {
    command: ToolCommand,
}

impl PiperSynth {
    /// Create a backend for the given command line
    ///
    /// The executable is looked up per request so a missing install is
    /// reported to the user instead of preventing startup.
    pub fn new(command_line: &str) -> Result<Self> {
        let command = ToolCommand::parse(command_line)
            .ok_or_else(|| StudioError::Config("Empty piper command".to_string()))?;
        debug!("Piper command: {:?}", command);
        Ok(Self { command })
    }

    /// Make sure `<model>.onnx.json` exists
    ///
    /// Voices are often distributed with `<model>.json`; that file is copied
    /// to the name piper expects. Returns `None` when neither exists or the
    /// copy fails.
    pub fn ensure_model_config(model: &Path) -> Option<PathBuf> {
        let expected = model_config_path(model);
        if expected.exists() {
            return Some(expected);
        }

        let alt = model.with_extension("json");
        if alt.exists() {
            return match fs::copy(&alt, &expected) {
                Ok(_) => {
                    info!("Copied {} to {}", alt.display(), expected.display());
                    Some(expected)
                }
                Err(e) => {
                    debug!("Failed to copy voice config: {}", e);
                    None
                }
            };
        }

        None
    }

    fn build_command(&self, program: &Path, request: &SynthesisRequest) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(&self.command.args);
        cmd.arg("-m").arg(&request.voice);
        cmd.arg("-f").arg(&request.output);
        cmd.arg("--length_scale")
            .arg(format!("{:.3}", request.length_scale));
        cmd.arg("--").arg(&request.text);
        cmd
    }
}

impl Synthesizer for PiperSynth {
    fn synthesize(&self, request: &SynthesisRequest) -> Result<()> {
        if !request.voice.exists() {
            return Err(StudioError::VoiceMissing(request.voice.clone()));
        }
        if Self::ensure_model_config(&request.voice).is_none() {
            return Err(StudioError::ConfigMissing(request.voice.clone()));
        }

        let program = find_executable(&self.command.program, REMEDIATION)?;
        let mut cmd = self.build_command(&program, request);
        debug!(
            "Running piper: voice={} length_scale={:.3} chars={}",
            request.voice.display(),
            request.length_scale,
            request.text.chars().count()
        );

        let output = cmd.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            let detail = if detail.is_empty() {
                "Piper failed to run."
            } else {
                detail
            };
            return Err(StudioError::synthesis_failed(detail));
        }

        info!("Synthesized {}", request.output.display());
        Ok(())
    }

    fn name(&self) -> &str {
        "piper"
    }
}
