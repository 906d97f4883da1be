//! Preview playback through an external player process

use crate::platform::{find_executable, ToolCommand};
use crate::{Result, StudioError};
use log::{debug, error};
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Plays one file at a time; starting a new file stops the previous one
pub struct PreviewPlayer {
    command: ToolCommand,
    current: Option<Child>,
}

impl PreviewPlayer {
    /// Create a player from a command line such as `ffplay -nodisp -autoexit`
    pub fn new(command_line: &str) -> Result<Self> {
        let command = ToolCommand::parse(command_line)
            .ok_or_else(|| StudioError::Config("Player command is empty".to_string()))?;
        Ok(Self {
            command,
            current: None,
        })
    }

    /// Start playing `path` in the background
    pub fn play(&mut self, path: &Path) -> Result<()> {
        self.stop();

        let program = find_executable(
            &self.command.program,
            "Install ffmpeg (which provides ffplay) or set [tools] player in ~/.ttstudio.cfg",
        )?;

        let mut cmd = Command::new(program);
        cmd.args(&self.command.args).arg(path);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        match cmd.spawn() {
            Ok(child) => {
                debug!("Player started for {}", path.display());
                self.current = Some(child);
                Ok(())
            }
            Err(e) => {
                error!("Failed to spawn player: {}", e);
                Err(StudioError::ProcessFailed {
                    tool: self.command.program.clone(),
                    detail: format!("Failed to start player: {}", e),
                })
            }
        }
    }

    /// Whether a preview is still playing
    pub fn is_playing(&mut self) -> bool {
        match self.current.as_mut().map(|child| child.try_wait()) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_))) | Some(Err(_)) => {
                self.current = None;
                false
            }
            None => false,
        }
    }

    /// Stop playback, if any
    pub fn stop(&mut self) {
        if let Some(mut child) = self.current.take() {
            debug!("Stopping player");
            match child.kill() {
                Ok(_) => {
                    let _ = child.wait();
                }
                Err(e) => {
                    debug!("Failed to kill player: {}", e);
                }
            }
        }
    }
}

impl Drop for PreviewPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
