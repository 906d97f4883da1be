//! External executable discovery

use crate::{Result, StudioError};
use log::debug;
use std::path::PathBuf;

/// A configured command line split into program and leading arguments
///
/// Lets `tools/piper = python3 -m piper` work the same as a bare `piper`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Split a command line on whitespace
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

/// Locate an executable on PATH (or verify an explicit path)
///
/// `remediation` is appended to the error so the user knows how to fix it.
pub fn find_executable(program: &str, remediation: &str) -> Result<PathBuf> {
    match which::which(program) {
        Ok(path) => {
            debug!("Found {} at {}", program, path.display());
            Ok(path)
        }
        Err(e) => {
            debug!("Lookup of {} failed: {}", program, e);
            Err(StudioError::ToolUnavailable {
                tool: program.to_string(),
                remediation: remediation.to_string(),
            })
        }
    }
}
