//! ttstudio - text-to-speech studio
//!
//! Turns typed text into speech with local Piper voice models, previews it
//! at an adjustable pitch and exports WAV, MP3, OGG or FLAC files.

pub mod audio;
pub mod debounce;
pub mod error;
pub mod job;
pub mod platform;
pub mod player;
pub mod preview;
pub mod service;
pub mod speech;
pub mod state;

pub use error::{Result, StudioError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "ttstudio";
