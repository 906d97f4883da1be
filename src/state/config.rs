//! Configuration management

use crate::speech::synth::DEFAULT_REFERENCE_RATE;
use crate::{Result, StudioError};
use ini::Ini;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persistent settings stored in an INI file
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path (~/.ttstudio.cfg by default)
    path: PathBuf,
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, creating it with defaults if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(path)
                .map_err(|e| StudioError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default");
            let default = Self::default_config();
            default
                .write_to_file(path)
                .map_err(|e| StudioError::IniParse(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self {
            ini,
            path: path.to_path_buf(),
        })
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        debug!("Saving config to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| StudioError::Config(format!("Failed to save config: {}", e)))
    }

    /// Default config file path (~/.ttstudio.cfg)
    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ttstudio.cfg")
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_voices_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ttstudio")
            .join("voices")
    }

    /// Create default configuration
    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("voices"))
            .set("dir", Self::default_voices_dir().to_string_lossy());

        ini.with_section(Some("speech"))
            .set("rate", DEFAULT_REFERENCE_RATE.to_string())
            .set("reference_rate", DEFAULT_REFERENCE_RATE.to_string())
            .set("volume", "0.9")
            .set("pitch", "1.0");

        ini.with_section(Some("tools"))
            .set("piper", "piper")
            .set("ffmpeg", "ffmpeg")
            .set("player", "ffplay -nodisp -autoexit -loglevel quiet");

        ini.with_section(Some("auto"))
            .set("short_delay_ms", "500")
            .set("long_delay_ms", "1200");

        ini
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get an integer value from config
    pub fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get a float value from config
    pub fn get_float(&self, section: &str, key: &str, default: f32) -> f32 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    // Studio-specific configuration getters

    /// Directory scanned for voice models
    pub fn voices_dir(&self) -> PathBuf {
        self.ini
            .get_from(Some("voices"), "dir")
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_voices_dir)
    }

    pub fn set_voices_dir(&mut self, dir: &Path) {
        self.set("voices", "dir", &dir.to_string_lossy());
    }

    /// Initial speaking rate
    pub fn rate(&self) -> u32 {
        u32::try_from(self.get_int("speech", "rate", DEFAULT_REFERENCE_RATE as i64))
            .unwrap_or(DEFAULT_REFERENCE_RATE)
    }

    /// Rate that maps to a length scale of 1.0
    pub fn reference_rate(&self) -> u32 {
        u32::try_from(self.get_int("speech", "reference_rate", DEFAULT_REFERENCE_RATE as i64))
            .ok()
            .filter(|&r| r > 0)
            .unwrap_or(DEFAULT_REFERENCE_RATE)
    }

    /// Initial volume, clamped to [0, 2]
    pub fn volume(&self) -> f32 {
        self.get_float("speech", "volume", 0.9).clamp(0.0, 2.0)
    }

    /// Initial pitch, clamped to [0.5, 2.0]
    pub fn pitch(&self) -> f32 {
        self.get_float("speech", "pitch", 1.0).clamp(0.5, 2.0)
    }

    /// Command line used to run the synthesizer
    pub fn piper_command(&self) -> String {
        self.get_string("tools", "piper", "piper")
    }

    pub fn ffmpeg_program(&self) -> String {
        self.get_string("tools", "ffmpeg", "ffmpeg")
    }

    /// Command line used to play previews
    pub fn player_command(&self) -> String {
        self.get_string("tools", "player", "ffplay -nodisp -autoexit -loglevel quiet")
    }

    /// Debounce delay for ordinary edits
    pub fn short_delay(&self) -> Duration {
        Duration::from_millis(self.get_int("auto", "short_delay_ms", 500).max(0) as u64)
    }

    /// Debounce delay for pastes and long texts
    pub fn long_delay(&self) -> Duration {
        Duration::from_millis(self.get_int("auto", "long_delay_ms", 1200).max(0) as u64)
    }
}
