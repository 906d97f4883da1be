//! Session state
//!
//! The Session is the object a front end talks to. It owns the current
//! selection and text, the last synthesis result, the preview cache, the
//! auto-generate timer and the job orchestrator, and reports back through
//! the `StudioEvents` callbacks.

pub mod config;

use crate::debounce::AutoGenerateTrigger;
use crate::job::{FinishedJob, Orchestrator, PendingAction, Submission, Trigger};
use crate::preview::PreviewCache;
use crate::service::SynthesisService;
use crate::speech::post::ExportFormat;
use crate::speech::synth::SynthesisConfig;
use crate::speech::voices::VoiceDescriptor;
use crate::{Result, StudioError};
use config::Config;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempPath;

/// Notifications sent from the session to the front end
pub trait StudioEvents {
    /// A synthesis job started or finished
    fn on_busy_changed(&mut self, busy: bool);

    /// Short human-readable status line
    fn on_status_message(&mut self, message: &str);

    /// Outcome of a synthesis job
    fn on_generation_result(&mut self, ok: bool, message: &str, path: Option<&Path>);

    /// Preview audio is ready to be played
    fn on_preview_ready(&mut self, path: &Path);
}

/// Interactive synthesis session
pub struct Session<E: StudioEvents> {
    /// Configuration loaded from ~/.ttstudio.cfg
    pub config: Config,

    service: SynthesisService,
    orchestrator: Orchestrator,

    /// Pitch-shifted derivative of `last_synthesis`
    preview: PreviewCache,

    trigger: AutoGenerateTrigger,

    /// Most recent successful synthesis, deleted when replaced
    last_synthesis: Option<TempPath>,

    /// Current voice, rate, volume and pitch
    selection: SynthesisConfig,

    text: String,

    events: E,
}

impl<E: StudioEvents> Session<E> {
    /// Create a session and select the first available voice
    pub fn new(config: Config, service: SynthesisService, events: E) -> Result<Self> {
        let orchestrator = Orchestrator::new(service.synthesizer())?;
        let trigger = AutoGenerateTrigger::with_delays(config.short_delay(), config.long_delay());

        let voice_id = service.list_voices()?.into_iter().next().map(|v| v.id);
        let selection = SynthesisConfig {
            voice_id,
            rate: config.rate(),
            volume: config.volume(),
            pitch: config.pitch(),
        };
        info!("Session ready, voices in {}", service.voices_dir().display());

        Ok(Self {
            config,
            service,
            orchestrator,
            preview: PreviewCache::new(),
            trigger,
            last_synthesis: None,
            selection,
            text: String::new(),
            events,
        })
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    pub fn service(&self) -> &SynthesisService {
        &self.service
    }

    pub fn selection(&self) -> &SynthesisConfig {
        &self.selection
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn trigger(&self) -> &AutoGenerateTrigger {
        &self.trigger
    }

    pub fn is_busy(&self) -> bool {
        self.orchestrator.is_busy()
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.orchestrator.pending()
    }

    /// Path of the last synthesis result
    pub fn last_synthesis(&self) -> Option<&Path> {
        self.last_synthesis.as_deref()
    }

    pub fn list_voices(&self) -> Result<Vec<VoiceDescriptor>> {
        self.service.list_voices()
    }

    /// Replace the text buffer
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.trigger.on_text_changed(self.text.chars().count());
    }

    pub fn select_voice(&mut self, voice: Option<PathBuf>) {
        self.selection.voice_id = voice;
        self.trigger.on_params_changed();
    }

    pub fn set_rate(&mut self, rate: u32) {
        self.selection.rate = rate;
        self.trigger.on_params_changed();
    }

    /// Volume only affects export; it never triggers a new synthesis
    pub fn set_volume(&mut self, volume: f32) {
        self.selection.volume = volume.clamp(0.0, 2.0);
    }

    /// Change pitch; the cached preview is dropped
    pub fn set_pitch(&mut self, pitch: f32) {
        self.selection.pitch = pitch;
        self.preview.invalidate();
        self.trigger.on_params_changed();
    }

    /// Switch the voices directory and re-enumerate voices
    ///
    /// The previous synthesis result, the preview and any job still running
    /// no longer apply. The directory is persisted last; failing to save the
    /// config is reported but leaves the switch in effect.
    pub fn set_voices_directory(&mut self, dir: &Path) -> Result<Vec<VoiceDescriptor>> {
        self.service.set_voices_dir(dir.to_path_buf());
        self.orchestrator.discard_running();
        self.last_synthesis = None;
        self.preview.invalidate();

        let voices = self.service.list_voices()?;
        if voices.is_empty() {
            self.events
                .on_status_message("No .onnx files found in the selected folder.");
        }
        self.selection.voice_id = voices.first().map(|v| v.id.clone());

        self.config.set_voices_dir(dir);
        if let Err(e) = self.config.save() {
            warn!("Failed to save config: {}", e);
            self.events
                .on_status_message(&format!("Failed to save config: {}", e));
        }
        Ok(voices)
    }

    /// Manual generation; also opens the auto-generation latch
    pub fn generate(&mut self) -> Result<Submission> {
        self.trigger.enable();
        self.submit(Trigger::Manual)
    }

    /// Play the current result, generating one first if needed
    pub fn request_preview(&mut self) -> Result<()> {
        if !self.is_busy() && self.last_synthesis.is_some() {
            return self.play_preview();
        }
        self.trigger.enable();
        self.submit(Trigger::Preview).map(|_| ())
    }

    /// Save the current result to `path`, generating one first if needed
    pub fn request_save(&mut self, path: &Path) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(StudioError::Validation(
                "Type some text to generate audio.".to_string(),
            ));
        }
        ExportFormat::from_path(path)?;

        if !self.is_busy() && self.last_synthesis.is_some() {
            return self.save_to_path(path);
        }
        self.trigger.enable();
        self.submit(Trigger::Save(path.to_path_buf())).map(|_| ())
    }

    /// Process a finished job and a due timer, without blocking
    ///
    /// Returns true when anything happened.
    pub fn poll(&mut self) -> bool {
        let mut progressed = false;
        if let Some(finished) = self.orchestrator.poll() {
            self.handle_finished(finished);
            progressed = true;
        }
        if self.trigger.take_due() {
            self.auto_generate();
            progressed = true;
        }
        progressed
    }

    /// Block up to `timeout` for the running job to finish
    pub fn wait_for_job(&mut self, timeout: Duration) -> bool {
        match self.orchestrator.wait(timeout) {
            Some(finished) => {
                self.handle_finished(finished);
                true
            }
            None => false,
        }
    }

    /// How long the caller may sleep before the next `poll` is needed
    pub fn next_wakeup(&self) -> Option<Duration> {
        self.trigger.time_until_due()
    }

    fn submit(&mut self, trigger: Trigger) -> Result<Submission> {
        let submission =
            self.orchestrator
                .generate(&self.service, &self.text, &self.selection, trigger)?;
        if let Submission::Started(_) = submission {
            self.trigger.cancel();
            self.events.on_busy_changed(true);
            self.events.on_status_message("Processing...");
        }
        Ok(submission)
    }

    fn auto_generate(&mut self) {
        match self.submit(Trigger::Auto) {
            Ok(submission) => debug!("Auto-generation: {:?}", submission),
            Err(StudioError::Validation(msg)) => debug!("Auto-generation skipped: {}", msg),
            Err(e) => self.events.on_status_message(&e.to_string()),
        }
    }

    fn handle_finished(&mut self, finished: FinishedJob) {
        self.events.on_busy_changed(false);
        self.events.on_status_message("Ready");

        if finished.discarded {
            // Dropping the outcome deletes its file
            info!("Ignoring result of discarded job {}", finished.id);
            if let Some(action) = finished.pending {
                self.resubmit(action);
            }
            return;
        }

        let path = match finished.outcome {
            Ok(path) => path,
            Err(e) => {
                let message = e.to_string();
                self.events.on_status_message(&message);
                self.events.on_generation_result(false, &message, None);
                return;
            }
        };

        self.preview.invalidate();
        let last: &Path = self.last_synthesis.insert(path);
        self.events.on_generation_result(true, "OK", Some(last));
        self.events
            .on_status_message("Audio generated in temporary buffer");

        let followup = match finished.pending {
            Some(PendingAction::Save(path)) => self.save_to_path(&path),
            Some(PendingAction::Preview) => self.play_preview(),
            Some(PendingAction::AutoRetry) => {
                self.trigger.schedule_short();
                Ok(())
            }
            None => Ok(()),
        };
        if let Err(e) = followup {
            error!("Follow-up after job {} failed: {}", finished.id, e);
            self.events.on_status_message(&e.to_string());
        }
    }

    /// Run a follow-up that was waiting on a discarded job with a fresh job
    fn resubmit(&mut self, action: PendingAction) {
        let trigger = match action {
            PendingAction::AutoRetry => {
                self.trigger.schedule_short();
                return;
            }
            PendingAction::Preview => Trigger::Preview,
            PendingAction::Save(path) => Trigger::Save(path),
        };
        if let Err(e) = self.submit(trigger) {
            error!("Could not restart follow-up: {}", e);
            self.events.on_status_message(&e.to_string());
        }
    }

    fn play_preview(&mut self) -> Result<()> {
        let source = self
            .last_synthesis
            .as_deref()
            .ok_or_else(|| StudioError::Other("No audio generated yet".to_string()))?;
        let path =
            self.preview
                .get_or_render(source, self.selection.pitch, self.service.pitch_shifter())?;

        self.events.on_preview_ready(&path);
        self.events.on_status_message("Playing preview");
        Ok(())
    }

    fn save_to_path(&mut self, path: &Path) -> Result<()> {
        let source = self
            .last_synthesis
            .as_deref()
            .ok_or_else(|| StudioError::Other("No audio generated yet".to_string()))?;
        self.service
            .export(source, path, self.selection.pitch, self.selection.volume)?;

        info!("Saved {}", path.display());
        self.events
            .on_status_message(&format!("Saved: {}", path.display()));
        Ok(())
    }
}
