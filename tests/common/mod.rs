//! Test doubles shared by the integration tests
//!
//! The fakes stand in for Piper and ffmpeg so the orchestration and session
//! logic can be exercised without external tools.

#![allow(dead_code)]

use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ttstudio::service::SynthesisService;
use ttstudio::speech::post::{Encoder, ExportFormat, PitchShifter};
use ttstudio::speech::synth::{SynthesisRequest, Synthesizer};
use ttstudio::{Result, StudioError};

/// Longest a gated synthesizer waits before giving up on its gate
const GATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Write a short 16-bit mono WAV file
pub fn write_wav(path: &Path) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: 22050,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for i in 0..220 {
        writer.write_sample(((i % 50) * 100) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Synthesizer that records its calls and can be held on a gate
#[derive(Default)]
pub struct FakeSynth {
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
    failing: AtomicBool,
    gate: Option<Mutex<Receiver<()>>>,
}

impl FakeSynth {
    /// Completes every request immediately
    pub fn instant() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Each request blocks until the returned sender releases it
    pub fn gated() -> (Arc<Self>, Sender<()>) {
        let (release, gate) = mpsc::channel();
        let synth = Self {
            gate: Some(Mutex::new(gate)),
            ..Self::default()
        };
        (Arc::new(synth), release)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Synthesizer for FakeSynth {
    fn synthesize(&self, request: &SynthesisRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(request.text.clone());

        if let Some(gate) = &self.gate {
            let _ = gate.lock().unwrap().recv_timeout(GATE_TIMEOUT);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StudioError::synthesis_failed("boom"));
        }
        write_wav(&request.output);
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Pitch shifter that copies its input and counts renders
#[derive(Default)]
pub struct CountingShifter {
    pub calls: AtomicUsize,
}

impl CountingShifter {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PitchShifter for CountingShifter {
    fn shift_pitch(&self, src: &Path, dest: &Path, _pitch: f32) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if src != dest {
            fs::copy(src, dest)?;
        }
        Ok(())
    }
}

/// Encoder that copies the PCM input and remembers what it was asked for
#[derive(Default)]
pub struct RecordingEncoder {
    pub exports: Mutex<Vec<(PathBuf, ExportFormat, f32)>>,
}

impl Encoder for RecordingEncoder {
    fn export_compressed(
        &self,
        pcm: &Path,
        out: &Path,
        format: ExportFormat,
        volume: f32,
    ) -> Result<()> {
        fs::copy(pcm, out)?;
        self.exports
            .lock()
            .unwrap()
            .push((out.to_path_buf(), format, volume));
        Ok(())
    }
}

/// Pitch shifter that writes part of its output and then fails
#[derive(Default)]
pub struct FailingShifter {
    pub destinations: Mutex<Vec<PathBuf>>,
}

impl PitchShifter for FailingShifter {
    fn shift_pitch(&self, _src: &Path, dest: &Path, _pitch: f32) -> Result<()> {
        self.destinations.lock().unwrap().push(dest.to_path_buf());
        fs::write(dest, b"RIFF")?;
        Err(StudioError::ProcessFailed {
            tool: "ffmpeg".to_string(),
            detail: "shift failed".to_string(),
        })
    }
}

/// Encoder that always fails and records the PCM input it was given
#[derive(Default)]
pub struct FailingEncoder {
    pub inputs: Mutex<Vec<PathBuf>>,
}

impl Encoder for FailingEncoder {
    fn export_compressed(
        &self,
        pcm: &Path,
        _out: &Path,
        _format: ExportFormat,
        _volume: f32,
    ) -> Result<()> {
        self.inputs.lock().unwrap().push(pcm.to_path_buf());
        Err(StudioError::EncoderUnavailable("encode failed".to_string()))
    }
}

/// Service wired to the given post-processing tools
pub fn service_with(
    voices_dir: &Path,
    shifter: Arc<dyn PitchShifter>,
    encoder: Arc<dyn Encoder>,
) -> SynthesisService {
    SynthesisService::new(
        voices_dir.to_path_buf(),
        180,
        FakeSynth::instant(),
        shifter,
        encoder,
    )
}

/// Service wired to the fakes
pub fn fake_service(
    voices_dir: &Path,
    synth: Arc<FakeSynth>,
    shifter: Arc<CountingShifter>,
) -> SynthesisService {
    SynthesisService::new(
        voices_dir.to_path_buf(),
        180,
        synth,
        shifter,
        Arc::new(RecordingEncoder::default()),
    )
}

/// Create a voices directory holding one empty model
pub fn voices_dir(root: &Path) -> PathBuf {
    let dir = root.join("voices");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("en_US-test-medium.onnx"), b"").unwrap();
    dir
}
