//! Single-flight job orchestration tests
//!
//! A gated fake synthesizer keeps a job running while further requests
//! arrive, so coalescing and pending-action priority can be observed.

mod common;

use common::{fake_service, voices_dir, CountingShifter, FakeSynth};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use ttstudio::job::{JobState, Orchestrator, PendingAction, Submission, Trigger};
use ttstudio::speech::synth::SynthesisConfig;
use ttstudio::StudioError;

const WAIT: Duration = Duration::from_secs(5);

fn config_with_voice(voice: PathBuf) -> SynthesisConfig {
    SynthesisConfig {
        voice_id: Some(voice),
        ..SynthesisConfig::default()
    }
}

#[test]
fn test_single_flight_coalesces_second_request() {
    let root = tempfile::tempdir().unwrap();
    let voices = voices_dir(root.path());
    let (synth, release) = FakeSynth::gated();
    let service = fake_service(&voices, synth.clone(), Arc::new(CountingShifter::default()));
    let mut orch = Orchestrator::new(service.synthesizer()).unwrap();
    let config = config_with_voice(voices.join("en_US-test-medium.onnx"));

    let first = orch
        .generate(&service, "hello", &config, Trigger::Manual)
        .unwrap();
    assert_eq!(first, Submission::Started(1));
    assert!(orch.is_busy());
    assert_eq!(orch.running().map(|job| job.state), Some(JobState::Running));

    let second = orch
        .generate(&service, "hello again", &config, Trigger::Auto)
        .unwrap();
    assert_eq!(second, Submission::Coalesced);
    assert_eq!(orch.pending(), Some(&PendingAction::AutoRetry));
    assert!(orch.poll().is_none());

    release.send(()).unwrap();
    let finished = orch.wait(WAIT).expect("job should finish");
    assert_eq!(finished.id, 1);
    assert_eq!(finished.text, "hello");
    assert_eq!(finished.state, JobState::Succeeded);
    assert!(!finished.discarded);
    assert!(finished.outcome.is_ok());
    assert_eq!(finished.pending, Some(PendingAction::AutoRetry));

    assert_eq!(synth.call_count(), 1);
    assert!(!orch.is_busy());
    assert!(orch.pending().is_none());
}

#[test]
fn test_save_outranks_preview_and_auto() {
    let root = tempfile::tempdir().unwrap();
    let voices = voices_dir(root.path());
    let (synth, release) = FakeSynth::gated();
    let service = fake_service(&voices, synth.clone(), Arc::new(CountingShifter::default()));
    let mut orch = Orchestrator::new(service.synthesizer()).unwrap();
    let config = config_with_voice(voices.join("en_US-test-medium.onnx"));
    let out = root.path().join("out.mp3");

    orch.generate(&service, "text", &config, Trigger::Manual)
        .unwrap();
    orch.generate(&service, "text", &config, Trigger::Auto)
        .unwrap();
    assert_eq!(orch.pending(), Some(&PendingAction::AutoRetry));

    orch.generate(&service, "text", &config, Trigger::Save(out.clone()))
        .unwrap();
    assert_eq!(orch.pending(), Some(&PendingAction::Save(out.clone())));

    // A preview arriving after the save does not displace it
    orch.generate(&service, "text", &config, Trigger::Preview)
        .unwrap();
    orch.generate(&service, "text", &config, Trigger::Auto)
        .unwrap();
    assert_eq!(orch.pending(), Some(&PendingAction::Save(out.clone())));

    release.send(()).unwrap();
    let finished = orch.wait(WAIT).unwrap();
    assert_eq!(finished.pending, Some(PendingAction::Save(out)));
    assert_eq!(synth.call_count(), 1);
}

#[test]
fn test_preview_outranks_auto() {
    let root = tempfile::tempdir().unwrap();
    let voices = voices_dir(root.path());
    let (synth, release) = FakeSynth::gated();
    let service = fake_service(&voices, synth, Arc::new(CountingShifter::default()));
    let mut orch = Orchestrator::new(service.synthesizer()).unwrap();
    let config = config_with_voice(voices.join("en_US-test-medium.onnx"));

    orch.generate(&service, "text", &config, Trigger::Manual)
        .unwrap();
    orch.generate(&service, "text", &config, Trigger::Preview)
        .unwrap();
    orch.generate(&service, "text", &config, Trigger::Manual)
        .unwrap();
    assert_eq!(orch.pending(), Some(&PendingAction::Preview));

    release.send(()).unwrap();
    assert_eq!(orch.wait(WAIT).unwrap().pending, Some(PendingAction::Preview));
}

#[test]
fn test_failure_discards_pending() {
    let root = tempfile::tempdir().unwrap();
    let voices = voices_dir(root.path());
    let (synth, release) = FakeSynth::gated();
    synth.set_failing(true);
    let service = fake_service(&voices, synth.clone(), Arc::new(CountingShifter::default()));
    let mut orch = Orchestrator::new(service.synthesizer()).unwrap();
    let config = config_with_voice(voices.join("en_US-test-medium.onnx"));

    orch.generate(&service, "text", &config, Trigger::Manual)
        .unwrap();
    orch.generate(&service, "text", &config, Trigger::Save(root.path().join("x.wav")))
        .unwrap();

    release.send(()).unwrap();
    let finished = orch.wait(WAIT).unwrap();
    assert_eq!(finished.state, JobState::Failed);
    match finished.outcome {
        Err(StudioError::ProcessFailed { detail, .. }) => assert_eq!(detail, "boom"),
        other => panic!("expected ProcessFailed, got {:?}", other),
    }
    assert!(finished.pending.is_none());
    assert!(orch.pending().is_none());
    assert!(!orch.is_busy());
    assert_eq!(synth.call_count(), 1);
}

#[test]
fn test_validation_errors_change_nothing() {
    let root = tempfile::tempdir().unwrap();
    let voices = voices_dir(root.path());
    let synth = FakeSynth::instant();
    let service = fake_service(&voices, synth.clone(), Arc::new(CountingShifter::default()));
    let mut orch = Orchestrator::new(service.synthesizer()).unwrap();

    let with_voice = config_with_voice(voices.join("en_US-test-medium.onnx"));
    match orch.generate(&service, "   \n", &with_voice, Trigger::Manual) {
        Err(StudioError::Validation(msg)) => assert_eq!(msg, "Type some text to generate audio."),
        other => panic!("expected Validation, got {:?}", other),
    }

    let no_voice = SynthesisConfig::default();
    match orch.generate(&service, "hello", &no_voice, Trigger::Preview) {
        Err(StudioError::Validation(msg)) => assert_eq!(msg, "Select a .onnx voice."),
        other => panic!("expected Validation, got {:?}", other),
    }

    assert!(!orch.is_busy());
    assert!(orch.pending().is_none());
    assert!(orch.wait(Duration::from_millis(50)).is_none());
    assert_eq!(synth.call_count(), 0);
}

#[test]
fn test_preview_trigger_while_idle_records_followup() {
    let root = tempfile::tempdir().unwrap();
    let voices = voices_dir(root.path());
    let synth = FakeSynth::instant();
    let service = fake_service(&voices, synth, Arc::new(CountingShifter::default()));
    let mut orch = Orchestrator::new(service.synthesizer()).unwrap();
    let config = config_with_voice(voices.join("en_US-test-medium.onnx"));

    let submission = orch
        .generate(&service, "  padded text ", &config, Trigger::Preview)
        .unwrap();
    assert_eq!(submission, Submission::Started(1));
    assert_eq!(orch.running().map(|job| job.text.as_str()), Some("padded text"));

    let finished = orch.wait(WAIT).unwrap();
    assert_eq!(finished.pending, Some(PendingAction::Preview));
}

#[test]
fn test_result_file_removed_when_dropped() {
    let root = tempfile::tempdir().unwrap();
    let voices = voices_dir(root.path());
    let synth = FakeSynth::instant();
    let service = fake_service(&voices, synth, Arc::new(CountingShifter::default()));
    let mut orch = Orchestrator::new(service.synthesizer()).unwrap();
    let config = config_with_voice(voices.join("en_US-test-medium.onnx"));

    orch.generate(&service, "hello", &config, Trigger::Manual)
        .unwrap();
    let result = orch.wait(WAIT).unwrap().outcome.unwrap();
    let path = result.to_path_buf();
    assert!(path.exists());

    drop(result);
    assert!(!path.exists());
}

#[test]
fn test_job_ids_increase() {
    let root = tempfile::tempdir().unwrap();
    let voices = voices_dir(root.path());
    let synth = FakeSynth::instant();
    let service = fake_service(&voices, synth.clone(), Arc::new(CountingShifter::default()));
    let mut orch = Orchestrator::new(service.synthesizer()).unwrap();
    let config = config_with_voice(voices.join("en_US-test-medium.onnx"));

    for expected in 1..=3 {
        let submission = orch
            .generate(&service, "again", &config, Trigger::Manual)
            .unwrap();
        assert_eq!(submission, Submission::Started(expected));
        assert_eq!(orch.wait(WAIT).unwrap().id, expected);
    }
    assert_eq!(synth.call_count(), 3);
}

#[test]
fn test_discard_drops_earlier_pending() {
    let root = tempfile::tempdir().unwrap();
    let voices = voices_dir(root.path());
    let (synth, release) = FakeSynth::gated();
    let service = fake_service(&voices, synth, Arc::new(CountingShifter::default()));
    let mut orch = Orchestrator::new(service.synthesizer()).unwrap();
    let config = config_with_voice(voices.join("en_US-test-medium.onnx"));

    assert!(!orch.discard_running());
    orch.generate(&service, "text", &config, Trigger::Manual)
        .unwrap();
    orch.generate(&service, "text", &config, Trigger::Preview)
        .unwrap();
    assert!(orch.discard_running());
    assert!(orch.running().map_or(false, |job| job.discarded));
    assert!(orch.pending().is_none());

    // Requests made after the discard are handed back with the finished job
    orch.generate(&service, "text", &config, Trigger::Auto)
        .unwrap();
    assert_eq!(orch.pending(), Some(&PendingAction::AutoRetry));

    release.send(()).unwrap();
    let finished = orch.wait(WAIT).unwrap();
    assert!(finished.discarded);
    assert_eq!(finished.state, JobState::Succeeded);
    assert_eq!(finished.pending, Some(PendingAction::AutoRetry));
    assert!(orch.pending().is_none());
}

#[test]
fn test_discarded_failure_keeps_later_request() {
    let root = tempfile::tempdir().unwrap();
    let voices = voices_dir(root.path());
    let (synth, release) = FakeSynth::gated();
    synth.set_failing(true);
    let service = fake_service(&voices, synth, Arc::new(CountingShifter::default()));
    let mut orch = Orchestrator::new(service.synthesizer()).unwrap();
    let config = config_with_voice(voices.join("en_US-test-medium.onnx"));

    orch.generate(&service, "text", &config, Trigger::Manual)
        .unwrap();
    orch.discard_running();
    orch.generate(&service, "text", &config, Trigger::Preview)
        .unwrap();

    release.send(()).unwrap();
    let finished = orch.wait(WAIT).unwrap();
    assert!(finished.discarded);
    assert_eq!(finished.state, JobState::Failed);
    assert_eq!(finished.pending, Some(PendingAction::Preview));
}
