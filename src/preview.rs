//! Preview cache
//!
//! Keeps one pitch-shifted copy of the latest synthesis result. The entry
//! is keyed by the source path and the pitch, so a new synthesis result is
//! a miss even without an explicit invalidation.

use crate::service::new_temp_wav;
use crate::speech::post::PitchShifter;
use crate::speech::synth::{is_unity, UNITY_EPSILON};
use crate::Result;
use log::debug;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

struct PreviewEntry {
    source: PathBuf,
    pitch: f32,
    /// Owned by the cache; deleted when the entry is replaced or cleared
    derived: TempPath,
}

/// Single-entry cache of pitch-shifted preview audio
#[derive(Default)]
pub struct PreviewCache {
    entry: Option<PreviewEntry>,
}

impl PreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Audio to play for `source` at `pitch`
    ///
    /// Unity pitch plays the source itself. Otherwise a matching entry is
    /// reused, or the shifter renders a new one that replaces it.
    pub fn get_or_render(
        &mut self,
        source: &Path,
        pitch: f32,
        shifter: &dyn PitchShifter,
    ) -> Result<PathBuf> {
        if is_unity(pitch) {
            self.invalidate();
            return Ok(source.to_path_buf());
        }

        if let Some(entry) = &self.entry {
            if entry.source == source
                && (entry.pitch - pitch).abs() < UNITY_EPSILON
                && entry.derived.exists()
            {
                debug!("Preview cache hit at pitch {:.2}", pitch);
                return Ok(entry.derived.to_path_buf());
            }
        }

        debug!("Preview cache miss at pitch {:.2}", pitch);
        let derived = new_temp_wav()?;
        shifter.shift_pitch(source, &derived, pitch)?;

        let path = derived.to_path_buf();
        self.entry = Some(PreviewEntry {
            source: source.to_path_buf(),
            pitch,
            derived,
        });
        Ok(path)
    }

    /// Drop the cached derivative
    pub fn invalidate(&mut self) {
        if self.entry.take().is_some() {
            debug!("Preview cache invalidated");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingShifter {
        calls: AtomicUsize,
    }

    impl PitchShifter for CountingShifter {
        fn shift_pitch(&self, src: &Path, dest: &Path, _pitch: f32) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            fs::copy(src, dest)?;
            Ok(())
        }
    }

    fn source(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"RIFF").unwrap();
        path
    }

    #[test]
    fn test_hit_then_miss_on_new_source() {
        let dir = tempfile::tempdir().unwrap();
        let first = source(dir.path(), "first.wav");
        let second = source(dir.path(), "second.wav");
        let shifter = CountingShifter::default();
        let mut cache = PreviewCache::new();

        let a = cache.get_or_render(&first, 1.25, &shifter).unwrap();
        let b = cache.get_or_render(&first, 1.25, &shifter).unwrap();
        assert_eq!(a, b);
        assert_eq!(shifter.calls.load(Ordering::SeqCst), 1);

        cache.get_or_render(&second, 1.25, &shifter).unwrap();
        assert_eq!(shifter.calls.load(Ordering::SeqCst), 2);
        assert!(!a.exists(), "replaced derivative should be deleted");
    }

    #[test]
    fn test_pitch_change_misses() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), "src.wav");
        let shifter = CountingShifter::default();
        let mut cache = PreviewCache::new();

        cache.get_or_render(&src, 1.25, &shifter).unwrap();
        cache.get_or_render(&src, 1.2505, &shifter).unwrap();
        assert_eq!(shifter.calls.load(Ordering::SeqCst), 1);
        cache.get_or_render(&src, 1.5, &shifter).unwrap();
        assert_eq!(shifter.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unity_returns_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), "src.wav");
        let shifter = CountingShifter::default();
        let mut cache = PreviewCache::new();

        assert_eq!(cache.get_or_render(&src, 1.0, &shifter).unwrap(), src);
        assert_eq!(shifter.calls.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_forces_render() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), "src.wav");
        let shifter = CountingShifter::default();
        let mut cache = PreviewCache::new();

        cache.get_or_render(&src, 0.8, &shifter).unwrap();
        cache.invalidate();
        cache.get_or_render(&src, 0.8, &shifter).unwrap();
        assert_eq!(shifter.calls.load(Ordering::SeqCst), 2);
    }
}
