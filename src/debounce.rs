//! Debounced auto-generation
//!
//! A single-shot timer restarted by every edit. Large edits (pastes) and
//! long texts wait longer before firing. Nothing is scheduled until the
//! user has generated manually at least once.

use log::debug;
use std::time::{Duration, Instant};

pub const SHORT_DELAY: Duration = Duration::from_millis(500);
pub const LONG_DELAY: Duration = Duration::from_millis(1200);

/// Text length from which the long delay is always used
pub const LARGE_TEXT_THRESHOLD: usize = 800;
/// Growth in one edit that counts as a paste
pub const PASTE_DELTA_THRESHOLD: usize = 200;

/// Timer deciding when an automatic generation should start
pub struct AutoGenerateTrigger {
    enabled: bool,
    last_len: usize,
    deadline: Option<Instant>,
    last_delay: Option<Duration>,
    short_delay: Duration,
    long_delay: Duration,
}

impl AutoGenerateTrigger {
    pub fn new() -> Self {
        Self::with_delays(SHORT_DELAY, LONG_DELAY)
    }

    pub fn with_delays(short_delay: Duration, long_delay: Duration) -> Self {
        Self {
            enabled: false,
            last_len: 0,
            deadline: None,
            last_delay: None,
            short_delay,
            long_delay,
        }
    }

    /// Open the latch; called on the first manual generation
    pub fn enable(&mut self) {
        if !self.enabled {
            debug!("Auto-generation enabled");
        }
        self.enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a text edit and restart the timer
    ///
    /// Returns the delay scheduled, or `None` while the latch is closed.
    pub fn on_text_changed(&mut self, new_len: usize) -> Option<Duration> {
        self.on_text_changed_at(new_len, Instant::now())
    }

    pub fn on_text_changed_at(&mut self, new_len: usize, now: Instant) -> Option<Duration> {
        let grew_by = new_len.saturating_sub(self.last_len);
        self.last_len = new_len;

        let delay = if grew_by >= PASTE_DELTA_THRESHOLD || new_len >= LARGE_TEXT_THRESHOLD {
            self.long_delay
        } else {
            self.short_delay
        };
        self.schedule_at(delay, now)
    }

    /// Voice, rate or pitch changed: restart with the short delay
    pub fn on_params_changed(&mut self) -> Option<Duration> {
        self.schedule_at(self.short_delay, Instant::now())
    }

    /// Restart with the short delay regardless of edits
    pub fn schedule_short(&mut self) -> Option<Duration> {
        self.schedule_at(self.short_delay, Instant::now())
    }

    pub fn schedule_at(&mut self, delay: Duration, now: Instant) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        self.deadline = Some(now + delay);
        self.last_delay = Some(delay);
        debug!("Auto-generation scheduled in {:?}", delay);
        Some(delay)
    }

    /// Delay used by the most recent scheduling
    pub fn last_delay(&self) -> Option<Duration> {
        self.last_delay
    }

    pub fn is_scheduled(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Time left before the timer fires
    pub fn time_until_due(&self) -> Option<Duration> {
        self.time_until_due_at(Instant::now())
    }

    pub fn time_until_due_at(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }

    /// Fire the timer if it is due; it does not repeat
    pub fn take_due(&mut self) -> bool {
        self.take_due_at(Instant::now())
    }

    pub fn take_due_at(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl Default for AutoGenerateTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> AutoGenerateTrigger {
        let mut trigger = AutoGenerateTrigger::new();
        trigger.enable();
        trigger
    }

    #[test]
    fn test_latch_blocks_scheduling() {
        let mut trigger = AutoGenerateTrigger::new();
        assert_eq!(trigger.on_text_changed(10), None);
        assert_eq!(trigger.on_params_changed(), None);
        assert!(!trigger.is_scheduled());
    }

    #[test]
    fn test_large_paste_uses_long_delay() {
        let mut trigger = enabled();
        assert_eq!(trigger.on_text_changed(850), Some(LONG_DELAY));
        assert_eq!(trigger.last_delay(), Some(LONG_DELAY));
    }

    #[test]
    fn test_paste_delta_uses_long_delay() {
        let mut trigger = enabled();
        trigger.on_text_changed(100);
        assert_eq!(trigger.on_text_changed(300), Some(LONG_DELAY));
        assert_eq!(trigger.on_text_changed(301), Some(SHORT_DELAY));
    }

    #[test]
    fn test_typing_uses_short_delay() {
        let mut trigger = enabled();
        assert_eq!(trigger.on_text_changed(1), Some(SHORT_DELAY));
        assert_eq!(trigger.on_text_changed(2), Some(SHORT_DELAY));
        // Deletions never count as a paste
        assert_eq!(trigger.on_text_changed(0), Some(SHORT_DELAY));
    }

    #[test]
    fn test_long_text_always_long() {
        let mut trigger = enabled();
        trigger.on_text_changed(799);
        assert_eq!(trigger.on_text_changed(800), Some(LONG_DELAY));
        assert_eq!(trigger.on_text_changed(790), Some(SHORT_DELAY));
    }

    #[test]
    fn test_edits_restart_timer() {
        let mut trigger = enabled();
        let start = Instant::now();
        trigger.on_text_changed_at(1, start);
        trigger.on_text_changed_at(2, start + Duration::from_millis(400));

        assert!(!trigger.take_due_at(start + Duration::from_millis(600)));
        assert!(trigger.take_due_at(start + Duration::from_millis(900)));
        // Single shot
        assert!(!trigger.take_due_at(start + Duration::from_millis(2000)));
    }

    #[test]
    fn test_time_until_due() {
        let mut trigger = enabled();
        let start = Instant::now();
        assert_eq!(trigger.time_until_due_at(start), None);
        trigger.schedule_at(SHORT_DELAY, start);
        assert_eq!(
            trigger.time_until_due_at(start + Duration::from_millis(100)),
            Some(Duration::from_millis(400))
        );
        assert_eq!(
            trigger.time_until_due_at(start + Duration::from_secs(1)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_cancel() {
        let mut trigger = enabled();
        trigger.schedule_short();
        trigger.cancel();
        assert!(!trigger.is_scheduled());
    }
}
