// src/validation/validator.rs
//
// Compares a stabilized Configuration against the expected one for the
// active step. Emission is rate-limited by wall-clock time so the event
// rate stays bounded independent of frame rate. On a sustained match an
// optional auto-advance timer can be armed; if no configuration or step
// change cancels it, its expiry requests a step advance.

use crate::types::ValidationConfig;
use crate::zones::Configuration;
use std::time::{Duration, Instant};
use tracing::debug;

pub struct Validator {
    min_event_interval: Duration,
    auto_advance_delay: Option<Duration>,
    last_emit: Option<Instant>,
    advance_deadline: Option<Instant>,
}

impl Validator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            min_event_interval: Duration::from_millis(config.min_event_interval_ms),
            auto_advance_delay: config
                .auto_advance
                .then(|| Duration::from_millis(config.auto_advance_delay_ms)),
            last_emit: None,
            advance_deadline: None,
        }
    }

    /// Validate a stable Configuration. Returns `Some(matched)` when an
    /// event is emitted, `None` when suppressed by the rate limit.
    /// A match arms the auto-advance timer (when enabled); a mismatch
    /// cancels it.
    pub fn check(
        &mut self,
        observed: &Configuration,
        expected: &Configuration,
        now: Instant,
    ) -> Option<bool> {
        if let Some(last) = self.last_emit {
            if now.duration_since(last) < self.min_event_interval {
                debug!("Validation event suppressed by rate limit");
                return None;
            }
        }

        // Zone-by-zone equality; unpopulated zones are empty strings so
        // "absent" and "empty" compare equal.
        let matched = observed == expected;
        self.last_emit = Some(now);

        if matched {
            if let Some(delay) = self.auto_advance_delay {
                if self.advance_deadline.is_none() {
                    self.advance_deadline = Some(now + delay);
                    debug!("Auto-advance armed ({:?})", delay);
                }
            }
        } else {
            self.cancel_auto_advance();
        }

        Some(matched)
    }

    /// Poll the auto-advance timer. Returns true exactly once when the
    /// armed deadline has passed.
    pub fn poll_auto_advance(&mut self, now: Instant) -> bool {
        match self.advance_deadline {
            Some(deadline) if now >= deadline => {
                self.advance_deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Cancel a pending auto-advance (configuration or step change).
    pub fn cancel_auto_advance(&mut self) {
        if self.advance_deadline.take().is_some() {
            debug!("Auto-advance cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min_interval_ms: u64, auto_advance: bool, delay_ms: u64) -> ValidationConfig {
        ValidationConfig {
            stability_frames: 10,
            min_event_interval_ms: min_interval_ms,
            auto_advance,
            auto_advance_delay_ms: delay_ms,
        }
    }

    fn bottle_left() -> Configuration {
        Configuration {
            left: "bottle".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_match_and_mismatch_reported() {
        let mut v = Validator::new(&config(0, false, 0));
        let now = Instant::now();
        assert_eq!(v.check(&bottle_left(), &bottle_left(), now), Some(true));
        assert_eq!(
            v.check(&Configuration::default(), &bottle_left(), now),
            Some(false)
        );
    }

    #[test]
    fn test_empty_matches_empty() {
        // "No objects present" is a valid passing state.
        let mut v = Validator::new(&config(0, false, 0));
        assert_eq!(
            v.check(
                &Configuration::default(),
                &Configuration::default(),
                Instant::now()
            ),
            Some(true)
        );
    }

    #[test]
    fn test_rate_limit_suppresses_second_call() {
        let mut v = Validator::new(&config(60_000, false, 0));
        let now = Instant::now();
        assert!(v.check(&bottle_left(), &bottle_left(), now).is_some());
        assert!(v
            .check(&bottle_left(), &bottle_left(), now + Duration::from_millis(100))
            .is_none());
    }

    #[test]
    fn test_rate_limit_allows_after_interval() {
        let mut v = Validator::new(&config(100, false, 0));
        let now = Instant::now();
        assert!(v.check(&bottle_left(), &bottle_left(), now).is_some());
        assert!(v
            .check(&bottle_left(), &bottle_left(), now + Duration::from_millis(150))
            .is_some());
    }

    #[test]
    fn test_auto_advance_arms_and_fires() {
        let mut v = Validator::new(&config(0, true, 50));
        let now = Instant::now();
        v.check(&bottle_left(), &bottle_left(), now);
        assert!(!v.poll_auto_advance(now));
        assert!(v.poll_auto_advance(now + Duration::from_millis(60)));
        // Fires once.
        assert!(!v.poll_auto_advance(now + Duration::from_millis(120)));
    }

    #[test]
    fn test_mismatch_cancels_auto_advance() {
        let mut v = Validator::new(&config(0, true, 50));
        let now = Instant::now();
        v.check(&bottle_left(), &bottle_left(), now);
        v.check(&Configuration::default(), &bottle_left(), now);
        assert!(!v.poll_auto_advance(now + Duration::from_millis(60)));
    }

    #[test]
    fn test_explicit_cancel() {
        let mut v = Validator::new(&config(0, true, 50));
        let now = Instant::now();
        v.check(&bottle_left(), &bottle_left(), now);
        v.cancel_auto_advance();
        assert!(!v.poll_auto_advance(now + Duration::from_millis(60)));
    }

    #[test]
    fn test_auto_advance_disabled_never_fires() {
        let mut v = Validator::new(&config(0, false, 0));
        let now = Instant::now();
        v.check(&bottle_left(), &bottle_left(), now);
        assert!(!v.poll_auto_advance(now + Duration::from_secs(10)));
    }
}
