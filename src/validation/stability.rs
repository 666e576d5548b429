// src/validation/stability.rs
//
// Debounces the per-cycle Configuration across frames. A configuration
// must be observed for `stability_frames` consecutive cycles before it
// is considered stable and handed to the Validator, which suppresses
// single-frame detection noise.

use crate::zones::Configuration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Unstable,
    Stabilizing,
    Stable,
}

/// Outcome of one gate cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// The candidate changed this cycle (previous streak discarded).
    pub candidate_changed: bool,
    /// The candidate just crossed the stability threshold. Reported
    /// exactly once per streak; subsequent matching cycles while already
    /// stable do not retrigger.
    pub newly_stable: bool,
}

pub struct StabilityGate {
    stability_frames: u32,
    candidate: Option<Configuration>,
    consecutive: u32,
}

impl StabilityGate {
    pub fn new(stability_frames: u32) -> Self {
        Self {
            stability_frames,
            candidate: None,
            consecutive: 0,
        }
    }

    /// Feed one cycle's Configuration. `consecutive` counts the cycles
    /// the current candidate has been observed in a row, so the cycle
    /// that installs a new candidate starts its streak at 1.
    pub fn observe(&mut self, config: Configuration) -> Observation {
        let matches = self.candidate.as_ref() == Some(&config);

        if matches {
            self.consecutive += 1;
        } else {
            debug!("Stability candidate changed, streak reset");
            self.candidate = Some(config);
            self.consecutive = 1;
        }

        Observation {
            candidate_changed: !matches,
            newly_stable: self.consecutive == self.stability_frames,
        }
    }

    pub fn state(&self) -> GateState {
        if self.candidate.is_none() {
            GateState::Unstable
        } else if self.consecutive >= self.stability_frames {
            GateState::Stable
        } else {
            GateState::Stabilizing
        }
    }

    pub fn candidate(&self) -> Option<&Configuration> {
        self.candidate.as_ref()
    }

    /// External step change: drop the candidate entirely.
    pub fn reset(&mut self) {
        self.candidate = None;
        self.consecutive = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bottle_left() -> Configuration {
        Configuration {
            left: "bottle".into(),
            ..Default::default()
        }
    }

    fn cup_right() -> Configuration {
        Configuration {
            right: "cup".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_starts_unstable() {
        let gate = StabilityGate::new(10);
        assert_eq!(gate.state(), GateState::Unstable);
    }

    #[test]
    fn test_stabilizing_until_k_minus_one() {
        let mut gate = StabilityGate::new(10);
        for _ in 0..9 {
            let obs = gate.observe(bottle_left());
            assert!(!obs.newly_stable);
        }
        assert_eq!(gate.state(), GateState::Stabilizing);
    }

    #[test]
    fn test_kth_cycle_becomes_stable_exactly_once() {
        let mut gate = StabilityGate::new(10);
        let mut stable_events = 0;
        for _ in 0..10 {
            if gate.observe(bottle_left()).newly_stable {
                stable_events += 1;
            }
        }
        assert_eq!(stable_events, 1);
        assert_eq!(gate.state(), GateState::Stable);

        // An 11th identical cycle must not retrigger.
        assert!(!gate.observe(bottle_left()).newly_stable);
        assert_eq!(gate.state(), GateState::Stable);
    }

    #[test]
    fn test_candidate_change_resets_streak() {
        let mut gate = StabilityGate::new(3);
        gate.observe(bottle_left());
        gate.observe(bottle_left());
        let obs = gate.observe(cup_right());
        assert!(obs.candidate_changed);
        assert_eq!(gate.state(), GateState::Stabilizing);

        // The new candidate needs a full streak of its own.
        assert!(!gate.observe(cup_right()).newly_stable);
        assert!(gate.observe(cup_right()).newly_stable);
    }

    #[test]
    fn test_reset_clears_candidate() {
        let mut gate = StabilityGate::new(2);
        gate.observe(bottle_left());
        gate.observe(bottle_left());
        assert_eq!(gate.state(), GateState::Stable);

        gate.reset();
        assert_eq!(gate.state(), GateState::Unstable);
        assert!(gate.candidate().is_none());
    }

    #[test]
    fn test_stability_frames_one_triggers_immediately() {
        let mut gate = StabilityGate::new(1);
        assert!(gate.observe(bottle_left()).newly_stable);
        assert!(!gate.observe(bottle_left()).newly_stable);
    }
}
