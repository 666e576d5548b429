// src/pipeline/event_bus.rs
//
// Decoupled event system. Pipeline stages publish events instead of
// reaching into the host application's state; the host drains them at
// its own pace.

use crate::zones::Configuration;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// One validation of a stabilized configuration against the active
    /// step. Mismatches are ordinary events, not errors.
    ValidationResult {
        step_id: usize,
        matched: bool,
        observed: Configuration,
        timestamp_ms: f64,
    },

    /// Auto-advance timer expired; the external step controller decides
    /// whether to honor the request.
    StepAdvanceRequested { from_step: usize, to_step: usize },

    /// A stage hit a contract violation and stopped doing work.
    StageError { stage: String, message: String },
}

pub struct EventBus {
    events: VecDeque<PipelineEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: PipelineEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advance(from_step: usize) -> PipelineEvent {
        PipelineEvent::StepAdvanceRequested {
            from_step,
            to_step: from_step + 1,
        }
    }

    #[test]
    fn test_publish_and_drain() {
        let mut bus = EventBus::new(8);
        bus.publish(advance(0));
        bus.publish(advance(1));
        assert_eq!(bus.pending_count(), 2);
        assert_eq!(bus.drain().len(), 2);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut bus = EventBus::new(2);
        bus.publish(advance(0));
        bus.publish(advance(1));
        bus.publish(advance(2));
        let events = bus.drain();
        assert_eq!(events.len(), 2);
        match &events[0] {
            PipelineEvent::StepAdvanceRequested { from_step, .. } => assert_eq!(*from_step, 1),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
