// src/steps.rs
//
// Guided-procedure steps. The step list itself is owned by external
// storage; this module validates it at load time and tracks the active
// step for the validation task.

use crate::zones::Configuration;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: usize,
    pub title: String,
    pub body: String,
    pub expected: Configuration,
}

#[derive(Debug, Deserialize)]
struct StepFile {
    steps: Vec<Step>,
}

/// Holds the validated step list and the active step index. The index
/// is atomic so the validation task and the host-facing step controller
/// can both observe it without holding a lock across cycles.
pub struct StepTracker {
    steps: Vec<Step>,
    current: AtomicUsize,
    // Bumped on every step change so the validation task can detect a
    // change and reset its stability gate.
    generation: AtomicU64,
}

impl StepTracker {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
        let file: StepFile = serde_yaml::from_str(&contents)?;
        let tracker = Self::new(file.steps)?;
        info!("✓ Loaded {} procedure step(s)", tracker.len());
        Ok(tracker)
    }

    pub fn new(steps: Vec<Step>) -> Result<Self> {
        if steps.is_empty() {
            bail!("Step list is empty");
        }
        for (i, step) in steps.iter().enumerate() {
            if step.id != i {
                bail!("Step ids must be exactly 0..{} in order, got {} at position {}", steps.len() - 1, step.id, i);
            }
            if step.title.is_empty() || step.body.is_empty() {
                bail!("Step {} has an empty title or body", step.id);
            }
        }
        Ok(Self {
            steps,
            current: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    pub fn current_step(&self) -> &Step {
        &self.steps[self.current_index()]
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Advance to the next step, clamping at the last one.
    /// Returns the new index.
    pub fn advance(&self) -> usize {
        let current = self.current_index();
        let next = (current + 1).min(self.steps.len() - 1);
        if next != current {
            self.current.store(next, Ordering::Release);
            self.generation.fetch_add(1, Ordering::AcqRel);
            info!("Step advanced: {} -> {}", current, next);
        }
        next
    }

    /// Jump to an arbitrary step (host-driven navigation).
    pub fn set_current(&self, index: usize) -> Result<()> {
        if index >= self.steps.len() {
            bail!("Step index {} out of range (have {})", index, self.steps.len());
        }
        if index != self.current_index() {
            self.current.store(index, Ordering::Release);
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }
}
