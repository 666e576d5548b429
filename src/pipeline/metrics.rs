// src/pipeline/metrics.rs
//
// Production observability. Tracks cycle counts, skip reasons and stage
// timings for every pipeline task. Export via logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub capture_cycles: Arc<AtomicU64>,
    pub inference_cycles: Arc<AtomicU64>,
    pub mapping_cycles: Arc<AtomicU64>,
    pub render_cycles: Arc<AtomicU64>,
    pub detection_sets_published: Arc<AtomicU64>,
    pub pose_misses: Arc<AtomicU64>,
    pub correspondence_misses: Arc<AtomicU64>,
    pub validations_emitted: Arc<AtomicU64>,
    pub advance_requests: Arc<AtomicU64>,
    pub stage_errors: Arc<AtomicU64>,
    pub stage_panics: Arc<AtomicU64>,
    pub inference_time_us: Arc<AtomicU64>,
    pub mapping_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            capture_cycles: Arc::new(AtomicU64::new(0)),
            inference_cycles: Arc::new(AtomicU64::new(0)),
            mapping_cycles: Arc::new(AtomicU64::new(0)),
            render_cycles: Arc::new(AtomicU64::new(0)),
            detection_sets_published: Arc::new(AtomicU64::new(0)),
            pose_misses: Arc::new(AtomicU64::new(0)),
            correspondence_misses: Arc::new(AtomicU64::new(0)),
            validations_emitted: Arc::new(AtomicU64::new(0)),
            advance_requests: Arc::new(AtomicU64::new(0)),
            stage_errors: Arc::new(AtomicU64::new(0)),
            stage_panics: Arc::new(AtomicU64::new(0)),
            inference_time_us: Arc::new(AtomicU64::new(0)),
            mapping_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn capture_fps(&self) -> f64 {
        let cycles = self.capture_cycles.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            cycles as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            capture_cycles: self.capture_cycles.load(Ordering::Relaxed),
            capture_fps: self.capture_fps(),
            inference_cycles: self.inference_cycles.load(Ordering::Relaxed),
            mapping_cycles: self.mapping_cycles.load(Ordering::Relaxed),
            render_cycles: self.render_cycles.load(Ordering::Relaxed),
            detection_sets_published: self.detection_sets_published.load(Ordering::Relaxed),
            pose_misses: self.pose_misses.load(Ordering::Relaxed),
            correspondence_misses: self.correspondence_misses.load(Ordering::Relaxed),
            validations_emitted: self.validations_emitted.load(Ordering::Relaxed),
            advance_requests: self.advance_requests.load(Ordering::Relaxed),
            stage_errors: self.stage_errors.load(Ordering::Relaxed),
            stage_panics: self.stage_panics.load(Ordering::Relaxed),
            last_inference_us: self.inference_time_us.load(Ordering::Relaxed),
            last_mapping_us: self.mapping_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub capture_cycles: u64,
    pub capture_fps: f64,
    pub inference_cycles: u64,
    pub mapping_cycles: u64,
    pub render_cycles: u64,
    pub detection_sets_published: u64,
    pub pose_misses: u64,
    pub correspondence_misses: u64,
    pub validations_emitted: u64,
    pub advance_requests: u64,
    pub stage_errors: u64,
    pub stage_panics: u64,
    pub last_inference_us: u64,
    pub last_mapping_us: u64,
    pub elapsed_secs: f64,
}
