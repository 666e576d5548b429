// src/pipeline/scheduler.rs
//
// Thread-per-stage scheduler. Each stage is a small declarative spec
// (name, period, body) built once and executed on its own real-time
// timer; stages never hand frames to each other directly, they go
// through the shared buffers. Cancellation is cooperative: a single
// shutdown flag checked every iteration, with a bounded join on stop.

use crate::pipeline::metrics::PipelineMetrics;
use anyhow::Result;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub struct StageSpec {
    pub name: &'static str,
    pub period: Duration,
    pub body: Box<dyn FnMut() -> Result<()> + Send>,
}

impl StageSpec {
    pub fn new(
        name: &'static str,
        hz: f64,
        body: impl FnMut() -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            name,
            period: Duration::from_secs_f64(1.0 / hz),
            body: Box::new(body),
        }
    }
}

struct StageHandle {
    name: &'static str,
    finished: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct PipelineRunner {
    shutdown: Arc<AtomicBool>,
    initialized: Arc<AtomicBool>,
    stages: Vec<StageHandle>,
}

impl PipelineRunner {
    /// Spawn one thread per stage. Stages idle until
    /// `mark_initialized` is called, so no task ever operates on
    /// partially constructed buffers.
    pub fn start(specs: Vec<StageSpec>, metrics: PipelineMetrics) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let initialized = Arc::new(AtomicBool::new(false));

        let stages = specs
            .into_iter()
            .map(|spec| {
                let name = spec.name;
                let finished = Arc::new(AtomicBool::new(false));
                let handle = thread::Builder::new()
                    .name(format!("stage-{}", name))
                    .spawn(stage_loop(
                        spec,
                        metrics.clone(),
                        Arc::clone(&shutdown),
                        Arc::clone(&initialized),
                        Arc::clone(&finished),
                    ))
                    .expect("failed to spawn stage thread");
                StageHandle {
                    name,
                    finished,
                    handle,
                }
            })
            .collect();

        Self {
            shutdown,
            initialized,
            stages,
        }
    }

    /// Release all stages to start their periodic work.
    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
        info!("✓ Pipelines initialized, stages running");
    }

    /// Request cooperative shutdown and join each stage with a bounded
    /// timeout. An in-flight cycle that outlives the deadline is
    /// abandoned rather than awaited.
    pub fn stop(self, timeout: Duration) {
        self.shutdown.store(true, Ordering::Release);
        let deadline = Instant::now() + timeout;

        for stage in self.stages {
            while !stage.finished.load(Ordering::Acquire) && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            if stage.finished.load(Ordering::Acquire) {
                let _ = stage.handle.join();
            } else {
                warn!("Stage {} did not stop in time, abandoning", stage.name);
            }
        }
        info!("Pipeline stopped");
    }
}

fn stage_loop(
    mut spec: StageSpec,
    metrics: PipelineMetrics,
    shutdown: Arc<AtomicBool>,
    initialized: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
) -> impl FnOnce() + Send {
    move || {
        debug!("Stage {} started ({:?} period)", spec.name, spec.period);

        while !shutdown.load(Ordering::Acquire) {
            let cycle_start = Instant::now();

            // Skip the cycle entirely until the owner has finished
            // wiring the shared buffers.
            if initialized.load(Ordering::Acquire) {
                match catch_unwind(AssertUnwindSafe(&mut spec.body)) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        metrics.inc(&metrics.stage_errors);
                        error!("Stage {} cycle failed: {:#}", spec.name, e);
                    }
                    Err(_) => {
                        metrics.inc(&metrics.stage_panics);
                        error!("Stage {} panicked, continuing next cycle", spec.name);
                    }
                }
            }

            // Sleep out the remainder of the period; a slow cycle simply
            // runs the stage at a lower rate.
            let elapsed = cycle_start.elapsed();
            if elapsed < spec.period {
                thread::sleep(spec.period - elapsed);
            }
        }

        finished.store(true, Ordering::Release);
        debug!("Stage {} finished", spec.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn test_stages_wait_for_initialization() {
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        let runner = PipelineRunner::start(vec![StageSpec::new("count", 200.0, move || {
            c.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })], PipelineMetrics::new());

        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::Relaxed), 0);

        runner.mark_initialized();
        thread::sleep(Duration::from_millis(100));
        assert!(count.load(Ordering::Relaxed) > 0);

        runner.stop(Duration::from_millis(500));
    }

    #[test]
    fn test_failing_stage_keeps_running() {
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        let runner = PipelineRunner::start(vec![StageSpec::new("flaky", 200.0, move || {
            c.fetch_add(1, Ordering::Relaxed);
            anyhow::bail!("transient failure")
        })], PipelineMetrics::new());
        runner.mark_initialized();
        thread::sleep(Duration::from_millis(100));
        runner.stop(Duration::from_millis(500));
        assert!(count.load(Ordering::Relaxed) > 1);
    }

    #[test]
    fn test_panicking_stage_keeps_running() {
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        let runner = PipelineRunner::start(vec![StageSpec::new("panicky", 200.0, move || {
            c.fetch_add(1, Ordering::Relaxed);
            panic!("boom")
        })], PipelineMetrics::new());
        runner.mark_initialized();
        thread::sleep(Duration::from_millis(100));
        runner.stop(Duration::from_millis(500));
        assert!(count.load(Ordering::Relaxed) > 1);
    }

    #[test]
    fn test_stop_joins_within_timeout() {
        let runner = PipelineRunner::start(vec![StageSpec::new("idle", 100.0, || Ok(()))], PipelineMetrics::new());
        runner.mark_initialized();
        let start = Instant::now();
        runner.stop(Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
