// src/main.rs

mod capture;
mod config;
mod inference;
mod pipeline;
mod postprocess;
mod preprocess;
mod render;
mod spatial;
mod steps;
mod stub;
mod types;
mod validation;
mod zones;

use anyhow::Result;
use pipeline::stages::build_stages;
use pipeline::{EventBus, PipelineEvent, PipelineMetrics, PipelineRunner};
use render::LogRenderSink;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use steps::StepTracker;
use stub::{StubInference, StubPoseLookup, StubSource};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let config = types::Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("placement_guide={}", config.logging.level))
        }))
        .init();

    info!("🔭 Placement Guidance Pipeline Starting");
    info!("✓ Configuration loaded");
    info!(
        "Detection thresholds: confidence={:.2}, iou={:.2}, max_detections={}",
        config.detection.confidence_threshold,
        config.detection.iou_threshold,
        config.detection.max_detections
    );
    info!(
        "Zones: left<{:.2}, right>{:.2}, top<{:.2}, bottom>{:.2} | stability={} frame(s)",
        config.zones.left_x,
        config.zones.right_x,
        config.zones.top_y,
        config.zones.bottom_y,
        config.validation.stability_frames
    );

    let steps = Arc::new(StepTracker::load(&config.demo.steps_path)?);

    std::fs::create_dir_all(&config.demo.output_dir)?;
    let events_path = Path::new(&config.demo.output_dir).join("validation_events.jsonl");
    let mut events_file = std::fs::File::create(&events_path)?;
    info!("💾 Events will be written to: {}", events_path.display());

    // Synthetic capture + inference stand-ins; a deployment wires the
    // XR runtime and a real model engine through the same traits.
    let source = Box::new(StubSource::new());
    let engine = Box::new(StubInference::new(&config.model));
    let poses = Arc::new(StubPoseLookup);
    let sink = Box::new(LogRenderSink);

    let bus = Arc::new(Mutex::new(EventBus::new(64)));
    let metrics = PipelineMetrics::new();

    let (stages, _handles) = build_stages(
        &config,
        source,
        engine,
        poses,
        sink,
        Arc::clone(&steps),
        Arc::clone(&bus),
        metrics.clone(),
    );

    let runner = PipelineRunner::start(stages, metrics.clone());
    runner.mark_initialized();
    info!(
        "Pipeline running: capture {:.0} Hz, inference {:.0} Hz, mapping {:.0} Hz, render {:.0} Hz",
        config.pipeline.capture_hz,
        config.pipeline.inference_hz,
        config.pipeline.mapping_hz,
        config.pipeline.render_hz
    );

    let deadline = Instant::now() + Duration::from_secs(config.demo.run_seconds);
    while Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(200));

        let events = bus.lock().expect("event bus lock poisoned").drain();
        for event in events {
            match &event {
                PipelineEvent::ValidationResult {
                    step_id, matched, ..
                } => {
                    if *matched {
                        info!("✅ Step {} configuration matched", step_id);
                    } else {
                        info!("❌ Step {} configuration mismatch", step_id);
                    }
                    save_event(&event, &mut events_file)?;
                }
                PipelineEvent::StepAdvanceRequested { from_step, to_step } => {
                    // The host acts as the step-progression collaborator.
                    info!("➡️  Auto-advance: step {} -> {}", from_step, to_step);
                    steps.advance();
                    save_event(&event, &mut events_file)?;
                }
                PipelineEvent::StageError { stage, message } => {
                    error!("Stage {} reported: {}", stage, message);
                }
            }
        }
    }

    runner.stop(Duration::from_millis(config.pipeline.shutdown_timeout_ms));

    let summary = metrics.summary();
    info!("\n📊 Final Report:");
    info!(
        "  Capture cycles: {} ({:.1} FPS)",
        summary.capture_cycles, summary.capture_fps
    );
    info!("  Inference cycles: {}", summary.inference_cycles);
    info!("  Mapping cycles: {}", summary.mapping_cycles);
    info!("  Validations emitted: {}", summary.validations_emitted);
    info!("  Advance requests: {}", summary.advance_requests);
    if summary.pose_misses > 0 || summary.correspondence_misses > 0 {
        warn!(
            "  Skipped cycles: {} pose miss(es), {} correspondence miss(es)",
            summary.pose_misses, summary.correspondence_misses
        );
    }
    if summary.stage_errors > 0 || summary.stage_panics > 0 {
        warn!(
            "  Stage faults: {} error(s), {} panic(s)",
            summary.stage_errors, summary.stage_panics
        );
    }
    info!("  Summary: {}", serde_json::to_string(&summary)?);

    Ok(())
}

fn save_event(event: &PipelineEvent, file: &mut std::fs::File) -> Result<()> {
    let json_line = serde_json::to_string(event)?;
    writeln!(file, "{}", json_line)?;
    file.flush()?;
    Ok(())
}
