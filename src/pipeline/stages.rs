// src/pipeline/stages.rs
//
// Builds the fixed set of pipeline stages: capture (~30 Hz), inference
// (~5 Hz), mapping/validation (~5 Hz) and render (~5 Hz). Stages
// communicate only through Latest<T> buffers; a downstream stage reads
// whatever snapshot is currently published, which may be from an
// earlier cycle. No stage blocks waiting for a fresher value.

use crate::capture::{FrameSource, PoseLookup, StereoFrame};
use crate::inference::InferenceEngine;
use crate::pipeline::buffers::Latest;
use crate::pipeline::event_bus::{EventBus, PipelineEvent};
use crate::pipeline::metrics::PipelineMetrics;
use crate::pipeline::scheduler::StageSpec;
use crate::postprocess::PostProcessor;
use crate::preprocess::preprocess;
use crate::render::{LabelSlot, RenderSink};
use crate::spatial::SpatialMapper;
use crate::steps::StepTracker;
use crate::types::{Config, DetectionSet};
use crate::validation::{StabilityGate, Validator};
use crate::zones::{aggregate, ZoneClassifier};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error};

/// Shared buffers between stages, also readable by the host.
pub struct PipelineHandles {
    pub frames: Arc<Latest<StereoFrame>>,
    pub detections: Arc<Latest<DetectionSet>>,
    pub label_slots: Arc<Latest<Vec<LabelSlot>>>,
}

pub fn build_stages(
    config: &Config,
    mut source: Box<dyn FrameSource>,
    mut engine: Box<dyn InferenceEngine>,
    poses: Arc<dyn PoseLookup>,
    mut sink: Box<dyn RenderSink>,
    steps: Arc<StepTracker>,
    bus: Arc<Mutex<EventBus>>,
    metrics: PipelineMetrics,
) -> (Vec<StageSpec>, PipelineHandles) {
    let frames: Arc<Latest<StereoFrame>> = Arc::new(Latest::new());
    let detections: Arc<Latest<DetectionSet>> = Arc::new(Latest::new());
    let label_slots: Arc<Latest<Vec<LabelSlot>>> = Arc::new(Latest::new());

    let intrinsics = source.intrinsics();

    // ── Capture ──────────────────────────────────────────────────────
    let capture = {
        let frames = Arc::clone(&frames);
        let m = metrics.clone();
        StageSpec::new("capture", config.pipeline.capture_hz, move || {
            if let Some(frame) = source.next_frame()? {
                frames.publish(frame);
                m.inc(&m.capture_cycles);
            }
            Ok(())
        })
    };

    // ── Inference ────────────────────────────────────────────────────
    let inference = {
        let frames = Arc::clone(&frames);
        let detections = Arc::clone(&detections);
        let bus = Arc::clone(&bus);
        let m = metrics.clone();
        let postprocessor = PostProcessor::new(&config.model, &config.detection);
        let (input_w, input_h) = (config.model.input_width, config.model.input_height);
        // Shape mismatches are contract violations with the inference
        // collaborator; the stage stops doing work instead of retrying.
        let mut contract_violated = false;
        let mut last_version = 0u64;

        StageSpec::new("inference", config.pipeline.inference_hz, move || {
            if contract_violated {
                return Ok(());
            }
            let Some(frame) = frames.read() else {
                return Ok(());
            };
            let version = frames.version();
            if version == last_version {
                return Ok(());
            }
            last_version = version;

            let started = Instant::now();
            let tensor = preprocess(&frame.left, frame.width, frame.height, input_w, input_h)?;
            let raw = engine.infer(&tensor)?;

            match postprocessor.run(&raw) {
                Ok(dets) => {
                    debug!("Inference cycle produced {} detection(s)", dets.len());
                    m.inc(&m.detection_sets_published);
                    detections.publish(DetectionSet {
                        detections: dets,
                        timestamp_ms: frame.timestamp_ms,
                    });
                }
                Err(e) => {
                    error!("Inference contract violated, stage halted: {:#}", e);
                    contract_violated = true;
                    bus.lock().expect("event bus lock poisoned").publish(
                        PipelineEvent::StageError {
                            stage: "inference".to_string(),
                            message: format!("{:#}", e),
                        },
                    );
                    return Err(e);
                }
            }

            m.set_timing(&m.inference_time_us, started.elapsed().as_micros() as u64);
            m.inc(&m.inference_cycles);
            Ok(())
        })
    };

    // ── Mapping + validation ─────────────────────────────────────────
    let mapping = {
        let frames = Arc::clone(&frames);
        let detections = Arc::clone(&detections);
        let label_slots = Arc::clone(&label_slots);
        let bus = Arc::clone(&bus);
        let m = metrics.clone();
        let steps = Arc::clone(&steps);

        let mapper = SpatialMapper::new(config.spatial.clone());
        let classifier = ZoneClassifier::new(config.zones);
        let mut gate = StabilityGate::new(config.validation.stability_frames);
        let mut validator = Validator::new(&config.validation);
        let labels = config.model.labels.clone();
        let confidence_threshold = config.detection.confidence_threshold;
        let max_detections = config.detection.max_detections;
        let mut last_generation = steps.generation();

        StageSpec::new("mapping", config.pipeline.mapping_hz, move || {
            // Stale reads are fine: the detection set may lag the frame
            // when this stage outpaces inference.
            let Some(set) = detections.read() else {
                return Ok(());
            };
            let Some(frame) = frames.read() else {
                return Ok(());
            };

            let started = Instant::now();

            // An external step change resets the debounce entirely.
            let generation = steps.generation();
            if generation != last_generation {
                last_generation = generation;
                gate.reset();
                validator.cancel_auto_advance();
                debug!("Step changed, stability gate reset");
            }

            let pose = poses.pose_at(set.timestamp_ms);
            if pose.is_none() {
                m.inc(&m.pose_misses);
            }

            let mut slots = Vec::new();
            let mut assignments = Vec::new();
            for det in set.detections.iter().take(max_detections) {
                let (cx, cy) = det.center();
                let label = labels
                    .get(det.class_id)
                    .cloned()
                    .unwrap_or_else(|| format!("class-{}", det.class_id));

                // Zone membership needs only the 2-D center; 3-D mapping
                // is skipped per detection when pose or correspondence is
                // unavailable this cycle.
                assignments.push((classifier.classify(cx, cy), label.clone()));

                if let Some(pose) = &pose {
                    match mapper.map(det, &frame, &intrinsics, pose) {
                        Some((world, scale)) => slots.push(LabelSlot::new(
                            &label,
                            world,
                            scale,
                            det.confidence > confidence_threshold,
                        )),
                        None => m.inc(&m.correspondence_misses),
                    }
                }
            }

            let observed = aggregate(assignments);
            let observation = gate.observe(observed.clone());
            if observation.candidate_changed {
                validator.cancel_auto_advance();
            }

            if observation.newly_stable {
                let step = steps.current_step();
                if let Some(matched) = validator.check(&observed, &step.expected, Instant::now()) {
                    m.inc(&m.validations_emitted);
                    bus.lock().expect("event bus lock poisoned").publish(
                        PipelineEvent::ValidationResult {
                            step_id: step.id,
                            matched,
                            observed: observed.clone(),
                            timestamp_ms: set.timestamp_ms,
                        },
                    );
                }
            }

            if validator.poll_auto_advance(Instant::now()) {
                let from_step = steps.current_index();
                let to_step = (from_step + 1).min(steps.len() - 1);
                m.inc(&m.advance_requests);
                bus.lock()
                    .expect("event bus lock poisoned")
                    .publish(PipelineEvent::StepAdvanceRequested { from_step, to_step });
            }

            label_slots.publish(slots);
            m.set_timing(&m.mapping_time_us, started.elapsed().as_micros() as u64);
            m.inc(&m.mapping_cycles);
            Ok(())
        })
    };

    // ── Render ───────────────────────────────────────────────────────
    let render = {
        let label_slots = Arc::clone(&label_slots);
        let m = metrics.clone();
        StageSpec::new("render", config.pipeline.render_hz, move || {
            if let Some(slots) = label_slots.read() {
                sink.present(&slots);
                m.inc(&m.render_cycles);
            }
            Ok(())
        })
    };

    let handles = PipelineHandles {
        frames,
        detections,
        label_slots,
    };
    (vec![capture, inference, mapping, render], handles)
}
