// src/types.rs
//
// Configuration and core data types shared across the pipeline.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub detection: DetectionConfig,
    pub spatial: SpatialConfig,
    pub zones: ZoneConfig,
    pub validation: ValidationConfig,
    pub pipeline: PipelineConfig,
    pub demo: DemoConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub input_width: usize,
    pub input_height: usize,
    pub num_anchors: usize,
    pub num_classes: usize,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialConfig {
    /// Stereo baseline in meters.
    pub baseline_m: f32,
    /// Reference depth constant for box-size-to-scale conversion.
    pub reference_depth: f32,
    /// Depth-axis scale; object thickness is unknown from a single view.
    pub depth_scale_default: f32,
    /// Fixed positional offset compensating sensor/display parallax.
    pub parallax_offset: [f32; 3],
    /// Half-width of the block-matching patch in pixels.
    pub patch_radius: usize,
    /// Maximum disparity searched along the epipolar line.
    pub max_disparity: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub left_x: f32,
    pub right_x: f32,
    pub top_y: f32,
    pub bottom_y: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub stability_frames: u32,
    pub min_event_interval_ms: u64,
    pub auto_advance: bool,
    pub auto_advance_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub capture_hz: f64,
    pub inference_hz: f64,
    pub mapping_hz: f64,
    pub render_hz: f64,
    pub shutdown_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    pub steps_path: String,
    pub output_dir: String,
    pub run_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// One confident, non-overlapping detection for a single inference cycle.
/// Box corners are normalized to [0, 1] with `xmin < xmax`, `ymin < ymax`.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: [f32; 4], // [xmin, ymin, xmax, ymax]
    pub class_id: usize,
    pub confidence: f32,
}

impl Detection {
    pub fn center(&self) -> (f32, f32) {
        (
            (self.bbox[0] + self.bbox[2]) / 2.0,
            (self.bbox[1] + self.bbox[3]) / 2.0,
        )
    }

    pub fn width(&self) -> f32 {
        self.bbox[2] - self.bbox[0]
    }

    pub fn height(&self) -> f32 {
        self.bbox[3] - self.bbox[1]
    }
}

/// Latest detection output shared between the inference task and the
/// mapping/validation task.
#[derive(Debug, Clone)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
    pub timestamp_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scale3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Pinhole camera intrinsics, extracted from the runtime's 3x3 matrix.
#[derive(Debug, Clone, Copy)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl Intrinsics {
    pub fn from_matrix(m: &[[f32; 3]; 3]) -> Self {
        Self {
            fx: m[0][0],
            fy: m[1][1],
            cx: m[0][2],
            cy: m[1][2],
        }
    }
}

/// Rigid head-pose transform from camera space into world space.
#[derive(Debug, Clone, Copy)]
pub struct Pose {
    pub rotation: [[f32; 3]; 3],
    pub translation: [f32; 3],
}

impl Pose {
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0, 0.0, 0.0],
        }
    }

    pub fn transform(&self, p: Point3) -> Point3 {
        let r = &self.rotation;
        let t = &self.translation;
        Point3 {
            x: r[0][0] * p.x + r[0][1] * p.y + r[0][2] * p.z + t[0],
            y: r[1][0] * p.x + r[1][1] * p.y + r[1][2] * p.z + t[1],
            z: r[2][0] * p.x + r[2][1] * p.y + r[2][2] * p.z + t[2],
        }
    }
}
