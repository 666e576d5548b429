// src/stub.rs
//
// Synthetic capture source and inference stub so the pipeline runs
// headless without camera hardware or a model file. The source renders
// a bright square drifting through the field of view; the stub engine
// finds it by thresholded centroid and emits one confident anchor.

use crate::capture::{FrameSource, PoseLookup, StereoFrame};
use crate::inference::InferenceEngine;
use crate::types::{Intrinsics, ModelConfig, Pose};
use anyhow::Result;

const WIDTH: usize = 320;
const HEIGHT: usize = 240;
const SQUARE: usize = 32;
const DISPARITY: usize = 12;

/// Deterministic stereo source: a white square sweeping left-to-right
/// across a gray background, with a fixed stereo disparity.
pub struct StubSource {
    frame_count: u64,
}

impl StubSource {
    pub fn new() -> Self {
        Self { frame_count: 0 }
    }
}

impl Default for StubSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for StubSource {
    fn next_frame(&mut self) -> Result<Option<StereoFrame>> {
        self.frame_count += 1;

        // Sweep period of ~600 frames, holding clear of the image edges
        // so block matching always has context around the square.
        let phase = (self.frame_count % 600) as f32 / 600.0;
        let x0 = DISPARITY + 8 + (phase * (WIDTH - SQUARE - DISPARITY - 32) as f32) as usize;
        let y0 = (HEIGHT - SQUARE) / 2;

        let mut left = vec![20u8; WIDTH * HEIGHT];
        let mut right = vec![20u8; WIDTH * HEIGHT];
        for dy in 0..SQUARE {
            for dx in 0..SQUARE {
                left[(y0 + dy) * WIDTH + x0 + dx] = 230;
                right[(y0 + dy) * WIDTH + x0 + dx - DISPARITY] = 230;
            }
        }

        Ok(Some(StereoFrame {
            left,
            right,
            width: WIDTH,
            height: HEIGHT,
            timestamp_ms: self.frame_count as f64 * 33.3,
        }))
    }

    fn intrinsics(&self) -> Intrinsics {
        Intrinsics {
            fx: 280.0,
            fy: 280.0,
            cx: WIDTH as f32 / 2.0,
            cy: HEIGHT as f32 / 2.0,
        }
    }
}

/// Every timestamp has a valid identity pose.
pub struct StubPoseLookup;

impl PoseLookup for StubPoseLookup {
    fn pose_at(&self, _timestamp_ms: f64) -> Option<Pose> {
        Some(Pose::identity())
    }
}

/// Inference stub: finds the centroid of bright pixels in the input
/// tensor and produces a raw `[A, 4+C]` tensor with a single confident
/// class-0 anchor at that location.
pub struct StubInference {
    input_width: usize,
    input_height: usize,
    num_anchors: usize,
    num_classes: usize,
}

impl StubInference {
    pub fn new(model: &ModelConfig) -> Self {
        Self {
            input_width: model.input_width,
            input_height: model.input_height,
            num_anchors: model.num_anchors,
            num_classes: model.num_classes,
        }
    }
}

impl InferenceEngine for StubInference {
    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;
        let mut count = 0usize;

        for y in 0..self.input_height {
            for x in 0..self.input_width {
                if input[y * self.input_width + x] > 0.5 {
                    sum_x += x as f64;
                    sum_y += y as f64;
                    count += 1;
                }
            }
        }

        let row_len = 4 + self.num_classes;
        let mut raw = vec![0.0f32; self.num_anchors * row_len];

        if count > 0 {
            let cx = (sum_x / count as f64) as f32 / self.input_width as f32;
            let cy = (sum_y / count as f64) as f32 / self.input_height as f32;
            raw[0] = cx;
            raw[1] = cy;
            raw[2] = SQUARE as f32 / WIDTH as f32;
            raw[3] = SQUARE as f32 / HEIGHT as f32;
            raw[4] = 0.9; // class 0
            for c in 1..self.num_classes {
                raw[4 + c] = 0.05;
            }
        }

        Ok(raw)
    }
}
