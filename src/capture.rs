// src/capture.rs
//
// Seams to the camera/XR runtime. The pipeline consumes stereo frames,
// intrinsics and head poses through these traits and never talks to the
// sensor stack directly.

use crate::types::{Intrinsics, Pose};
use anyhow::Result;

/// One stereo capture: 8-bit grayscale image pair plus a monotonically
/// increasing timestamp.
#[derive(Debug, Clone)]
pub struct StereoFrame {
    pub left: Vec<u8>,
    pub right: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

pub trait FrameSource: Send {
    /// Pull the next stereo frame. `Ok(None)` means no new frame is
    /// available this cycle (not an error).
    fn next_frame(&mut self) -> Result<Option<StereoFrame>>;

    fn intrinsics(&self) -> Intrinsics;
}

/// Head-pose lookup keyed by frame timestamp. `None` means no valid
/// pose exists for that timestamp; the mapping cycle skips the
/// detection rather than failing.
pub trait PoseLookup: Send + Sync {
    fn pose_at(&self, timestamp_ms: f64) -> Option<Pose>;
}
