// src/spatial.rs
//
// Converts 2-D detections into 3-D world-space positions and size
// estimates using stereo geometry and the head pose for the frame.

use crate::capture::StereoFrame;
use crate::types::{Detection, Intrinsics, Point3, Pose, Scale3, SpatialConfig};
use tracing::trace;

pub struct SpatialMapper {
    config: SpatialConfig,
}

impl SpatialMapper {
    pub fn new(config: SpatialConfig) -> Self {
        Self { config }
    }

    /// Map one detection to a world-space point and scale. Returns `None`
    /// when stereo correspondence fails for the box center; the caller
    /// skips the detection for this cycle.
    pub fn map(
        &self,
        detection: &Detection,
        frame: &StereoFrame,
        intrinsics: &Intrinsics,
        head_pose: &Pose,
    ) -> Option<(Point3, Scale3)> {
        let (cx_norm, cy_norm) = detection.center();
        let u = cx_norm * frame.width as f32;
        let v = cy_norm * frame.height as f32;

        let disparity = self.find_disparity(frame, u, v)?;
        let depth = intrinsics.fx * self.config.baseline_m / disparity;

        // Back-project through the pinhole model.
        let camera_point = Point3 {
            x: (u - intrinsics.cx) * depth / intrinsics.fx,
            y: (v - intrinsics.cy) * depth / intrinsics.fy,
            z: depth,
        };

        let scale = Scale3 {
            x: detection.width() / self.config.reference_depth,
            y: detection.height() / self.config.reference_depth,
            z: self.config.depth_scale_default,
        };

        // Camera Y points down; world up is positive Y. The fixed offset
        // compensates sensor/display parallax.
        let offset = self.config.parallax_offset;
        let corrected = Point3 {
            x: camera_point.x + offset[0],
            y: -camera_point.y + offset[1],
            z: camera_point.z + offset[2],
        };

        let world = head_pose.transform(corrected);
        trace!(
            "Mapped ({:.3}, {:.3}) -> disparity {:.1}px, depth {:.2}m",
            cx_norm,
            cy_norm,
            disparity,
            depth
        );
        Some((world, scale))
    }

    /// Block-matching stereo correspondence along the epipolar line.
    /// Compares a patch around (u, v) in the left image against the right
    /// image at candidate disparities, picking the lowest sum of absolute
    /// differences. Returns `None` when the patch falls outside the image
    /// or no candidate produces a usable match.
    fn find_disparity(&self, frame: &StereoFrame, u: f32, v: f32) -> Option<f32> {
        let r = self.config.patch_radius as isize;
        let w = frame.width as isize;
        let h = frame.height as isize;
        let ui = u.round() as isize;
        let vi = v.round() as isize;

        if ui - r < 0 || ui + r >= w || vi - r < 0 || vi + r >= h {
            return None;
        }

        let mut best_disparity = 0usize;
        let mut best_sad = u64::MAX;

        let max_d = self.config.max_disparity.min((ui - r) as usize);
        for d in 0..=max_d {
            let mut sad = 0u64;
            for dy in -r..=r {
                for dx in -r..=r {
                    let lx = (ui + dx) as usize;
                    let ly = (vi + dy) as usize;
                    let rx = (ui + dx - d as isize) as usize;
                    let left = frame.left[ly * frame.width + lx] as i64;
                    let right = frame.right[ly * frame.width + rx] as i64;
                    sad += left.abs_diff(right);
                }
            }
            if sad < best_sad {
                best_sad = sad;
                best_disparity = d;
            }
        }

        // Sub-pixel disparities near zero mean the point is effectively at
        // infinity; treat that as no usable correspondence.
        if best_disparity == 0 {
            return None;
        }
        Some(best_disparity as f32)
    }
}
