// src/postprocess.rs

use crate::types::{Detection, DetectionConfig, ModelConfig};
use anyhow::{bail, Result};
use ndarray::ArrayView2;
use tracing::debug;

/// Decodes raw detector output into a small set of confident,
/// non-overlapping detections.
pub struct PostProcessor {
    num_anchors: usize,
    num_classes: usize,
    confidence_threshold: f32,
    iou_threshold: f32,
    max_detections: usize,
}

impl PostProcessor {
    pub fn new(model: &ModelConfig, detection: &DetectionConfig) -> Self {
        Self {
            num_anchors: model.num_anchors,
            num_classes: model.num_classes,
            confidence_threshold: detection.confidence_threshold,
            iou_threshold: detection.iou_threshold,
            max_detections: detection.max_detections,
        }
    }

    /// Raw tensor layout: `[A, 4+C]`, one row per anchor holding
    /// `[cx, cy, w, h, score_0, ..., score_C-1]` in normalized coordinates.
    ///
    /// A length that does not match the configured anchor/class counts is a
    /// contract violation with the inference stage and is fatal.
    pub fn run(&self, raw: &[f32]) -> Result<Vec<Detection>> {
        let row_len = 4 + self.num_classes;
        if raw.len() != self.num_anchors * row_len {
            bail!(
                "Raw tensor shape mismatch: got {} values, expected {} ({} anchors x {})",
                raw.len(),
                self.num_anchors * row_len,
                self.num_anchors,
                row_len
            );
        }
        let view = ArrayView2::from_shape((self.num_anchors, row_len), raw)?;

        let mut candidates = Vec::new();
        for row in view.rows() {
            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);

            // Best class, tie-break by lowest class index.
            let mut best_class = 0;
            let mut best_score = row[4];
            for c in 1..self.num_classes {
                if row[4 + c] > best_score {
                    best_score = row[4 + c];
                    best_class = c;
                }
            }

            if best_score < self.confidence_threshold {
                continue;
            }

            let xmin = (cx - w / 2.0).clamp(0.0, 1.0);
            let ymin = (cy - h / 2.0).clamp(0.0, 1.0);
            let xmax = (cx + w / 2.0).clamp(0.0, 1.0);
            let ymax = (cy + h / 2.0).clamp(0.0, 1.0);
            if xmin >= xmax || ymin >= ymax {
                continue;
            }

            candidates.push(Detection {
                bbox: [xmin, ymin, xmax, ymax],
                class_id: best_class,
                confidence: best_score,
            });
        }

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut kept = nms(candidates, self.iou_threshold);
        kept.truncate(self.max_detections);

        debug!("Postprocess kept {} detection(s)", kept.len());
        Ok(kept)
    }
}

/// Greedy non-maximum suppression over score-sorted detections.
/// A candidate is dropped when its IoU with any already-kept,
/// higher-scoring box exceeds the threshold.
pub(crate) fn nms(detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    let mut kept: Vec<Detection> = Vec::new();

    for candidate in detections {
        let overlaps = kept
            .iter()
            .any(|k| iou(&k.bbox, &candidate.bbox) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }

    kept
}

/// Intersection over union on axis-aligned min/max corner boxes.
/// Disjoint boxes score 0.
pub(crate) fn iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetectionConfig, ModelConfig};

    fn model(num_anchors: usize) -> ModelConfig {
        ModelConfig {
            input_width: 320,
            input_height: 320,
            num_anchors,
            num_classes: 3,
            labels: vec!["bottle".into(), "cup".into(), "tool".into()],
        }
    }

    fn detection(confidence_threshold: f32) -> DetectionConfig {
        DetectionConfig {
            confidence_threshold,
            iou_threshold: 0.45,
            max_detections: 8,
        }
    }

    /// One anchor row: [cx, cy, w, h, s0, s1, s2]
    fn anchor(cx: f32, cy: f32, w: f32, h: f32, scores: [f32; 3]) -> Vec<f32> {
        vec![cx, cy, w, h, scores[0], scores[1], scores[2]]
    }

    fn det(bbox: [f32; 4], confidence: f32) -> Detection {
        Detection {
            bbox,
            class_id: 0,
            confidence,
        }
    }

    #[test]
    fn test_shape_mismatch_is_fatal() {
        let pp = PostProcessor::new(&model(4), &detection(0.5));
        let raw = vec![0.0f32; 3 * 7]; // 3 anchors where 4 are configured
        assert!(pp.run(&raw).is_err());
    }

    #[test]
    fn test_low_score_never_appears() {
        // With threshold 0.5, a 0.4-score detection never survives.
        let pp = PostProcessor::new(&model(2), &detection(0.5));
        let mut raw = anchor(0.5, 0.5, 0.2, 0.2, [0.4, 0.1, 0.1]);
        raw.extend(anchor(0.2, 0.2, 0.1, 0.1, [0.9, 0.1, 0.1]));
        let out = pp.run(&raw).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].confidence > 0.5);
    }

    #[test]
    fn test_best_class_tie_breaks_to_lowest_index() {
        let pp = PostProcessor::new(&model(1), &detection(0.5));
        let raw = anchor(0.5, 0.5, 0.2, 0.2, [0.8, 0.8, 0.8]);
        let out = pp.run(&raw).unwrap();
        assert_eq!(out[0].class_id, 0);
    }

    #[test]
    fn test_output_sorted_and_truncated() {
        let mut pp = PostProcessor::new(&model(3), &detection(0.1));
        pp.max_detections = 2;
        // Three far-apart boxes with distinct scores.
        let mut raw = anchor(0.1, 0.1, 0.1, 0.1, [0.6, 0.0, 0.0]);
        raw.extend(anchor(0.5, 0.5, 0.1, 0.1, [0.9, 0.0, 0.0]));
        raw.extend(anchor(0.9, 0.9, 0.1, 0.1, [0.7, 0.0, 0.0]));
        let out = pp.run(&raw).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[0].confidence >= out[1].confidence);
        assert_eq!(out[0].confidence, 0.9);
        assert_eq!(out[1].confidence, 0.7);
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let dets = vec![
            det([0.1, 0.1, 0.5, 0.5], 0.9),
            det([0.12, 0.12, 0.52, 0.52], 0.8), // heavy overlap with first
            det([0.6, 0.6, 0.9, 0.9], 0.7),
        ];
        let kept = nms(dets, 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.7);
    }

    #[test]
    fn test_nms_idempotent() {
        let dets = vec![
            det([0.1, 0.1, 0.5, 0.5], 0.9),
            det([0.15, 0.15, 0.55, 0.55], 0.85),
            det([0.3, 0.3, 0.7, 0.7], 0.8),
            det([0.6, 0.6, 0.9, 0.9], 0.7),
            det([0.0, 0.6, 0.3, 0.9], 0.6),
        ];
        let once = nms(dets, 0.3);
        let twice = nms(once.clone(), 0.3);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.bbox, b.bbox);
            assert_eq!(a.confidence, b.confidence);
        }
    }

    #[test]
    fn test_confidence_filter_monotonic() {
        // Output at a higher threshold is a subset of output at a lower one.
        // IoU threshold 1.0 disables suppression so only the filter acts.
        let mut raw = Vec::new();
        let scores = [0.2, 0.35, 0.5, 0.65, 0.8];
        for (i, s) in scores.iter().enumerate() {
            raw.extend(anchor(0.1 + 0.2 * i as f32, 0.5, 0.05, 0.05, [*s, 0.0, 0.0]));
        }
        let mut low = PostProcessor::new(&model(5), &detection(0.3));
        low.iou_threshold = 1.0;
        let mut high = PostProcessor::new(&model(5), &detection(0.6));
        high.iou_threshold = 1.0;

        let low_out = low.run(&raw).unwrap();
        let high_out = high.run(&raw).unwrap();
        for d in &high_out {
            assert!(low_out.iter().any(|l| l.bbox == d.bbox));
        }
        assert!(high_out.len() < low_out.len());
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        assert_eq!(iou(&[0.0, 0.0, 0.1, 0.1], &[0.5, 0.5, 0.6, 0.6]), 0.0);
    }

    #[test]
    fn test_iou_identical_is_one() {
        let b = [0.2, 0.2, 0.6, 0.6];
        assert!((iou(&b, &b) - 1.0).abs() < 1e-6);
    }
}
