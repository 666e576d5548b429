// src/config.rs

use crate::types::Config;
use anyhow::{bail, Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject invalid configuration before the pipeline runs.
    pub fn validate(&self) -> Result<()> {
        if self.model.num_anchors == 0 || self.model.num_classes == 0 {
            bail!("model.num_anchors and model.num_classes must be positive");
        }
        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            bail!(
                "detection.confidence_threshold must be in [0, 1], got {}",
                self.detection.confidence_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.detection.iou_threshold) {
            bail!(
                "detection.iou_threshold must be in [0, 1], got {}",
                self.detection.iou_threshold
            );
        }
        if self.detection.max_detections == 0 {
            bail!("detection.max_detections must be positive");
        }
        if self.zones.left_x >= self.zones.right_x {
            bail!(
                "zones.left_x ({}) must be less than zones.right_x ({})",
                self.zones.left_x,
                self.zones.right_x
            );
        }
        if self.zones.top_y >= self.zones.bottom_y {
            bail!(
                "zones.top_y ({}) must be less than zones.bottom_y ({})",
                self.zones.top_y,
                self.zones.bottom_y
            );
        }
        if self.validation.stability_frames == 0 {
            bail!("validation.stability_frames must be positive");
        }
        if self.spatial.baseline_m <= 0.0 {
            bail!("spatial.baseline_m must be positive");
        }
        if self.spatial.reference_depth <= 0.0 {
            bail!("spatial.reference_depth must be positive");
        }
        if self.spatial.max_disparity == 0 {
            bail!("spatial.max_disparity must be positive");
        }
        for (name, hz) in [
            ("capture_hz", self.pipeline.capture_hz),
            ("inference_hz", self.pipeline.inference_hz),
            ("mapping_hz", self.pipeline.mapping_hz),
            ("render_hz", self.pipeline.render_hz),
        ] {
            if hz <= 0.0 {
                bail!("pipeline.{} must be positive, got {}", name, hz);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::types::*;

    fn valid_config() -> Config {
        Config {
            model: ModelConfig {
                input_width: 320,
                input_height: 320,
                num_anchors: 100,
                num_classes: 4,
                labels: vec!["bottle".into(), "cup".into(), "tool".into(), "part".into()],
            },
            detection: DetectionConfig {
                confidence_threshold: 0.5,
                iou_threshold: 0.45,
                max_detections: 8,
            },
            spatial: SpatialConfig {
                baseline_m: 0.064,
                reference_depth: 2.0,
                depth_scale_default: 0.1,
                parallax_offset: [0.0, 0.02, 0.0],
                patch_radius: 4,
                max_disparity: 64,
            },
            zones: ZoneConfig {
                left_x: 0.33,
                right_x: 0.66,
                top_y: 0.33,
                bottom_y: 0.66,
            },
            validation: ValidationConfig {
                stability_frames: 10,
                min_event_interval_ms: 1000,
                auto_advance: false,
                auto_advance_delay_ms: 3000,
            },
            pipeline: PipelineConfig {
                capture_hz: 30.0,
                inference_hz: 5.0,
                mapping_hz: 5.0,
                render_hz: 5.0,
                shutdown_timeout_ms: 500,
            },
            demo: DemoConfig {
                steps_path: "steps.yaml".into(),
                output_dir: "output".into(),
                run_seconds: 10,
            },
            logging: LoggingConfig {
                level: "info".into(),
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_inverted_horizontal_zones_rejected() {
        let mut config = valid_config();
        config.zones.left_x = 0.7;
        config.zones.right_x = 0.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_equal_vertical_zones_rejected() {
        let mut config = valid_config();
        config.zones.top_y = 0.5;
        config.zones.bottom_y = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_stability_frames_rejected() {
        let mut config = valid_config();
        config.validation.stability_frames = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_rate_rejected() {
        let mut config = valid_config();
        config.pipeline.inference_hz = -5.0;
        assert!(config.validate().is_err());
    }
}
