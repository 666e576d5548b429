// src/render.rs
//
// Surface exposed to the rendering collaborator: one slot per tracked
// detection, bounded to max_detections, refreshed once per mapping
// cycle. The renderer reads whatever slots are currently published.

use crate::types::{Point3, Scale3};
use serde::Serialize;
use tracing::debug;

/// Fixed label width; renderers allocate glyph buffers once.
pub const LABEL_WIDTH: usize = 16;

#[derive(Debug, Clone, Serialize)]
pub struct LabelSlot {
    /// Fixed-width text: truncated or right-padded to LABEL_WIDTH.
    pub text: String,
    pub position: Point3,
    pub scale: Scale3,
    pub visible: bool,
}

impl LabelSlot {
    pub fn new(label: &str, position: Point3, scale: Scale3, visible: bool) -> Self {
        Self {
            text: format_label(label),
            position,
            scale,
            visible,
        }
    }
}

/// Truncate or pad a label to the fixed slot width.
pub fn format_label(label: &str) -> String {
    let mut text: String = label.chars().take(LABEL_WIDTH).collect();
    while text.chars().count() < LABEL_WIDTH {
        text.push(' ');
    }
    text
}

/// Consumes the published label slots each render cycle.
pub trait RenderSink: Send {
    fn present(&mut self, slots: &[LabelSlot]);
}

/// Render sink for headless runs: logs visible slots instead of drawing.
pub struct LogRenderSink;

impl RenderSink for LogRenderSink {
    fn present(&mut self, slots: &[LabelSlot]) {
        for slot in slots.iter().filter(|s| s.visible) {
            debug!(
                "render: '{}' at ({:.2}, {:.2}, {:.2})",
                slot.text.trim_end(),
                slot.position.x,
                slot.position.y,
                slot.position.z
            );
        }
    }
}
