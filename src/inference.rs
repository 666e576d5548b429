// src/inference.rs

use anyhow::Result;

/// Opaque neural inference collaborator: a normalized image tensor in,
/// a raw per-anchor tensor of shape `[A, 4+C]` out. The call is
/// synchronous; the engine itself (ONNX runtime, remote service, stub)
/// is outside the pipeline's concern.
pub trait InferenceEngine: Send {
    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>>;
}
