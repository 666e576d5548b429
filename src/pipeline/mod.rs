// src/pipeline/mod.rs

pub mod buffers;
pub mod event_bus;
pub mod metrics;
pub mod scheduler;
pub mod stages;

pub use buffers::Latest;
pub use event_bus::{EventBus, PipelineEvent};
pub use metrics::PipelineMetrics;
pub use scheduler::{PipelineRunner, StageSpec};
