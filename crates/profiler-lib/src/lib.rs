//! Workload profiling library
//!
//! This crate provides the core functionality for:
//! - Loading and scaling server workload telemetry
//! - K-Means sweeps and elbow selection
//! - Model persistence and nearest-centroid labeling
//! - Stage orchestration over an artifact store
//! - Metrics and structured logging

pub mod artifact;
pub mod cluster;
pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod synth;

pub use config::{PipelineConfig, ScalerMode};
pub use error::{ErrorKind, PipelineError, Result};
pub use features::{FeatureRow, FEATURES, NUM_FEATURES};
pub use model::TrainedModel;
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
pub use pipeline::{new_run_id, CancelToken, Pipeline, RunSummary};
pub use stages::Stage;
