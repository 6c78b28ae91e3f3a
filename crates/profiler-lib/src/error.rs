//! Error types for the profiling pipeline
//!
//! Every failure a stage can raise is a [`PipelineError`]. Callers that need
//! to branch on the failure class (the orchestrator, the scheduler, tests)
//! use [`PipelineError::kind`] instead of matching individual variants.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure class of a [`PipelineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing file, malformed CSV, missing column, empty table, non-numeric value
    InputMalformed,
    /// Too few rows, zero-variance column, fewer samples than clusters
    DegenerateData,
    /// The clustering routine produced a non-finite inertia
    FitFailure,
    /// I/O or integrity failure on the model file or artifact store
    Persistence,
    /// Inter-stage artifact could not be encoded or decoded
    Artifact,
    /// Feature-order or shape contract between stages was broken
    Contract,
    /// The run was cancelled at a stage boundary
    Cancelled,
    /// Invalid configuration values
    Config,
}

/// Errors that can occur while running the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("input file {path:?} could not be read: {source}")]
    MissingInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path:?}: {source}")]
    MalformedCsv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("required column '{column}' is missing (available: {available:?})")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("table loaded from {path:?} has no data rows")]
    EmptyTable { path: PathBuf },

    #[error("non-numeric value '{value}' in column '{column}' at row {row}")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("missing value in column '{column}' at row {row}")]
    MissingValue { column: String, row: usize },

    #[error("{rows} rows left after dropping incomplete records, need at least 2")]
    TooFewRows { rows: usize },

    #[error("column '{column}' has zero variance (min = max = {value})")]
    ZeroVariance { column: String, value: f64 },

    #[error("{samples} samples cannot be split into {clusters} clusters")]
    TooFewSamples { samples: usize, clusters: usize },

    #[error("K-Means fit for k={k} produced non-finite inertia {inertia}")]
    NonFiniteInertia { k: usize, inertia: f64 },

    #[error("model file {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model file {path:?} is corrupt: {reason}")]
    CorruptModel { path: PathBuf, reason: String },

    #[error("artifact store error for {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {key} not found")]
    ArtifactNotFound { key: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("artifact encoding error: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a {expected} artifact, got {found}")]
    ArtifactKindMismatch { expected: String, found: String },

    #[error("unsupported artifact format version {found} (expected {expected})")]
    ArtifactVersion { expected: u16, found: u16 },

    #[error("feature list mismatch: expected {expected:?}, found {found:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("model declares k={k} but holds {centroids} centroids")]
    CentroidCount { k: usize, centroids: usize },

    #[error("run cancelled before stage '{stage}'")]
    Cancelled { stage: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    /// Failure class used for propagation decisions and assertions
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MissingInput { .. }
            | PipelineError::MalformedCsv { .. }
            | PipelineError::MissingColumn { .. }
            | PipelineError::EmptyTable { .. }
            | PipelineError::NonNumeric { .. }
            | PipelineError::MissingValue { .. } => ErrorKind::InputMalformed,
            PipelineError::TooFewRows { .. }
            | PipelineError::ZeroVariance { .. }
            | PipelineError::TooFewSamples { .. } => ErrorKind::DegenerateData,
            PipelineError::NonFiniteInertia { .. } => ErrorKind::FitFailure,
            PipelineError::Persistence { .. }
            | PipelineError::CorruptModel { .. }
            | PipelineError::Store { .. }
            | PipelineError::ArtifactNotFound { .. } => ErrorKind::Persistence,
            PipelineError::Serialization(_)
            | PipelineError::Encoding(_)
            | PipelineError::Json(_)
            | PipelineError::ArtifactKindMismatch { .. }
            | PipelineError::ArtifactVersion { .. } => ErrorKind::Artifact,
            PipelineError::FeatureMismatch { .. } | PipelineError::CentroidCount { .. } => {
                ErrorKind::Contract
            }
            PipelineError::Cancelled { .. } => ErrorKind::Cancelled,
            PipelineError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Persistence {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err = PipelineError::MissingColumn {
            column: "gpu_util_percent".to_string(),
            available: vec!["cpu_percent".to_string()],
        };
        assert_eq!(err.kind(), ErrorKind::InputMalformed);
        assert_eq!(PipelineError::TooFewRows { rows: 1 }.kind(), ErrorKind::DegenerateData);
        assert_eq!(
            PipelineError::NonFiniteInertia { k: 3, inertia: f64::NAN }.kind(),
            ErrorKind::FitFailure
        );
        assert_eq!(
            PipelineError::Cancelled { stage: "train".to_string() }.kind(),
            ErrorKind::Cancelled
        );
    }

    #[test]
    fn test_messages_name_the_column() {
        let err = PipelineError::ZeroVariance {
            column: "gpu_util_percent".to_string(),
            value: 5.0,
        };
        assert!(err.to_string().contains("gpu_util_percent"));
    }
}
