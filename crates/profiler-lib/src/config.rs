//! Pipeline configuration
//!
//! Paths are stored as given and resolved against `root_dir` on access, so
//! the same record works for an installed pipeline and for a temporary
//! directory in tests.

use crate::error::{PipelineError, Result};
use crate::features::{ARTIFACT_DIR, DEFAULT_MODEL_FILENAME, MODEL_DIR, TEST_CSV, TRAINING_CSV};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum cluster count swept by the trainer
pub const DEFAULT_KMAX: usize = 20;

/// Seed for centroid initialization
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// Independent K-Means restarts per K
pub const DEFAULT_RESTARTS: usize = 10;

/// Lloyd iterations per restart
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

/// Relative convergence tolerance
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// How test rows are scaled before assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerMode {
    /// Fit a fresh min-max scaler on the test batch
    #[default]
    RefitOnTest,
    /// Reuse the scaler fitted on the training batch, stored in the model
    Training,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root that relative paths resolve against
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    #[serde(default = "default_training_csv_path")]
    pub training_csv_path: PathBuf,

    #[serde(default = "default_test_csv_path")]
    pub test_csv_path: PathBuf,

    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    #[serde(default = "default_model_filename")]
    pub model_filename: String,

    /// Where the orchestrator keeps inter-stage artifacts
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    #[serde(default = "default_kmax")]
    pub kmax: usize,

    #[serde(default = "default_random_seed")]
    pub random_seed: u64,

    #[serde(default = "default_restarts")]
    pub restarts: usize,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    #[serde(default)]
    pub scaler_mode: ScalerMode,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_training_csv_path() -> PathBuf {
    PathBuf::from(TRAINING_CSV)
}

fn default_test_csv_path() -> PathBuf {
    PathBuf::from(TEST_CSV)
}

fn default_model_dir() -> PathBuf {
    PathBuf::from(MODEL_DIR)
}

fn default_model_filename() -> String {
    DEFAULT_MODEL_FILENAME.to_string()
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(ARTIFACT_DIR)
}

fn default_kmax() -> usize {
    DEFAULT_KMAX
}

fn default_random_seed() -> u64 {
    DEFAULT_RANDOM_SEED
}

fn default_restarts() -> usize {
    DEFAULT_RESTARTS
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            training_csv_path: default_training_csv_path(),
            test_csv_path: default_test_csv_path(),
            model_dir: default_model_dir(),
            model_filename: default_model_filename(),
            artifact_dir: default_artifact_dir(),
            kmax: default_kmax(),
            random_seed: default_random_seed(),
            restarts: default_restarts(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            scaler_mode: ScalerMode::default(),
        }
    }
}

impl PipelineConfig {
    /// Default configuration rooted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root.into(),
            ..Default::default()
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_dir.join(path)
        }
    }

    pub fn training_csv(&self) -> PathBuf {
        self.resolve(&self.training_csv_path)
    }

    pub fn test_csv(&self) -> PathBuf {
        self.resolve(&self.test_csv_path)
    }

    pub fn model_dir(&self) -> PathBuf {
        self.resolve(&self.model_dir)
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.resolve(&self.artifact_dir)
    }

    /// Full path of the model file for a given file name
    pub fn model_path(&self, filename: &str) -> PathBuf {
        self.model_dir().join(filename)
    }

    /// Reject values the stages cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.kmax == 0 {
            return Err(PipelineError::Config("kmax must be at least 1".to_string()));
        }
        if self.restarts == 0 {
            return Err(PipelineError::Config("restarts must be at least 1".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(PipelineError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(PipelineError::Config(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        validate_model_filename(&self.model_filename)
    }
}

/// Model file names are plain file names inside the model directory
pub fn validate_model_filename(filename: &str) -> Result<()> {
    if filename.is_empty() || filename.contains(['/', '\\']) || filename == "." || filename == ".." {
        return Err(PipelineError::Config(format!(
            "model filename '{}' must be a plain file name",
            filename
        )));
    }
    Ok(())
}
