//! Trainer stage: K sweep and model persistence
//!
//! Fits K-Means for every K in `1..=kmax`, records the best-restart inertia
//! of each as the SSE curve, and persists the K = kmax model only after the
//! whole sweep has succeeded.

use crate::artifact::decode;
use crate::cluster::{KMeansFit, KMeansParams};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::model::TrainedModel;
use crate::models::{ScaledMatrix, SseCurve};
use crate::observability::StructuredLogger;
use std::path::{Path, PathBuf};

/// SSE may rise by this fraction of `sse[K-1]` before it is reported
pub const MONOTONICITY_TOLERANCE: f64 = 1e-9;

/// Sweep settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trainer {
    pub kmax: usize,
    pub restarts: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl Trainer {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            kmax: config.kmax,
            restarts: config.restarts,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            seed: config.random_seed,
        }
    }

    fn params(&self, k: usize) -> KMeansParams {
        KMeansParams::new(k)
            .n_init(self.restarts)
            .max_iter(self.max_iterations)
            .tol(self.tolerance)
            .seed(self.seed)
    }

    /// Fit every K and return the SSE curve with the last fit
    pub fn sweep(&self, matrix: &ScaledMatrix, logger: &StructuredLogger) -> Result<(SseCurve, KMeansFit)> {
        if self.kmax == 0 {
            return Err(PipelineError::Config("kmax must be at least 1".to_string()));
        }

        let mut sse = Vec::with_capacity(self.kmax);
        let mut last = None;
        for k in 1..=self.kmax {
            let fit = self.params(k).fit(&matrix.rows)?;
            logger.log_sse_point(k, fit.inertia, fit.n_iter, fit.converged);
            sse.push(fit.inertia);
            last = Some(fit);
        }

        let curve = SseCurve(sse);
        for k in curve.monotonicity_violations(MONOTONICITY_TOLERANCE) {
            let previous = curve.at(k - 1).unwrap_or(f64::NAN);
            let current = curve.at(k).unwrap_or(f64::NAN);
            logger.log_sse_not_monotonic(k, previous, current);
        }

        let last = last.ok_or(PipelineError::Config("kmax must be at least 1".to_string()))?;
        Ok((curve, last))
    }

    /// Run the sweep and persist the K = kmax model to `model_path`
    pub fn train(
        &self,
        matrix: &ScaledMatrix,
        model_path: &Path,
        logger: &StructuredLogger,
    ) -> Result<TrainOutcome> {
        let (sse, last) = self.sweep(matrix, logger)?;
        let model = TrainedModel::new(last.centroids, last.inertia, Some(matrix.scaler.clone()));
        model.save(model_path)?;
        logger.log_model_saved(model_path, model.k);

        let monotonicity_violations = sse.monotonicity_violations(MONOTONICITY_TOLERANCE);
        Ok(TrainOutcome {
            sse,
            model,
            model_path: model_path.to_path_buf(),
            monotonicity_violations,
        })
    }

    /// Stage entry point: encoded matrix in, SSE curve out
    pub fn run(
        &self,
        encoded_matrix: &str,
        model_path: &Path,
        logger: &StructuredLogger,
    ) -> Result<SseCurve> {
        let matrix: ScaledMatrix = decode(encoded_matrix)?;
        Ok(self.train(&matrix, model_path, logger)?.sse)
    }
}

/// Everything the trainer produced
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub sse: SseCurve,
    pub model: TrainedModel,
    pub model_path: PathBuf,
    /// K values where the SSE curve rose beyond tolerance
    pub monotonicity_violations: Vec<usize>,
}
