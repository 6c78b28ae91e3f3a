//! Pipeline orchestration
//!
//! Runs the four stages in order for one run id. Stage outputs go through an
//! [`ArtifactStore`] so each stage only receives the key of its input.
//! Cancellation is checked at stage boundaries; a stage that has started
//! always runs to completion or failure.

use crate::artifact::{decode, ArtifactKey, ArtifactStore, FsArtifactStore};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::models::{ScaledMatrix, SseCurve};
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::stages::{Loader, PredictionReport, Predictor, Preprocessor, Stage, Trainer};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Cooperative cancellation flag shared with the caller
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a successful pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub rows_scaled: usize,
    pub sse: SseCurve,
    pub monotonicity_violations: Vec<usize>,
    pub model_path: PathBuf,
    pub report: PredictionReport,
    pub duration_secs: f64,
}

/// Sequential runner for the profiling stages
pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<dyn ArtifactStore>,
    metrics: PipelineMetrics,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, store: Arc<dyn ArtifactStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            metrics: PipelineMetrics::new(),
        })
    }

    /// Pipeline backed by the filesystem store under `artifact_dir`
    pub fn with_fs_store(config: PipelineConfig) -> Result<Self> {
        let store = Arc::new(FsArtifactStore::new(config.artifact_dir()));
        Self::new(config, store)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Execute every stage for `run_id`
    pub fn run(&self, run_id: &str, cancel: &CancelToken) -> Result<RunSummary> {
        let started = Instant::now();
        let logger = StructuredLogger::new(run_id);
        self.metrics.inc_runs();

        let training_csv = self.config.training_csv();
        let test_csv = self.config.test_csv();
        logger.log_pipeline_started(
            &self.config.root_dir,
            &[
                (training_csv.as_path(), file_size(&training_csv)),
                (test_csv.as_path(), file_size(&test_csv)),
            ],
        );

        let result = self.execute(run_id, cancel, &logger, started);
        if result.is_err() {
            self.metrics.inc_failed_runs();
        }
        result
    }

    fn execute(
        &self,
        run_id: &str,
        cancel: &CancelToken,
        logger: &StructuredLogger,
        started: Instant,
    ) -> Result<RunSummary> {
        let key = |stage: Stage| ArtifactKey::new(run_id, stage.as_str());
        let model_path = self.config.model_path(&self.config.model_filename);

        self.stage(Stage::Load, cancel, logger, || {
            let table = Loader::new(self.config.training_csv()).run(logger)?;
            self.store.put(&key(Stage::Load), &table)
        })?;

        self.stage(Stage::Preprocess, cancel, logger, || {
            let table = self.store.get(&key(Stage::Load))?;
            let matrix = Preprocessor::new().run(&table, logger)?;
            self.store.put(&key(Stage::Preprocess), &matrix)
        })?;

        let (rows_scaled, outcome) = self.stage(Stage::Train, cancel, logger, || {
            let matrix: ScaledMatrix = decode(&self.store.get(&key(Stage::Preprocess))?)?;
            self.metrics.set_rows_scaled(matrix.len());
            let outcome = Trainer::from_config(&self.config).train(&matrix, &model_path, logger)?;
            self.store
                .put(&key(Stage::Train), &serde_json::to_string(&outcome.sse)?)?;
            Ok((matrix.len(), outcome))
        })?;
        self.metrics.set_sse_curve(outcome.sse.values());

        let report = self.stage(Stage::Predict, cancel, logger, || {
            let sse: SseCurve = serde_json::from_str(&self.store.get(&key(Stage::Train))?)?;
            let report = Predictor::from_config(&self.config).predict(&model_path, &sse, logger)?;
            self.store
                .put(&key(Stage::Predict), &report.first_cluster.to_string())?;
            Ok(report)
        })?;

        self.metrics.set_selected_k(report.elbow.k());
        for assignment in &report.assignments {
            self.metrics.inc_assignment(&assignment.label);
        }
        logger.log_pipeline_finished(&self.config.model_dir(), report.first_cluster);

        Ok(RunSummary {
            run_id: run_id.to_string(),
            rows_scaled,
            sse: outcome.sse,
            monotonicity_violations: outcome.monotonicity_violations,
            model_path,
            report,
            duration_secs: started.elapsed().as_secs_f64(),
        })
    }

    /// Run one stage with the boundary cancellation check, timing, and logging
    fn stage<T>(
        &self,
        stage: Stage,
        cancel: &CancelToken,
        logger: &StructuredLogger,
        body: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        if cancel.is_cancelled() {
            let err = PipelineError::Cancelled {
                stage: stage.to_string(),
            };
            logger.log_pipeline_failed(stage.as_str(), &err);
            return Err(err);
        }

        let start = Instant::now();
        match body() {
            Ok(value) => {
                let elapsed = start.elapsed();
                self.metrics.observe_stage(stage.as_str(), elapsed.as_secs_f64());
                logger.log_stage_completed(stage.as_str(), elapsed.as_secs_f64());
                Ok(value)
            }
            Err(err) => {
                logger.log_pipeline_failed(stage.as_str(), &err);
                Err(err)
            }
        }
    }
}

/// Run id derived from the current UTC time
pub fn new_run_id() -> String {
    format!("run-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ"))
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}
