//! Selector/Predictor stage
//!
//! Reports the optimal K from the SSE curve and labels the held-out test
//! batch with the persisted model. The elbow is informational: labeling
//! always uses the persisted model, whatever K it was fitted with.

use crate::cluster::{Elbow, ElbowSelector};
use crate::config::{PipelineConfig, ScalerMode};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureRow, FEATURES, NUM_FEATURES};
use crate::model::TrainedModel;
use crate::models::{profile_label, Assignment, MinMaxScaler, SseCurve, Table};
use crate::observability::StructuredLogger;
use crate::stages::loader::read_table;
use crate::stages::preprocess::{feature_columns, parse_row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Labels test workloads with a persisted model
#[derive(Debug, Clone)]
pub struct Predictor {
    test_csv: PathBuf,
    scaler_mode: ScalerMode,
    selector: ElbowSelector,
}

impl Predictor {
    pub fn new(test_csv: impl Into<PathBuf>) -> Self {
        Self {
            test_csv: test_csv.into(),
            scaler_mode: ScalerMode::default(),
            selector: ElbowSelector::default(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.test_csv()).with_scaler_mode(config.scaler_mode)
    }

    pub fn with_scaler_mode(mut self, mode: ScalerMode) -> Self {
        self.scaler_mode = mode;
        self
    }

    /// Read and validate the test batch in canonical feature order
    pub fn load_test_rows(&self) -> Result<Vec<FeatureRow>> {
        let table = read_table(&self.test_csv)?;
        let columns = feature_columns(&table)?;
        (0..table.len())
            .map(|row| {
                parse_row(&table, row, &columns)?.ok_or_else(|| missing_value(&table, row, &columns))
            })
            .collect()
    }

    /// Map test rows into the unit cube according to the scaler mode
    pub fn scale(&self, model: &TrainedModel, rows: &[FeatureRow]) -> Result<Vec<FeatureRow>> {
        let scaler = match self.scaler_mode {
            ScalerMode::RefitOnTest => {
                // Legacy behavior: positions are only comparable to the
                // centroids when the test ranges resemble the training ranges.
                MinMaxScaler::fit(rows).ok_or(PipelineError::TooFewRows { rows: 0 })?
            }
            ScalerMode::Training => model.training_scaler.clone().ok_or_else(|| {
                PipelineError::Config(
                    "scaler_mode = training needs a model with a stored training scaler"
                        .to_string(),
                )
            })?,
        };
        debug!(mode = ?self.scaler_mode, min = ?scaler.min, range = ?scaler.range, "Scaling test batch");
        Ok(scaler.transform(rows))
    }

    /// Select the elbow and label every test row
    pub fn predict(
        &self,
        model_path: &Path,
        sse: &SseCurve,
        logger: &StructuredLogger,
    ) -> Result<PredictionReport> {
        let model = TrainedModel::load(model_path)?;

        let elbow = self.selector.select(sse.values());
        logger.log_elbow(&elbow);

        let rows = self.load_test_rows()?;
        let scaled = self.scale(&model, &rows)?;

        let assignments: Vec<Assignment> = model
            .assign(&scaled)
            .into_iter()
            .enumerate()
            .map(|(row, (cluster, distance_sq))| Assignment {
                row,
                cluster,
                label: profile_label(cluster),
                distance_sq,
            })
            .collect();
        for assignment in &assignments {
            logger.log_assignment(assignment);
        }

        let first_cluster = assignments
            .first()
            .map(|a| a.cluster)
            .ok_or_else(|| PipelineError::EmptyTable {
                path: self.test_csv.clone(),
            })?;

        Ok(PredictionReport {
            elbow,
            model_k: model.k,
            assignments,
            first_cluster,
        })
    }

    /// Stage entry point: the first test row's cluster index
    pub fn run(&self, model_path: &Path, sse: &SseCurve, logger: &StructuredLogger) -> Result<usize> {
        Ok(self.predict(model_path, sse, logger)?.first_cluster)
    }
}

fn missing_value(table: &Table, row: usize, columns: &[usize; NUM_FEATURES]) -> PipelineError {
    let j = columns
        .iter()
        .position(|&c| table.rows[row].get(c).map_or(true, |v| v.is_none()))
        .unwrap_or(0);
    PipelineError::MissingValue {
        column: FEATURES[j].to_string(),
        row,
    }
}

/// Outcome of the selector/predictor stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionReport {
    pub elbow: Elbow,
    /// K of the persisted model used for labeling
    pub model_k: usize,
    pub assignments: Vec<Assignment>,
    pub first_cluster: usize,
}
