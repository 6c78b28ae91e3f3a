//! Observability infrastructure for the profiling pipeline
//!
//! Provides:
//! - Prometheus metrics (stage latency, run outcomes, SSE curve, selected K)
//! - Structured JSON logging with tracing

use crate::cluster::Elbow;
use crate::models::Assignment;
use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for stage durations (in seconds)
const STAGE_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    stage_duration_seconds: HistogramVec,
    runs_total: IntCounter,
    runs_failed: IntCounter,
    sse_by_k: GaugeVec,
    selected_k: IntGauge,
    rows_scaled: IntGauge,
    assignments_total: IntCounterVec,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            stage_duration_seconds: register_histogram_vec!(
                "workload_profiler_stage_duration_seconds",
                "Time spent in each pipeline stage",
                &["stage"],
                STAGE_BUCKETS.to_vec()
            )
            .expect("Failed to register stage_duration_seconds"),

            runs_total: register_int_counter!(
                "workload_profiler_runs_total",
                "Total number of pipeline runs started"
            )
            .expect("Failed to register runs_total"),

            runs_failed: register_int_counter!(
                "workload_profiler_runs_failed_total",
                "Total number of pipeline runs that failed"
            )
            .expect("Failed to register runs_failed"),

            sse_by_k: register_gauge_vec!(
                "workload_profiler_sse",
                "Sum of squared errors of the last sweep, per cluster count",
                &["k"]
            )
            .expect("Failed to register sse"),

            selected_k: register_int_gauge!(
                "workload_profiler_selected_k",
                "Cluster count selected by elbow analysis (0 when undefined)"
            )
            .expect("Failed to register selected_k"),

            rows_scaled: register_int_gauge!(
                "workload_profiler_rows_scaled",
                "Rows that survived preprocessing in the last run"
            )
            .expect("Failed to register rows_scaled"),

            assignments_total: register_int_counter_vec!(
                "workload_profiler_assignments_total",
                "Test workloads assigned per cluster label",
                &["label"]
            )
            .expect("Failed to register assignments_total"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_stage(&self, stage: &str, duration_secs: f64) {
        self.inner()
            .stage_duration_seconds
            .with_label_values(&[stage])
            .observe(duration_secs);
    }

    pub fn inc_runs(&self) {
        self.inner().runs_total.inc();
    }

    pub fn inc_failed_runs(&self) {
        self.inner().runs_failed.inc();
    }

    /// Replace the exported SSE curve
    pub fn set_sse_curve(&self, sse: &[f64]) {
        self.inner().sse_by_k.reset();
        for (i, value) in sse.iter().enumerate() {
            self.inner()
                .sse_by_k
                .with_label_values(&[&(i + 1).to_string()])
                .set(*value);
        }
    }

    pub fn set_selected_k(&self, k: Option<usize>) {
        self.inner().selected_k.set(k.unwrap_or(0) as i64);
    }

    pub fn set_rows_scaled(&self, rows: usize) {
        self.inner().rows_scaled.set(rows as i64);
    }

    pub fn inc_assignment(&self, label: &str) {
        self.inner()
            .assignments_total
            .with_label_values(&[label])
            .inc();
    }
}

/// Structured logger for pipeline events
///
/// Every event carries the run id so that log lines from one run can be
/// grouped downstream.
#[derive(Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Opening announcement: where the run executes and what it reads
    pub fn log_pipeline_started(&self, root_dir: &Path, inputs: &[(&Path, Option<u64>)]) {
        info!(
            event = "pipeline_started",
            run_id = %self.run_id,
            started_at = %chrono::Utc::now().to_rfc3339(),
            working_dir = %root_dir.display(),
            "Server workload clustering pipeline started"
        );
        for (path, size) in inputs {
            info!(
                event = "pipeline_input",
                run_id = %self.run_id,
                path = %path.display(),
                size_bytes = ?size,
                "Input file"
            );
        }
    }

    pub fn log_stage_completed(&self, stage: &str, duration_secs: f64) {
        info!(
            event = "stage_completed",
            run_id = %self.run_id,
            stage = %stage,
            duration_secs = duration_secs,
            "Stage completed"
        );
    }

    pub fn log_table_loaded(&self, path: &Path, rows: usize, columns: &[String]) {
        info!(
            event = "table_loaded",
            run_id = %self.run_id,
            path = %path.display(),
            rows = rows,
            columns = ?columns,
            "Loaded {} workload records",
            rows
        );
    }

    pub fn log_preprocessed(&self, input_rows: usize, kept_rows: usize) {
        info!(
            event = "preprocessed",
            run_id = %self.run_id,
            input_rows = input_rows,
            kept_rows = kept_rows,
            dropped_rows = input_rows - kept_rows,
            "Scaled feature matrix ready"
        );
    }

    pub fn log_sse_point(&self, k: usize, sse: f64, iterations: usize, converged: bool) {
        info!(
            event = "sse_point",
            run_id = %self.run_id,
            k = k,
            sse = sse,
            iterations = iterations,
            converged = converged,
            "k={:2}  SSE={:.4}",
            k,
            sse
        );
    }

    pub fn log_sse_not_monotonic(&self, k: usize, previous: f64, current: f64) {
        warn!(
            event = "sse_not_monotonic",
            run_id = %self.run_id,
            k = k,
            previous_sse = previous,
            sse = current,
            "SSE rose with K; restarts may be too few for this data"
        );
    }

    pub fn log_model_saved(&self, path: &Path, k: usize) {
        info!(
            event = "model_saved",
            run_id = %self.run_id,
            path = %path.display(),
            k = k,
            "Model saved"
        );
    }

    pub fn log_elbow(&self, elbow: &Elbow) {
        match elbow {
            Elbow::Found { k } => {
                info!(
                    event = "elbow_selected",
                    run_id = %self.run_id,
                    optimal_k = *k,
                    "Optimal number of workload clusters: {}",
                    k
                );
            }
            Elbow::Undefined { reason } => {
                warn!(
                    event = "elbow_undefined",
                    run_id = %self.run_id,
                    reason = %reason,
                    "optimal K undefined"
                );
            }
        }
    }

    pub fn log_assignment(&self, assignment: &Assignment) {
        info!(
            event = "workload_assigned",
            run_id = %self.run_id,
            workload = assignment.row + 1,
            cluster = assignment.cluster,
            label = %assignment.label,
            "Workload {}: cluster={} ({})",
            assignment.row + 1,
            assignment.cluster,
            assignment.label
        );
    }

    /// Closing announcement: list the model directory contents
    pub fn log_pipeline_finished(&self, model_dir: &Path, first_cluster: usize) {
        info!(
            event = "pipeline_finished",
            run_id = %self.run_id,
            finished_at = %chrono::Utc::now().to_rfc3339(),
            first_cluster = first_cluster,
            "Workload clustering pipeline finished"
        );
        let Ok(entries) = std::fs::read_dir(model_dir) else {
            warn!(
                event = "pipeline_finished",
                run_id = %self.run_id,
                model_dir = %model_dir.display(),
                "Model directory is not readable"
            );
            return;
        };
        for entry in entries.flatten() {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            info!(
                event = "model_artifact",
                run_id = %self.run_id,
                path = %entry.path().display(),
                size_bytes = size,
                "Model artifact"
            );
        }
    }

    pub fn log_pipeline_failed(&self, stage: &str, error: &dyn std::error::Error) {
        error!(
            event = "pipeline_failed",
            run_id = %self.run_id,
            stage = %stage,
            error = %error,
            "Pipeline run failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_metrics_creation() {
        let metrics = PipelineMetrics::new();
        metrics.observe_stage("train", 0.25);
        metrics.inc_runs();
        metrics.set_sse_curve(&[10.0, 4.0, 1.0]);
        metrics.set_selected_k(Some(2));
        metrics.set_selected_k(None);
        metrics.set_rows_scaled(300);
        metrics.inc_assignment("Profile-A");
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("run-test");
        assert_eq!(logger.run_id(), "run-test");
    }
}
