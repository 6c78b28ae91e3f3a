//! End-to-end pipeline runs against temporary roots

use profiler_lib::artifact::{ArtifactKey, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
use profiler_lib::synth::{self, isotropic_blobs, profile_centers, PROFILES, TEST_BATCH};
use profiler_lib::{CancelToken, ErrorKind, FeatureRow, Pipeline, PipelineConfig, Stage};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const HEADER: &str =
    "cpu_percent,memory_percent,disk_io_mbps,network_mbps,runtime_seconds,gpu_util_percent";

/// Pipeline root with the given training rows and the default test batch
fn root_with(training: &[FeatureRow]) -> (TempDir, PipelineConfig) {
    let temp_dir = TempDir::new().unwrap();
    let config = PipelineConfig::with_root(temp_dir.path());
    synth::write_csv(&config.training_csv(), training).unwrap();
    synth::write_csv(&config.test_csv(), &TEST_BATCH).unwrap();
    (temp_dir, config)
}

/// Pipeline root with a raw training CSV body
fn root_with_csv(training: &str) -> (TempDir, PipelineConfig) {
    let (temp_dir, config) = root_with(&TEST_BATCH);
    fs::write(config.training_csv(), training).unwrap();
    (temp_dir, config)
}

fn four_blobs() -> Vec<FeatureRow> {
    isotropic_blobs(&profile_centers(&PROFILES), 3.0, 75, 42).unwrap()
}

#[test]
fn test_four_blobs_select_four_clusters() {
    let (_dir, config) = root_with(&four_blobs());
    assert_eq!(config.restarts, 10);
    assert_eq!(config.random_seed, 42);
    assert_eq!(config.kmax, 20);
    let pipeline = Pipeline::new(config, Arc::new(MemoryArtifactStore::new())).unwrap();

    let summary = pipeline.run("run-blobs", &CancelToken::new()).unwrap();

    assert_eq!(summary.rows_scaled, 300);
    assert_eq!(summary.sse.len(), 20);
    assert_eq!(summary.report.elbow.k(), Some(4));

    let sse1 = summary.sse.at(1).unwrap();
    let sse3 = summary.sse.at(3).unwrap();
    let sse4 = summary.sse.at(4).unwrap();
    let sse20 = summary.sse.at(20).unwrap();
    assert!(sse3 > 5.0 * sse4);
    assert!(sse4 - sse20 < 0.05 * sse1);
}

#[test]
fn test_default_batch_is_labeled() {
    let rows = synth::generate_workloads(&PROFILES, 75, 42).unwrap();
    let (dir, config) = root_with(&rows);
    let pipeline = Pipeline::with_fs_store(config.clone()).unwrap();

    let summary = pipeline.run("run-fixtures", &CancelToken::new()).unwrap();
    let report = &summary.report;

    assert_eq!(report.model_k, 20);
    assert_eq!(report.assignments.len(), 5);
    assert!(report.assignments.iter().all(|a| a.cluster < report.model_k));
    assert_eq!(report.first_cluster, report.assignments[0].cluster);
    assert!(config.model_path(&config.model_filename).exists());

    let store = FsArtifactStore::new(dir.path().join("artifacts"));
    let keys = store.list("run-fixtures").unwrap();
    assert_eq!(keys.len(), Stage::ALL.len());
    let first = store
        .get(&ArtifactKey::new("run-fixtures", Stage::Predict.as_str()))
        .unwrap();
    assert_eq!(first, report.first_cluster.to_string());
}

#[test]
fn test_missing_column_stops_before_training() {
    let (_dir, config) = root_with_csv(
        "cpu_percent,memory_percent,disk_io_mbps,network_mbps,runtime_seconds\n\
         85,40,20,15,600\n\
         50,88,80,30,1200\n",
    );
    let model_path = config.model_path(&config.model_filename);
    let store = Arc::new(MemoryArtifactStore::new());
    let pipeline = Pipeline::new(config, store.clone()).unwrap();

    let err = pipeline.run("run-s3", &CancelToken::new()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InputMalformed);
    assert!(err.to_string().contains("gpu_util_percent"));
    assert!(!model_path.exists());
    let keys = store.list("run-s3").unwrap();
    assert_eq!(keys, vec![ArtifactKey::new("run-s3", "load")]);
}

#[test]
fn test_all_rows_incomplete_is_degenerate() {
    let (_dir, config) = root_with_csv(&format!(
        "{}\n85,NaN,20,15,600,10\n50,88,,30,1200,15\n55,70,50,60,1800,\n",
        HEADER
    ));
    let model_path = config.model_path(&config.model_filename);
    let pipeline = Pipeline::new(config, Arc::new(MemoryArtifactStore::new())).unwrap();

    let err = pipeline.run("run-s4", &CancelToken::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DegenerateData);
    assert!(!model_path.exists());
}

#[test]
fn test_constant_gpu_column_is_degenerate() {
    let (_dir, config) = root_with_csv(&format!(
        "{}\n85,40,20,15,600,5\n50,88,80,30,1200,5\n10,15,5,5,60,5\n",
        HEADER
    ));
    let pipeline = Pipeline::new(config, Arc::new(MemoryArtifactStore::new())).unwrap();

    let err = pipeline.run("run-s5", &CancelToken::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DegenerateData);
    assert!(err.to_string().contains("gpu_util_percent"));
}

#[test]
fn test_single_cluster_sweep() {
    let (_dir, mut config) = root_with(&four_blobs());
    config.kmax = 1;
    let pipeline = Pipeline::new(config, Arc::new(MemoryArtifactStore::new())).unwrap();

    let summary = pipeline.run("run-s6", &CancelToken::new()).unwrap();

    assert_eq!(summary.sse.len(), 1);
    assert_eq!(summary.report.elbow.k(), None);
    assert_eq!(summary.report.model_k, 1);
    assert!(summary.report.assignments.iter().all(|a| a.cluster == 0));
    assert!(summary
        .report
        .assignments
        .iter()
        .all(|a| a.label == "Profile-A"));
    assert_eq!(summary.report.first_cluster, 0);
}

#[test]
fn test_rerun_replaces_model() {
    let (_dir, mut config) = root_with(&four_blobs());
    config.kmax = 3;
    let model_path = config.model_path(&config.model_filename);
    let pipeline = Pipeline::new(config, Arc::new(MemoryArtifactStore::new())).unwrap();

    let first = pipeline.run("run-a", &CancelToken::new()).unwrap();
    let second = pipeline.run("run-b", &CancelToken::new()).unwrap();

    assert_eq!(first.sse, second.sse);
    assert_eq!(first.report.assignments, second.report.assignments);
    assert!(model_path.exists());
    assert!(!model_path.with_extension("tmp").exists());
}

#[test]
fn test_missing_training_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = PipelineConfig::with_root(temp_dir.path());
    let pipeline = Pipeline::new(config, Arc::new(MemoryArtifactStore::new())).unwrap();

    let err = pipeline.run("run-empty", &CancelToken::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InputMalformed);
}
