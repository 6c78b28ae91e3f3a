//! Canonical workload feature set
//!
//! The preprocessor, the trainer's persisted model, and the predictor all
//! import the feature list from here. The order is part of the model file
//! format: a model whose feature list differs is rejected on load.

/// Number of features in the clustering vector
pub const NUM_FEATURES: usize = 6;

/// Feature columns in canonical order
pub const FEATURES: [&str; NUM_FEATURES] = [
    "cpu_percent",
    "memory_percent",
    "disk_io_mbps",
    "network_mbps",
    "runtime_seconds",
    "gpu_util_percent",
];

/// A single row projected onto the canonical feature order
pub type FeatureRow = [f64; NUM_FEATURES];

/// Feature names as owned strings, as stored in the model file
pub fn feature_names() -> Vec<String> {
    FEATURES.iter().map(|f| f.to_string()).collect()
}

/// Returns true if `names` is exactly the canonical list, in order
pub fn matches_canonical<S: AsRef<str>>(names: &[S]) -> bool {
    names.len() == NUM_FEATURES
        && names
            .iter()
            .zip(FEATURES.iter())
            .all(|(a, b)| a.as_ref() == *b)
}

/// Default model file name used by the orchestrator
pub const DEFAULT_MODEL_FILENAME: &str = "workload_model.sav";

/// Training CSV location relative to the pipeline root
pub const TRAINING_CSV: &str = "data/server_workloads.csv";

/// Test CSV location relative to the pipeline root
pub const TEST_CSV: &str = "data/test.csv";

/// Model directory relative to the pipeline root
pub const MODEL_DIR: &str = "model";

/// Artifact store directory relative to the pipeline root
pub const ARTIFACT_DIR: &str = "artifacts";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        assert_eq!(FEATURES[0], "cpu_percent");
        assert_eq!(FEATURES[5], "gpu_util_percent");
        assert!(matches_canonical(&feature_names()));
    }

    #[test]
    fn test_permutation_detected() {
        let mut names = feature_names();
        names.swap(1, 2);
        assert!(!matches_canonical(&names));
        assert!(!matches_canonical(&names[..5]));
    }
}
