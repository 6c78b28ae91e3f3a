//! Persisted clustering model
//!
//! File layout: one header line `WKM1 <sha256-hex>\n` followed by the
//! bincode payload. The checksum covers the payload only. Files are written
//! to a temp path, synced, and renamed, so readers never observe a partial
//! model.

use crate::artifact::write_atomic;
use crate::cluster::nearest_centroid;
use crate::error::{PipelineError, Result};
use crate::features::{feature_names, matches_canonical, FeatureRow};
use crate::models::MinMaxScaler;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const MAGIC: &str = "WKM1";

/// Centroids and metadata of a fitted K-Means model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub k: usize,
    /// Feature order the centroids were fitted in
    pub feature_names: Vec<String>,
    pub centroids: Vec<FeatureRow>,
    pub inertia: f64,
    /// Scaler fitted on the training batch
    pub training_scaler: Option<MinMaxScaler>,
    /// Unix timestamp of the fit
    pub trained_at: i64,
}

impl TrainedModel {
    pub fn new(centroids: Vec<FeatureRow>, inertia: f64, training_scaler: Option<MinMaxScaler>) -> Self {
        Self {
            k: centroids.len(),
            feature_names: feature_names(),
            centroids,
            inertia,
            training_scaler,
            trained_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Check the feature-order and shape contract
    pub fn validate(&self) -> Result<()> {
        if !matches_canonical(&self.feature_names) {
            return Err(PipelineError::FeatureMismatch {
                expected: feature_names(),
                found: self.feature_names.clone(),
            });
        }
        if self.k == 0 || self.centroids.len() != self.k {
            return Err(PipelineError::CentroidCount {
                k: self.k,
                centroids: self.centroids.len(),
            });
        }
        Ok(())
    }

    /// Nearest centroid and squared distance for each scaled row
    pub fn assign(&self, rows: &[FeatureRow]) -> Vec<(usize, f64)> {
        rows.iter()
            .map(|r| nearest_centroid(r, &self.centroids))
            .collect()
    }

    /// Write the model, creating the parent directory and replacing any
    /// previous file
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::persistence(parent, e))?;
        }

        let payload = bincode::serialize(self)?;
        let mut bytes = format!("{} {}\n", MAGIC, compute_checksum(&payload)).into_bytes();
        bytes.extend_from_slice(&payload);

        write_atomic(path, &bytes).map_err(|e| PipelineError::persistence(path, e))?;

        info!(
            path = %path.display(),
            k = self.k,
            size = bytes.len(),
            "Model saved"
        );
        Ok(())
    }

    /// Read and verify a model written by [`TrainedModel::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| PipelineError::persistence(path, e))?;
        let corrupt = |reason: &str| PipelineError::CorruptModel {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let newline = bytes
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| corrupt("missing header"))?;
        let header =
            std::str::from_utf8(&bytes[..newline]).map_err(|_| corrupt("header is not UTF-8"))?;
        let payload = &bytes[newline + 1..];

        let checksum = match header.split_once(' ') {
            Some((MAGIC, checksum)) => checksum,
            _ => return Err(corrupt("unrecognized header")),
        };
        let computed = compute_checksum(payload);
        if computed != checksum {
            return Err(PipelineError::CorruptModel {
                path: path.to_path_buf(),
                reason: format!("checksum mismatch: expected {}, got {}", checksum, computed),
            });
        }

        let model: TrainedModel = bincode::deserialize(payload)
            .map_err(|e| corrupt(&format!("undecodable payload: {}", e)))?;
        model.validate()?;

        debug!(path = %path.display(), k = model.k, "Model loaded");
        Ok(model)
    }
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn sample_model() -> TrainedModel {
        TrainedModel::new(
            vec![[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], [0.9, 0.8, 0.7, 0.6, 0.5, 0.4]],
            1.25,
            None,
        )
    }

    #[test]
    fn test_save_creates_directory_and_roundtrips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model").join("workload_model.sav");
        let model = sample_model();
        model.save(&path).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(TrainedModel::load(&path).unwrap(), model);
    }

    #[test]
    fn test_save_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("m.sav");
        sample_model().save(&path).unwrap();
        let single = TrainedModel::new(vec![[0.5; 6]], 3.0, None);
        single.save(&path).unwrap();
        assert_eq!(TrainedModel::load(&path).unwrap().k, 1);
    }

    #[test]
    fn test_tampered_payload_detected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("m.sav");
        sample_model().save(&path).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let err = TrainedModel::load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_missing_file_is_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = TrainedModel::load(&temp_dir.path().join("absent.sav")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_feature_permutation_rejected() {
        let mut model = sample_model();
        model.feature_names.swap(0, 1);
        let err = model.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Contract);
    }

    #[test]
    fn test_assign_ties_to_lowest_index() {
        let model = TrainedModel::new(vec![[0.0; 6], [1.0; 6]], 0.0, None);
        let assigned = model.assign(&[[0.5; 6], [0.9; 6]]);
        assert_eq!(assigned[0].0, 0);
        assert_eq!(assigned[1].0, 1);
    }
}
