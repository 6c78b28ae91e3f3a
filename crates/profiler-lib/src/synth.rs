//! Synthetic workload fixtures
//!
//! Seeds the training and test CSVs with telemetry drawn from four job
//! profiles, and provides isotropic blobs for clustering tests.

use crate::artifact::write_atomic;
use crate::error::{PipelineError, Result};
use crate::features::{FeatureRow, FEATURES, NUM_FEATURES};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::path::Path;

/// Normal draw for one feature, clipped to `[lo, hi]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureDist {
    pub mean: f64,
    pub std: f64,
    pub lo: f64,
    pub hi: f64,
}

const fn dist(mean: f64, std: f64, lo: f64, hi: f64) -> FeatureDist {
    FeatureDist { mean, std, lo, hi }
}

/// A job profile: one distribution per canonical feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkloadProfile {
    pub name: &'static str,
    pub features: [FeatureDist; NUM_FEATURES],
}

pub const CPU_BOUND: WorkloadProfile = WorkloadProfile {
    name: "cpu-bound",
    features: [
        dist(85.0, 8.0, 10.0, 100.0),
        dist(40.0, 10.0, 5.0, 100.0),
        dist(20.0, 10.0, 0.0, 200.0),
        dist(15.0, 8.0, 0.0, 100.0),
        dist(600.0, 150.0, 30.0, 3600.0),
        dist(10.0, 5.0, 0.0, 100.0),
    ],
};

pub const MEMORY_BOUND: WorkloadProfile = WorkloadProfile {
    name: "memory-bound",
    features: [
        dist(50.0, 10.0, 10.0, 100.0),
        dist(88.0, 6.0, 5.0, 100.0),
        dist(80.0, 20.0, 0.0, 200.0),
        dist(30.0, 10.0, 0.0, 100.0),
        dist(1200.0, 300.0, 30.0, 3600.0),
        dist(15.0, 8.0, 0.0, 100.0),
    ],
};

pub const GPU_INTENSIVE: WorkloadProfile = WorkloadProfile {
    name: "gpu-intensive",
    features: [
        dist(55.0, 12.0, 10.0, 100.0),
        dist(70.0, 10.0, 5.0, 100.0),
        dist(50.0, 15.0, 0.0, 200.0),
        dist(60.0, 15.0, 0.0, 100.0),
        dist(1800.0, 400.0, 30.0, 3600.0),
        dist(90.0, 7.0, 0.0, 100.0),
    ],
};

pub const IDLE: WorkloadProfile = WorkloadProfile {
    name: "idle",
    features: [
        dist(10.0, 5.0, 10.0, 100.0),
        dist(15.0, 8.0, 5.0, 100.0),
        dist(5.0, 3.0, 0.0, 200.0),
        dist(5.0, 3.0, 0.0, 100.0),
        dist(60.0, 30.0, 30.0, 3600.0),
        dist(2.0, 2.0, 0.0, 100.0),
    ],
};

pub const PROFILES: [WorkloadProfile; 4] = [CPU_BOUND, MEMORY_BOUND, GPU_INTENSIVE, IDLE];

/// Rows per profile in the default training fixture
pub const ROWS_PER_PROFILE: usize = 75;

/// Five held-out workloads used as the default test batch
pub const TEST_BATCH: [FeatureRow; 5] = [
    [92.0, 35.0, 15.0, 10.0, 500.0, 8.0],
    [45.0, 90.0, 85.0, 25.0, 1100.0, 12.0],
    [60.0, 75.0, 45.0, 55.0, 2000.0, 92.0],
    [12.0, 10.0, 3.0, 4.0, 45.0, 1.0],
    [70.0, 55.0, 40.0, 30.0, 800.0, 50.0],
];

fn normal(mean: f64, std: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std)
        .map_err(|e| PipelineError::Config(format!("invalid normal({mean}, {std}): {e}")))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Draw `n_per_profile` rows from every profile, shuffled and rounded to 2 decimals
pub fn generate_workloads(
    profiles: &[WorkloadProfile],
    n_per_profile: usize,
    seed: u64,
) -> Result<Vec<FeatureRow>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(profiles.len() * n_per_profile);

    for profile in profiles {
        let dists = profile
            .features
            .iter()
            .map(|f| normal(f.mean, f.std))
            .collect::<Result<Vec<_>>>()?;
        for _ in 0..n_per_profile {
            let mut row = [0.0; NUM_FEATURES];
            for (j, (d, bounds)) in dists.iter().zip(profile.features.iter()).enumerate() {
                row[j] = round2(d.sample(&mut rng).clamp(bounds.lo, bounds.hi));
            }
            rows.push(row);
        }
    }

    rows.shuffle(&mut rng);
    Ok(rows)
}

/// Isotropic Gaussian blobs with a shared standard deviation, shuffled
pub fn isotropic_blobs(
    centers: &[FeatureRow],
    std: f64,
    n_per_center: usize,
    seed: u64,
) -> Result<Vec<FeatureRow>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noise = normal(0.0, std)?;

    let mut rows = Vec::with_capacity(centers.len() * n_per_center);
    for center in centers {
        for _ in 0..n_per_center {
            let mut row = *center;
            for v in row.iter_mut() {
                *v += noise.sample(&mut rng);
            }
            rows.push(row);
        }
    }
    rows.shuffle(&mut rng);
    Ok(rows)
}

/// Profile means, usable as blob centers
pub fn profile_centers(profiles: &[WorkloadProfile]) -> Vec<FeatureRow> {
    profiles
        .iter()
        .map(|p| {
            let mut center = [0.0; NUM_FEATURES];
            for (c, f) in center.iter_mut().zip(p.features.iter()) {
                *c = f.mean;
            }
            center
        })
        .collect()
}

/// Write rows under the canonical feature header, replacing any existing file
pub fn write_csv(path: &Path, rows: &[FeatureRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let to_io = |e: csv::Error| PipelineError::persistence(path, e.into());

    writer.write_record(FEATURES).map_err(to_io)?;
    for row in rows {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .map_err(to_io)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PipelineError::persistence(path, e.into_error()))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::persistence(parent, e))?;
    }
    write_atomic(path, &bytes).map_err(|e| PipelineError::persistence(path, e))
}

/// Write the default training and test fixtures; returns the training row count
pub fn write_fixtures(training_csv: &Path, test_csv: &Path, seed: u64) -> Result<usize> {
    let rows = generate_workloads(&PROFILES, ROWS_PER_PROFILE, seed)?;
    write_csv(training_csv, &rows)?;
    write_csv(test_csv, &TEST_BATCH)?;
    Ok(rows.len())
}
