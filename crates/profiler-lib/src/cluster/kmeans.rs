//! K-Means clustering with Lloyd's algorithm
//!
//! Initialization picks `k` distinct rows uniformly at random. Each fit runs
//! `n_init` independent restarts from one seeded generator and keeps the
//! restart with the lowest inertia, so a fixed seed gives bit-identical
//! results across runs.

use crate::error::{PipelineError, Result};
use crate::features::{FeatureRow, NUM_FEATURES};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Hyperparameters for a single K-Means fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KMeansParams {
    pub n_clusters: usize,
    /// Independent restarts; the lowest inertia wins
    pub n_init: usize,
    pub max_iter: usize,
    /// Relative tolerance, scaled by the mean per-column variance of the data
    pub tol: f64,
    pub seed: u64,
}

impl KMeansParams {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit on `data`, returning the best of `n_init` restarts
    pub fn fit(&self, data: &[FeatureRow]) -> Result<KMeansFit> {
        let k = self.n_clusters;
        if k == 0 || data.len() < k {
            return Err(PipelineError::TooFewSamples {
                samples: data.len(),
                clusters: k,
            });
        }

        let tol_abs = self.tol * mean_column_variance(data);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut best: Option<KMeansFit> = None;

        for _ in 0..self.n_init.max(1) {
            let initial: Vec<FeatureRow> = sample(&mut rng, data.len(), k)
                .into_iter()
                .map(|i| data[i])
                .collect();
            let fit = lloyd(data, initial, self.max_iter, tol_abs);

            let better = match &best {
                None => true,
                Some(current) => fit.inertia < current.inertia,
            };
            if better {
                best = Some(fit);
            }
        }

        let fit = best.ok_or(PipelineError::TooFewSamples {
            samples: data.len(),
            clusters: k,
        })?;
        if !fit.inertia.is_finite() {
            return Err(PipelineError::NonFiniteInertia {
                k,
                inertia: fit.inertia,
            });
        }
        Ok(fit)
    }
}

/// Result of a K-Means fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansFit {
    pub centroids: Vec<FeatureRow>,
    pub labels: Vec<usize>,
    /// Sum of squared distances to the assigned centroids
    pub inertia: f64,
    pub n_iter: usize,
    pub converged: bool,
}

impl KMeansFit {
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    pub fn predict(&self, rows: &[FeatureRow]) -> Vec<usize> {
        rows.iter()
            .map(|r| nearest_centroid(r, &self.centroids).0)
            .collect()
    }
}

/// Squared Euclidean distance
pub fn squared_distance(a: &FeatureRow, b: &FeatureRow) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the nearest centroid and its squared distance; ties go to the
/// smallest index
pub fn nearest_centroid(row: &FeatureRow, centroids: &[FeatureRow]) -> (usize, f64) {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(row, c);
        if d < best_dist {
            best = i;
            best_dist = d;
        }
    }
    (best, best_dist)
}

fn mean_column_variance(data: &[FeatureRow]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let n = data.len() as f64;
    let mut total = 0.0;
    for j in 0..NUM_FEATURES {
        let mean = data.iter().map(|r| r[j]).sum::<f64>() / n;
        total += data.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n;
    }
    total / NUM_FEATURES as f64
}

/// Assign every row to its nearest centroid; returns the number of changed labels
fn assign(data: &[FeatureRow], centroids: &[FeatureRow], labels: &mut [usize]) -> usize {
    let mut changed = 0;
    for (row, label) in data.iter().zip(labels.iter_mut()) {
        let (nearest, _) = nearest_centroid(row, centroids);
        if nearest != *label {
            *label = nearest;
            changed += 1;
        }
    }
    changed
}

/// Recompute centroids as cluster means. Empty clusters take the points
/// farthest from their current centroid.
fn update(
    data: &[FeatureRow],
    labels: &mut [usize],
    centroids: &[FeatureRow],
) -> Vec<FeatureRow> {
    let k = centroids.len();
    let mut counts = vec![0usize; k];
    for &l in labels.iter() {
        counts[l] += 1;
    }

    let empty: Vec<usize> = (0..k).filter(|&c| counts[c] == 0).collect();
    if !empty.is_empty() {
        let mut by_distance: Vec<(usize, f64)> = data
            .iter()
            .zip(labels.iter())
            .map(|(row, &l)| squared_distance(row, &centroids[l]))
            .enumerate()
            .collect();
        by_distance.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut donors = by_distance.into_iter();
        for cluster in empty {
            for (point, _) in donors.by_ref() {
                let from = labels[point];
                if counts[from] > 1 {
                    counts[from] -= 1;
                    counts[cluster] += 1;
                    labels[point] = cluster;
                    break;
                }
            }
        }
    }

    let mut sums = vec![[0.0; NUM_FEATURES]; k];
    for (row, &l) in data.iter().zip(labels.iter()) {
        for j in 0..NUM_FEATURES {
            sums[l][j] += row[j];
        }
    }

    sums.into_iter()
        .enumerate()
        .map(|(c, mut sum)| {
            if counts[c] == 0 {
                return centroids[c];
            }
            for v in sum.iter_mut() {
                *v /= counts[c] as f64;
            }
            sum
        })
        .collect()
}

fn lloyd(data: &[FeatureRow], initial: Vec<FeatureRow>, max_iter: usize, tol_abs: f64) -> KMeansFit {
    let mut centroids = initial;
    let mut labels = vec![0usize; data.len()];
    let mut n_iter = 0;
    let mut converged = false;

    for iter in 0..max_iter {
        let changed = assign(data, &centroids, &mut labels);
        let updated = update(data, &mut labels, &centroids);
        let shift: f64 = centroids
            .iter()
            .zip(updated.iter())
            .map(|(a, b)| squared_distance(a, b))
            .sum();
        centroids = updated;
        n_iter = iter + 1;

        if (iter > 0 && changed == 0) || shift <= tol_abs {
            converged = true;
            break;
        }
    }

    assign(data, &centroids, &mut labels);
    let inertia = data
        .iter()
        .zip(labels.iter())
        .map(|(row, &l)| squared_distance(row, &centroids[l]))
        .sum();

    KMeansFit {
        centroids,
        labels,
        inertia,
        n_iter,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_groups() -> Vec<FeatureRow> {
        vec![
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.1, 0.0, 0.1, 0.0, 0.1, 0.0],
            [0.0, 0.1, 0.0, 0.1, 0.0, 0.1],
            [1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            [0.9, 1.0, 0.9, 1.0, 0.9, 1.0],
            [1.0, 0.9, 1.0, 0.9, 1.0, 0.9],
        ]
    }

    #[test]
    fn test_single_cluster_is_the_mean() {
        let data = two_groups();
        let fit = KMeansParams::new(1).fit(&data).unwrap();
        assert_eq!(fit.k(), 1);
        for j in 0..NUM_FEATURES {
            let mean = data.iter().map(|r| r[j]).sum::<f64>() / data.len() as f64;
            assert!((fit.centroids[0][j] - mean).abs() < 1e-12);
        }
        assert!(fit.labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_two_groups_separated() {
        let data = two_groups();
        let fit = KMeansParams::new(2).fit(&data).unwrap();
        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_eq!(fit.labels[0], fit.labels[2]);
        assert_eq!(fit.labels[3], fit.labels[4]);
        assert_ne!(fit.labels[0], fit.labels[3]);
        assert!(fit.inertia < 0.2);
        assert!(fit.converged);
    }

    #[test]
    fn test_k_equal_n_has_zero_inertia() {
        let data = two_groups();
        let fit = KMeansParams::new(data.len()).fit(&data).unwrap();
        assert!(fit.inertia.abs() < 1e-12);
    }

    #[test]
    fn test_seeded_fit_is_deterministic() {
        let data = two_groups();
        let a = KMeansParams::new(3).seed(7).fit(&data).unwrap();
        let b = KMeansParams::new(3).seed(7).fit(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_too_few_samples() {
        let data = two_groups();
        let err = KMeansParams::new(7).fit(&data).unwrap_err();
        assert!(matches!(err, PipelineError::TooFewSamples { samples: 6, clusters: 7 }));
    }

    #[test]
    fn test_duplicate_points_do_not_leave_empty_clusters_unfilled() {
        let mut data = vec![[0.5; NUM_FEATURES]; 4];
        data.push([1.0; NUM_FEATURES]);
        data.push([0.0; NUM_FEATURES]);
        let fit = KMeansParams::new(3).fit(&data).unwrap();
        assert!(fit.inertia.is_finite());
        assert!(fit.inertia < 1e-12);
    }

    #[test]
    fn test_nearest_centroid_tie_breaks_low() {
        let centroids = vec![[0.0; NUM_FEATURES], [1.0; NUM_FEATURES]];
        let (idx, dist) = nearest_centroid(&[0.5; NUM_FEATURES], &centroids);
        assert_eq!(idx, 0);
        assert!((dist - 1.5).abs() < 1e-12);
    }
}
