//! Elbow selection on a convex, decreasing SSE curve
//!
//! Implements the offline Kneedle detector: normalize both axes to the unit
//! interval, flip the curve so the elbow becomes a knee of an increasing
//! concave curve, and take the first local maximum of the difference curve
//! after which the curve drops below that maximum's threshold.

use serde::{Deserialize, Serialize};

/// Default Kneedle sensitivity
pub const DEFAULT_SENSITIVITY: f64 = 1.0;

/// Difference-curve values this close to zero are treated as zero so that
/// rounding noise on a straight line does not produce a knee
const FLAT_EPSILON: f64 = 1e-12;

/// Outcome of elbow selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Elbow {
    /// The knee was found at this K
    Found { k: usize },
    /// No knee could be identified
    Undefined { reason: String },
}

impl Elbow {
    pub fn k(&self) -> Option<usize> {
        match self {
            Elbow::Found { k } => Some(*k),
            Elbow::Undefined { .. } => None,
        }
    }
}

/// Kneedle detector for decreasing convex curves
#[derive(Debug, Clone, Copy)]
pub struct ElbowSelector {
    sensitivity: f64,
}

impl Default for ElbowSelector {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVITY)
    }
}

impl ElbowSelector {
    pub fn new(sensitivity: f64) -> Self {
        Self { sensitivity }
    }

    /// Locate the elbow of `sse`, where `sse[i]` is the SSE at K = i + 1
    pub fn select(&self, sse: &[f64]) -> Elbow {
        let n = sse.len();
        if n < 3 {
            return undefined(format!("{} points are too few to locate a knee", n));
        }
        if sse.iter().any(|v| !v.is_finite()) {
            return undefined("curve contains non-finite values".to_string());
        }

        let y_max = sse.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let y_min = sse.iter().copied().fold(f64::INFINITY, f64::min);
        let y_range = y_max - y_min;
        if y_range == 0.0 {
            return undefined("curve is flat".to_string());
        }

        let x_norm: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
        let y_norm: Vec<f64> = sse.iter().map(|y| (y - y_min) / y_range).collect();
        let y_norm_max = y_norm.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let difference: Vec<f64> = y_norm
            .iter()
            .zip(x_norm.iter())
            .map(|(y, x)| {
                let d = (y_norm_max - y) - x;
                if d.abs() < FLAT_EPSILON {
                    0.0
                } else {
                    d
                }
            })
            .collect();

        let maxima = local_extrema(&difference, |a, b| a >= b);
        let minima = local_extrema(&difference, |a, b| a <= b);
        let Some(&first_max) = maxima.first() else {
            return undefined("difference curve has no local maximum".to_string());
        };

        let step = x_norm.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / (n - 1) as f64;
        let thresholds: Vec<f64> = maxima
            .iter()
            .map(|&i| difference[i] - self.sensitivity * step.abs())
            .collect();

        let mut max_seen = 0;
        let mut threshold = 0.0;
        let mut threshold_index = first_max;

        for i in first_max..n - 1 {
            if maxima.contains(&i) {
                threshold = thresholds[max_seen];
                threshold_index = i;
                max_seen += 1;
            }
            if minima.contains(&i) {
                threshold = 0.0;
            }
            if difference[i + 1] < threshold {
                return Elbow::Found {
                    k: threshold_index + 1,
                };
            }
        }

        undefined("curve never falls below the knee threshold".to_string())
    }
}

fn undefined(reason: String) -> Elbow {
    Elbow::Undefined { reason }
}

/// Indices whose value satisfies `cmp` against both neighbours, with the
/// ends compared against themselves
fn local_extrema(values: &[f64], cmp: impl Fn(f64, f64) -> bool) -> Vec<usize> {
    let n = values.len();
    (0..n)
        .filter(|&i| {
            let left = values[i.saturating_sub(1)];
            let right = values[(i + 1).min(n - 1)];
            cmp(values[i], left) && cmp(values[i], right)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharp_knee() {
        let sse = [1000.0, 600.0, 300.0, 50.0, 45.0, 40.0, 35.0, 30.0, 25.0, 20.0];
        assert_eq!(ElbowSelector::default().select(&sse), Elbow::Found { k: 4 });
    }

    #[test]
    fn test_knee_at_two() {
        let sse = [100.0, 10.0, 9.0, 8.0, 7.0, 6.0];
        assert_eq!(ElbowSelector::default().select(&sse).k(), Some(2));
    }

    #[test]
    fn test_straight_line_is_undefined() {
        let sse: Vec<f64> = (1..=20).map(|k| 21.0 - k as f64).collect();
        let elbow = ElbowSelector::default().select(&sse);
        assert!(matches!(elbow, Elbow::Undefined { .. }), "{:?}", elbow);
    }

    #[test]
    fn test_scaled_straight_line_is_undefined() {
        let sse: Vec<f64> = (0..20).map(|k| 37.3 - 1.7 * k as f64).collect();
        assert_eq!(ElbowSelector::default().select(&sse).k(), None);
    }

    #[test]
    fn test_single_point_is_undefined() {
        assert_eq!(ElbowSelector::default().select(&[12.5]).k(), None);
        assert_eq!(ElbowSelector::default().select(&[]).k(), None);
    }

    #[test]
    fn test_flat_curve_is_undefined() {
        assert_eq!(ElbowSelector::default().select(&[3.0, 3.0, 3.0, 3.0]).k(), None);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let sse = [500.0, 220.0, 90.0, 60.0, 52.0, 47.0, 44.0, 42.0];
        let selector = ElbowSelector::default();
        assert_eq!(selector.select(&sse), selector.select(&sse));
    }

    #[test]
    fn test_local_extrema_clip_at_edges() {
        let values = [0.0, 0.3, 0.6, 0.5, 0.0];
        assert_eq!(local_extrema(&values, |a, b| a >= b), vec![2]);
        assert_eq!(local_extrema(&values, |a, b| a <= b), vec![0, 4]);
    }
}
