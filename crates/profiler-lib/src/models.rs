//! Core data models shared by the pipeline stages

use crate::features::{FeatureRow, NUM_FEATURES};
use serde::{Deserialize, Serialize};

/// Cell markers treated as missing values when a CSV is loaded
pub const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Raw telemetry table as read from CSV
///
/// Cells are kept as text so that non-feature columns survive the Loader
/// untouched; `None` marks a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Push a row of raw cells, mapping missing markers to `None`
    pub fn push_raw<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let row = cells
            .into_iter()
            .map(|c| {
                let trimmed = c.as_ref().trim();
                if MISSING_MARKERS.contains(&trimmed) {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect();
        self.rows.push(row);
    }
}

/// Dense N x 6 matrix of features scaled into the unit interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledMatrix {
    pub rows: Vec<FeatureRow>,
    /// Scaler fitted on the rows before scaling
    pub scaler: MinMaxScaler,
}

impl ScaledMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Per-column min-max normalization parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: FeatureRow,
    pub range: FeatureRow,
}

impl MinMaxScaler {
    /// Fit on the given rows; returns `None` for an empty slice
    pub fn fit(rows: &[FeatureRow]) -> Option<Self> {
        let first = rows.first()?;
        let mut min = *first;
        let mut max = *first;
        for row in rows.iter().skip(1) {
            for j in 0..NUM_FEATURES {
                min[j] = min[j].min(row[j]);
                max[j] = max[j].max(row[j]);
            }
        }
        let mut range = [0.0; NUM_FEATURES];
        for j in 0..NUM_FEATURES {
            range[j] = max[j] - min[j];
        }
        Some(Self { min, range })
    }

    /// Indices of columns whose observed range is zero
    pub fn constant_columns(&self) -> Vec<usize> {
        (0..NUM_FEATURES).filter(|&j| self.range[j] == 0.0).collect()
    }

    /// Map a row into the unit cube; constant columns map to 0
    pub fn transform_row(&self, row: &FeatureRow) -> FeatureRow {
        let mut out = [0.0; NUM_FEATURES];
        for j in 0..NUM_FEATURES {
            if self.range[j] != 0.0 {
                out[j] = (row[j] - self.min[j]) / self.range[j];
            }
        }
        out
    }

    pub fn transform(&self, rows: &[FeatureRow]) -> Vec<FeatureRow> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}

/// Sum of squared errors per candidate K, starting at K = 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SseCurve(pub Vec<f64>);

impl SseCurve {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// SSE for a given K (1-based)
    pub fn at(&self, k: usize) -> Option<f64> {
        k.checked_sub(1).and_then(|i| self.0.get(i).copied())
    }

    /// K values where `sse[K] > sse[K-1] * (1 + relative_tolerance)`
    pub fn monotonicity_violations(&self, relative_tolerance: f64) -> Vec<usize> {
        self.0
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[1] > w[0] + w[0].abs() * relative_tolerance)
            .map(|(i, _)| i + 2)
            .collect()
    }
}

/// Human-readable label for a cluster index
pub fn profile_label(cluster: usize) -> String {
    match cluster {
        0 => "Profile-A".to_string(),
        1 => "Profile-B".to_string(),
        2 => "Profile-C".to_string(),
        3 => "Profile-D".to_string(),
        other => format!("Cluster-{}", other),
    }
}

/// Cluster assignment of a single test workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Zero-based row index in the test table
    pub row: usize,
    pub cluster: usize,
    pub label: String,
    /// Squared distance to the assigned centroid in scaled space
    pub distance_sq: f64,
}
