//! Preprocessor stage: filter, project, and scale
//!
//! Rows with a missing value in any feature column are dropped, the table is
//! projected onto the canonical feature order, and each column is min-max
//! scaled over the surviving rows.

use crate::artifact::{decode, encode};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureRow, FEATURES, NUM_FEATURES};
use crate::models::{MinMaxScaler, ScaledMatrix, Table};
use crate::observability::StructuredLogger;
use tracing::debug;

/// Minimum rows required for clustering
pub const MIN_ROWS: usize = 2;

/// Turns a raw table into a scaled feature matrix
#[derive(Debug, Clone, Default)]
pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, table: &Table) -> Result<ScaledMatrix> {
        let columns = feature_columns(table)?;

        let mut rows = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            if let Some(values) = parse_row(table, row, &columns)? {
                rows.push(values);
            }
        }
        if rows.len() < MIN_ROWS {
            return Err(PipelineError::TooFewRows { rows: rows.len() });
        }

        let scaler = MinMaxScaler::fit(&rows).ok_or(PipelineError::TooFewRows { rows: 0 })?;
        if let Some(&j) = scaler.constant_columns().first() {
            return Err(PipelineError::ZeroVariance {
                column: FEATURES[j].to_string(),
                value: scaler.min[j],
            });
        }

        debug!(
            min = ?scaler.min,
            range = ?scaler.range,
            "Feature ranges before scaling"
        );

        Ok(ScaledMatrix {
            rows: scaler.transform(&rows),
            scaler,
        })
    }

    /// Stage entry point: encoded table in, encoded matrix out
    pub fn run(&self, encoded_table: &str, logger: &StructuredLogger) -> Result<String> {
        let table: Table = decode(encoded_table)?;
        let matrix = self.process(&table)?;
        logger.log_preprocessed(table.len(), matrix.len());
        encode(&matrix)
    }
}

/// Column index of every canonical feature, in canonical order
pub(crate) fn feature_columns(table: &Table) -> Result<[usize; NUM_FEATURES]> {
    let mut columns = [0usize; NUM_FEATURES];
    for (slot, name) in columns.iter_mut().zip(FEATURES.iter()) {
        *slot = table
            .column_index(name)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: name.to_string(),
                available: table.columns.clone(),
            })?;
    }
    Ok(columns)
}

/// Parse one row's features; `None` when any feature is missing
pub(crate) fn parse_row(
    table: &Table,
    row: usize,
    columns: &[usize; NUM_FEATURES],
) -> Result<Option<FeatureRow>> {
    let cells = &table.rows[row];
    let mut texts = [""; NUM_FEATURES];
    for (slot, &col) in texts.iter_mut().zip(columns.iter()) {
        match cells.get(col).and_then(|c| c.as_deref()) {
            Some(text) => *slot = text,
            None => return Ok(None),
        }
    }

    let mut values = [0.0; NUM_FEATURES];
    for (j, text) in texts.iter().enumerate() {
        values[j] = text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| PipelineError::NonNumeric {
                column: FEATURES[j].to_string(),
                row,
                value: text.to_string(),
            })?;
    }
    Ok(Some(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn table_with(rows: &[[&str; 7]]) -> Table {
        let mut columns = vec!["host".to_string()];
        columns.extend(FEATURES.iter().map(|f| f.to_string()));
        let mut table = Table::new(columns);
        for row in rows {
            table.push_raw(row.iter());
        }
        table
    }

    #[test]
    fn test_drops_incomplete_rows_and_scales() {
        let table = table_with(&[
            ["a", "90", "30", "10", "5", "400", "2"],
            ["b", "10", "", "10", "5", "400", "2"],
            ["c", "50", "80", "60", "45", "1800", "95"],
            ["d", "20", "20", "0", "1", "60", "0"],
        ]);
        let matrix = Preprocessor::new().process(&table).unwrap();
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix.rows[0][0], 1.0);
        assert_eq!(matrix.rows[2][0], 0.0);
        assert_eq!(matrix.rows[1][5], 1.0);
        assert_eq!(matrix.rows[2][5], 0.0);
    }

    #[test]
    fn test_projection_follows_canonical_order() {
        let mut table = Table::new(
            FEATURES.iter().rev().map(|f| f.to_string()).collect(),
        );
        table.push_raw(["0", "0", "0", "0", "0", "0"]);
        table.push_raw(["6", "5", "4", "3", "2", "1"]);
        let matrix = Preprocessor::new().process(&table).unwrap();
        assert_eq!(matrix.scaler.range, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let mut table = Table::new(FEATURES[..5].iter().map(|f| f.to_string()).collect());
        table.push_raw(["1", "2", "3", "4", "5"]);
        let err = Preprocessor::new().process(&table).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputMalformed);
        assert!(err.to_string().contains("gpu_util_percent"));
    }

    #[test]
    fn test_non_numeric_is_fatal() {
        let table = table_with(&[
            ["a", "90", "high", "10", "5", "400", "2"],
            ["b", "10", "20", "10", "5", "400", "3"],
        ]);
        let err = Preprocessor::new().process(&table).unwrap_err();
        assert!(matches!(err, PipelineError::NonNumeric { row: 0, .. }));
    }

    #[test]
    fn test_incomplete_row_dropped_before_parsing() {
        let table = table_with(&[
            ["a", "90", "high", "", "5", "400", "2"],
            ["b", "10", "20", "10", "5", "400", "3"],
            ["c", "50", "80", "60", "45", "1800", "95"],
        ]);
        let matrix = Preprocessor::new().process(&table).unwrap();
        assert_eq!(matrix.len(), 2);
    }

    #[test]
    fn test_single_surviving_row_is_degenerate() {
        let table = table_with(&[
            ["a", "90", "30", "10", "5", "400", "2"],
            ["b", "10", "NaN", "10", "5", "400", "2"],
        ]);
        let err = Preprocessor::new().process(&table).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateData);
    }

    #[test]
    fn test_constant_column_is_degenerate() {
        let table = table_with(&[
            ["a", "90", "30", "10", "5", "400", "7"],
            ["b", "10", "20", "15", "6", "300", "7"],
        ]);
        let err = Preprocessor::new().process(&table).unwrap_err();
        assert!(matches!(err, PipelineError::ZeroVariance { ref column, .. } if column == "gpu_util_percent"));
    }
}
