//! Loader stage: read the raw telemetry table

use crate::artifact::encode;
use crate::error::{PipelineError, Result};
use crate::models::Table;
use crate::observability::StructuredLogger;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Reads a CSV table from a fixed path
#[derive(Debug, Clone)]
pub struct Loader {
    path: PathBuf,
}

impl Loader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the table; any read or parse failure is fatal
    pub fn load(&self) -> Result<Table> {
        read_table(&self.path)
    }

    /// Stage entry point: the encoded table
    pub fn run(&self, logger: &StructuredLogger) -> Result<String> {
        let table = self.load()?;
        logger.log_table_loaded(&self.path, table.len(), &table.columns);
        encode(&table)
    }
}

/// Read a CSV file with a header row into a [`Table`]
pub fn read_table(path: &Path) -> Result<Table> {
    let file = File::open(path).map_err(|source| PipelineError::MissingInput {
        path: path.to_path_buf(),
        source,
    })?;
    let malformed = |source| PipelineError::MalformedCsv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
    let columns: Vec<String> = reader
        .headers()
        .map_err(malformed)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record.map_err(malformed)?;
        table.push_raw(record.iter());
    }

    if table.is_empty() {
        return Err(PipelineError::EmptyTable {
            path: path.to_path_buf(),
        });
    }
    Ok(table)
}
