//! CSV file source for offline runs

use async_trait::async_trait;
use forecast_core::error::{ForecastError, Result};
use forecast_core::{Document, RecordSource, SourceQuery};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Serves the rows of one CSV file, whatever index is asked for.
///
/// Every non-empty cell becomes a string field; the record parser accepts
/// numbers and timestamps written as text.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_documents(path: &Path, query: &SourceQuery) -> Result<Vec<Document>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ForecastError::Source(format!("Failed to open {}: {}", path.display(), e)))?;
    let headers = reader
        .headers()
        .map_err(|e| ForecastError::Source(format!("Failed to read CSV header: {}", e)))?
        .clone();

    let mut documents = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| {
            ForecastError::Source(format!("Failed to read CSV row {}: {}", line + 1, e))
        })?;

        let doc: Document = headers
            .iter()
            .zip(row.iter())
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(name, cell)| (name.to_string(), Value::String(cell.to_string())))
            .collect();

        if query.matches(&doc) {
            documents.push(query.project(&doc));
        }
    }

    Ok(documents)
}

#[async_trait]
impl RecordSource for CsvSource {
    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Document>> {
        tracing::debug!(path = %self.path.display(), index = %query.index, "reading CSV records");

        let path = self.path.clone();
        let query = query.clone();
        tokio::task::spawn_blocking(move || read_documents(&path, &query))
            .await
            .map_err(|e| ForecastError::Source(format!("CSV reader did not complete: {}", e)))?
    }
}
