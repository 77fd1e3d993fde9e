//! Prediction stores and the schema rows are checked against

use crate::config::FieldNames;
use crate::error::{ForecastError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;

/// One cell of an emitted row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Int(i64),
    Text(String),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

/// Flat column → value mapping handed to a sink
pub type Row = BTreeMap<String, ColumnValue>;

/// Pre-declared description of the destination table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSchema {
    table: String,
    columns: Vec<String>,
    key_columns: Vec<String>,
}

impl SinkSchema {
    /// Declare a table; validated once here rather than on every write
    pub fn new(
        table: impl Into<String>,
        columns: Vec<String>,
        key_columns: Vec<String>,
    ) -> Result<Self> {
        let table = table.into();
        for name in std::iter::once(&table).chain(&columns) {
            if !is_identifier(name) {
                return Err(ForecastError::InvalidParameter(format!(
                    "`{}` is not a valid table or column name",
                    name
                )));
            }
        }
        if columns.is_empty() {
            return Err(ForecastError::InvalidParameter(format!(
                "Table `{}` declares no columns",
                table
            )));
        }
        if key_columns.is_empty() {
            return Err(ForecastError::InvalidParameter(format!(
                "Table `{}` declares no key columns",
                table
            )));
        }
        if let Some(missing) = key_columns.iter().find(|k| !columns.contains(*k)) {
            return Err(ForecastError::InvalidParameter(format!(
                "Key column `{}` is not a column of `{}`",
                missing, table
            )));
        }

        Ok(Self {
            table,
            columns,
            key_columns,
        })
    }

    /// Schema of the prediction table for the given key fields and metrics
    pub fn for_predictions(
        table: impl Into<String>,
        fields: &FieldNames,
        metrics: &[String],
    ) -> Result<Self> {
        let key_columns = vec![
            fields.cohort.clone(),
            fields.sub_cohort.clone(),
            fields.timestamp.clone(),
        ];
        let mut columns = key_columns.clone();
        for metric in metrics {
            columns.push(metric.clone());
            columns.push(format!("{}_lower", metric));
            columns.push(format!("{}_upper", metric));
        }
        Self::new(table, columns, key_columns)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Fail on the first column a row carries that the table does not have,
    /// or on a row that lacks a key column.
    pub fn check_rows(&self, rows: &[Row]) -> Result<()> {
        let mut seen: BTreeSet<Vec<&String>> = BTreeSet::new();

        for row in rows {
            let columns: Vec<&String> = row.keys().collect();
            if !seen.insert(columns.clone()) {
                continue;
            }

            if let Some(column) = columns.iter().copied().find(|c| !self.columns.contains(*c)) {
                return Err(ForecastError::SchemaMismatch {
                    table: self.table.clone(),
                    column: column.to_string(),
                });
            }
            if let Some(key) = self.key_columns.iter().find(|k| !row.contains_key(*k)) {
                return Err(ForecastError::ValidationError(format!(
                    "Row for `{}` lacks key column `{}`",
                    self.table, key
                )));
            }
        }

        Ok(())
    }

    /// Key values of a row, in key column order
    pub fn key_of<'a>(&self, row: &'a Row) -> Vec<Option<&'a ColumnValue>> {
        self.key_columns.iter().map(|k| row.get(k)).collect()
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Upsert-capable store for prediction rows
#[async_trait]
pub trait PredictionSink: Send + Sync {
    /// Insert rows, overwriting the non-key columns of rows whose key exists.
    /// Rows have already passed [`SinkSchema::check_rows`].
    async fn upsert(&self, schema: &SinkSchema, rows: &[Row]) -> Result<u64>;
}

/// In-memory sink with keyed upsert, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<BTreeMap<String, Vec<Row>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the rows stored in `table`
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PredictionSink for MemorySink {
    async fn upsert(&self, schema: &SinkSchema, rows: &[Row]) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let stored = tables.entry(schema.table().to_string()).or_default();

        for row in rows {
            let key = schema.key_of(row);
            match stored.iter_mut().find(|existing| schema.key_of(existing) == key) {
                Some(existing) => {
                    for (column, value) in row {
                        existing.insert(column.clone(), value.clone());
                    }
                }
                None => stored.push(row.clone()),
            }
        }

        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schema() -> SinkSchema {
        SinkSchema::for_predictions(
            "telegram_predictions",
            &FieldNames::default(),
            &["views".to_string()],
        )
        .unwrap()
    }

    fn row(cohort: i64, views: f64) -> Row {
        Row::from([
            ("chat_id".to_string(), ColumnValue::Int(cohort)),
            ("delta".to_string(), ColumnValue::Text("0-5m".to_string())),
            (
                "date".to_string(),
                ColumnValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()),
            ),
            ("views".to_string(), ColumnValue::Float(views)),
        ])
    }

    #[test]
    fn test_schema_declaration_is_validated() {
        assert!(SinkSchema::new("t", vec![], vec![]).is_err());
        assert!(SinkSchema::new("t; drop", vec!["a".into()], vec!["a".into()]).is_err());
        assert!(SinkSchema::new("t", vec!["a".into()], vec!["b".into()]).is_err());
        assert_eq!(schema().columns().len(), 6);
        assert_eq!(schema().key_columns(), &["chat_id", "delta", "date"]);
    }

    #[test]
    fn test_foreign_column_is_rejected() {
        let mut bad = row(1, 1.0);
        bad.insert("shares".to_string(), ColumnValue::Float(0.0));

        assert!(schema().check_rows(&[row(1, 1.0)]).is_ok());
        assert!(matches!(
            schema().check_rows(&[row(1, 1.0), bad]),
            Err(ForecastError::SchemaMismatch { column, .. }) if column == "shares"
        ));
    }

    #[test]
    fn test_missing_key_column_is_rejected() {
        let mut keyless = row(1, 1.0);
        keyless.remove("delta");
        assert!(matches!(
            schema().check_rows(&[keyless]),
            Err(ForecastError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_sink_upserts_by_key() {
        let sink = MemorySink::new();
        let schema = schema();

        sink.upsert(&schema, &[row(1, 1.0), row(2, 2.0)]).await.unwrap();
        sink.upsert(&schema, &[row(1, 10.0)]).await.unwrap();

        let rows = sink.rows("telegram_predictions").await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["views"], ColumnValue::Float(10.0));
        assert_eq!(rows[1]["views"], ColumnValue::Float(2.0));
    }
}
