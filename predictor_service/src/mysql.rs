//! MySQL prediction sink

use async_trait::async_trait;
use forecast_core::error::{ForecastError, Result};
use forecast_core::sink::{ColumnValue, PredictionSink, Row};
use forecast_core::SinkSchema;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use std::collections::BTreeMap;

/// MySQL accepts at most this many placeholders per statement
const MAX_BIND_PARAMS: usize = 65_535;
const MAX_ROWS_PER_STATEMENT: usize = 1_000;

/// Upserts rows with `INSERT ... ON DUPLICATE KEY UPDATE`
#[derive(Debug, Clone)]
pub struct MySqlSink {
    pool: MySqlPool,
}

impl MySqlSink {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await
            .map_err(sink_error)?;
        Ok(Self::new(pool))
    }
}

fn sink_error(err: sqlx::Error) -> ForecastError {
    ForecastError::Sink(err.to_string())
}

fn quote(identifier: &str) -> String {
    format!("`{}`", identifier)
}

/// Rows sharing the same column set, in first-seen column order
fn partition_by_columns(rows: &[Row]) -> BTreeMap<Vec<&str>, Vec<&Row>> {
    let mut batches: BTreeMap<Vec<&str>, Vec<&Row>> = BTreeMap::new();
    for row in rows {
        let columns = row.keys().map(String::as_str).collect();
        batches.entry(columns).or_default().push(row);
    }
    batches
}

fn rows_per_statement(columns: usize) -> usize {
    (MAX_BIND_PARAMS / columns.max(1)).clamp(1, MAX_ROWS_PER_STATEMENT)
}

/// One batched upsert of `rows`, which must all carry exactly `columns`.
///
/// Non-key columns are overwritten on a key collision; a row made only of
/// key columns rewrites its keys.
pub fn upsert_statement<'args>(
    schema: &SinkSchema,
    columns: &[&str],
    rows: &[&Row],
) -> QueryBuilder<'args, MySql> {
    let column_list = columns
        .iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut builder: QueryBuilder<MySql> = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        quote(schema.table()),
        column_list
    ));

    builder.push_values(rows.iter(), |mut b, row| {
        for column in columns {
            match row.get(*column).cloned() {
                Some(ColumnValue::Int(v)) => b.push_bind(v),
                Some(ColumnValue::Text(v)) => b.push_bind(v),
                Some(ColumnValue::Float(v)) => b.push_bind(v),
                Some(ColumnValue::Timestamp(v)) => b.push_bind(v.naive_utc()),
                None => b.push_bind(None::<f64>),
            };
        }
    });

    let mut updated: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|c| !schema.key_columns().iter().any(|k| k == c))
        .collect();
    if updated.is_empty() {
        updated = columns.to_vec();
    }

    let assignments = updated
        .iter()
        .map(|c| format!("{0} = VALUES({0})", quote(c)))
        .collect::<Vec<_>>()
        .join(", ");
    builder.push(format!(" ON DUPLICATE KEY UPDATE {}", assignments));

    builder
}

#[async_trait]
impl PredictionSink for MySqlSink {
    async fn upsert(&self, schema: &SinkSchema, rows: &[Row]) -> Result<u64> {
        schema.check_rows(rows)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(sink_error)?;
        let mut affected = 0;

        for (columns, batch) in partition_by_columns(rows) {
            for chunk in batch.chunks(rows_per_statement(columns.len())) {
                let mut builder = upsert_statement(schema, &columns, chunk);
                let result = builder
                    .build()
                    .execute(&mut *tx)
                    .await
                    .map_err(sink_error)?;
                affected += result.rows_affected();
            }
        }

        tx.commit().await.map_err(sink_error)?;

        tracing::debug!(
            table = schema.table(),
            rows = rows.len(),
            affected,
            "upserted prediction rows"
        );
        Ok(rows.len() as u64)
    }
}
