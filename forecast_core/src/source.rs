//! Historical record sources

use crate::config::FieldNames;
use crate::data::{parse_timestamp, Document};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Range query against a record source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    /// Index or collection name
    pub index: String,
    /// Inclusive lower bound on `time_field`
    pub from_date: DateTime<Utc>,
    /// Inclusive upper bound on `time_field`
    pub to_date: DateTime<Utc>,
    /// Field the range applies to
    pub time_field: String,
    /// Fields to return for every document
    pub fields: Vec<String>,
}

impl SourceQuery {
    pub fn new(
        index: impl Into<String>,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        fields: &FieldNames,
        metrics: &[String],
    ) -> Self {
        Self {
            index: index.into(),
            from_date,
            to_date,
            time_field: fields.record_timestamp.clone(),
            fields: fields.projection(metrics),
        }
    }

    /// Whether `doc` falls into the queried range
    pub fn matches(&self, doc: &Document) -> bool {
        doc.get(&self.time_field)
            .and_then(parse_timestamp)
            .map(|t| t >= self.from_date && t <= self.to_date)
            .unwrap_or(false)
    }

    /// Keep only the requested fields of `doc`
    pub fn project(&self, doc: &Document) -> Document {
        self.fields
            .iter()
            .filter_map(|field| doc.get(field).map(|v| (field.clone(), v.clone())))
            .collect()
    }
}

/// Append-only store of historical records
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch every document matching the query, in no particular order
    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Document>>;
}

/// In-memory source keyed by index name
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    indices: BTreeMap<String, Vec<Document>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(mut self, index: impl Into<String>, docs: Vec<Document>) -> Self {
        self.indices.entry(index.into()).or_default().extend(docs);
        self
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Document>> {
        Ok(self
            .indices
            .get(&query.index)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| query.matches(doc))
                    .map(|doc| query.project(doc))
                    .collect()
            })
            .unwrap_or_default())
    }
}
