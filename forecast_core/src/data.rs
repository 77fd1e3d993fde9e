//! Raw event records and the keys series are grouped by

use crate::config::FieldNames;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// One document as returned by a record source
pub type Document = serde_json::Map<String, Value>;

/// Identity of one time series: (cohort id, sub-cohort id)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub cohort_id: i64,
    pub sub_cohort_id: String,
}

impl SeriesKey {
    pub fn new(cohort_id: i64, sub_cohort_id: impl Into<String>) -> Self {
        Self {
            cohort_id,
            sub_cohort_id: sub_cohort_id.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.cohort_id, self.sub_cohort_id)
    }
}

/// One observed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub cohort_id: i64,
    pub sub_cohort_id: String,
    /// Observation timestamp the series is indexed by
    pub date: DateTime<Utc>,
    /// When the record was loaded into the source
    pub loading_date: DateTime<Utc>,
    /// One value per tracked metric
    pub metrics: BTreeMap<String, f64>,
}

impl RawRecord {
    /// Key of the series this record belongs to
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.cohort_id, self.sub_cohort_id.clone())
    }

    /// Value of `metric`, if the record carries it
    pub fn metric(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied()
    }

    /// Build a record from a source document.
    ///
    /// `index` is the position of the document in its batch and is reported
    /// back in [`ForecastError::MalformedRecord`].
    pub fn from_document(
        index: usize,
        doc: &Document,
        fields: &FieldNames,
        metrics: &[String],
    ) -> Result<Self> {
        let malformed = |field: &str| ForecastError::MalformedRecord {
            index,
            field: field.to_string(),
        };

        let cohort_id = doc
            .get(&fields.cohort)
            .and_then(parse_integer)
            .ok_or_else(|| malformed(&fields.cohort))?;
        let sub_cohort_id = doc
            .get(&fields.sub_cohort)
            .and_then(parse_label)
            .ok_or_else(|| malformed(&fields.sub_cohort))?;
        let date = doc
            .get(&fields.timestamp)
            .and_then(parse_timestamp)
            .ok_or_else(|| malformed(&fields.timestamp))?;
        let loading_date = doc
            .get(&fields.record_timestamp)
            .and_then(parse_timestamp)
            .ok_or_else(|| malformed(&fields.record_timestamp))?;

        let mut values = BTreeMap::new();
        for metric in metrics {
            let value = doc
                .get(metric)
                .and_then(parse_number)
                .ok_or_else(|| malformed(metric))?;
            values.insert(metric.clone(), value);
        }

        Ok(Self {
            cohort_id,
            sub_cohort_id,
            date,
            loading_date,
            metrics: values,
        })
    }
}

/// Parse a whole batch, failing on the first malformed document
pub fn parse_records(
    docs: &[Document],
    fields: &FieldNames,
    metrics: &[String],
) -> Result<Vec<RawRecord>> {
    docs.iter()
        .enumerate()
        .map(|(index, doc)| RawRecord::from_document(index, doc, fields, metrics))
        .collect()
}

/// Read a timestamp from a JSON value.
///
/// Accepts RFC 3339 strings, naive `YYYY-MM-DDTHH:MM:SS[.f]` or
/// `YYYY-MM-DD HH:MM:SS[.f]` strings (taken as UTC) and epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}
