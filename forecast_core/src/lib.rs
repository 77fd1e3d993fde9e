//! # Forecast Core
//!
//! Batch prediction of per-series metrics (e.g. message view counts) with
//! uncertainty bounds.
//!
//! ## Pipeline
//!
//! - Raw records are parsed from source documents and grouped by
//!   (cohort id, sub-cohort id)
//! - Series with fewer than `minimum_records` records are dropped
//! - For every surviving series and metric, the upper quantile tail of the
//!   training values is cut and a model is fitted
//! - Every fitted model predicts the same evenly spaced future timeline
//! - Per-metric predictions are merged into one flat record per series and
//!   timestamp
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forecast_core::models::LinearTrend;
//! use forecast_core::source::MemorySource;
//! use forecast_core::{Predictor, PredictorConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> forecast_core::Result<()> {
//! let config = PredictorConfig::default();
//! let model = LinearTrend::new(config.interval_width)?.with_daily_seasonality(true);
//! let predictor = Predictor::new(MemorySource::new(), model, config)?;
//!
//! let from = "2024-01-01T00:00:00Z".parse().unwrap();
//! let to = "2024-01-02T00:00:00Z".parse().unwrap();
//! let until = "2024-01-02T01:00:00Z".parse().unwrap();
//!
//! let report = predictor
//!     .run("telegram-messages", from, to, until, &CancellationToken::new())
//!     .await?;
//! println!("{} prediction records", report.records.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod frame;
pub mod models;
pub mod pipeline;
pub mod predictor;
pub mod sink;
pub mod source;

// Re-export commonly used types
pub use crate::config::{FieldNames, PartialMetricPolicy, PredictorConfig};
pub use crate::data::{Document, RawRecord, SeriesKey};
pub use crate::error::{ForecastError, Result};
pub use crate::frame::TrainingFrame;
pub use crate::models::{FittedModel, ForecastModel, ForecastPoint};
pub use crate::pipeline::{FutureTimeline, PredictionRecord};
pub use crate::predictor::{PredictionReport, Predictor};
pub use crate::sink::{PredictionSink, SinkSchema};
pub use crate::source::{RecordSource, SourceQuery};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
