//! # Metric Predictor
//!
//! Umbrella crate for the metric prediction workspace.
//!
//! - [`series_math`]: quantiles, least squares fits and prediction intervals
//! - [`forecast_core`]: grouping, filtering, trimming, forecasting and merging
//! - [`predictor_service`]: Elasticsearch, CSV and MySQL wiring plus the CLI
//!
//! ## Example
//!
//! ```
//! use metric_predictor::forecast_core::PredictorConfig;
//!
//! let config = PredictorConfig::default();
//! assert_eq!(config.metrics, vec!["views"]);
//! assert!(config.validate().is_ok());
//! ```

pub use forecast_core;
pub use predictor_service;
pub use series_math;

pub use forecast_core::{ForecastError, Predictor, PredictorConfig, Result};
