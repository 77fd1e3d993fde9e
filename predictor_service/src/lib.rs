//! # Predictor Service
//!
//! Production wiring for `forecast_core`: an Elasticsearch scroll source, a
//! CSV source for offline runs, a MySQL upsert sink and the environment and
//! file configuration the `predictor_service` binary starts from.

pub mod cli;
pub mod config;
pub mod csv_source;
pub mod elastic;
pub mod mysql;

pub use crate::cli::Args;
pub use crate::config::{load_predictor_config, ServiceConfig};
pub use crate::csv_source::CsvSource;
pub use crate::elastic::ElasticSource;
pub use crate::mysql::MySqlSink;
