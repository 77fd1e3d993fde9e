//! Service configuration from the environment and an optional TOML file

use anyhow::{Context, Result};
use dotenvy::dotenv;
use forecast_core::PredictorConfig;
use std::env;
use std::path::Path;
use std::time::Duration;

const DEFAULT_PREDICTIONS_TABLE: &str = "telegram_predictions";
const DEFAULT_ELASTICSEARCH_TIMEOUT_SECS: u64 = 3600;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub elasticsearch_url: Option<String>,
    pub elasticsearch_api_key: Option<String>,
    pub elasticsearch_timeout: Duration,
    pub database_url: Option<String>,
    pub predictions_table: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let elasticsearch_timeout = match value("ELASTICSEARCH_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("ELASTICSEARCH_TIMEOUT_SECS `{}` is not a number", raw))?,
            None => DEFAULT_ELASTICSEARCH_TIMEOUT_SECS,
        };

        Ok(Self {
            elasticsearch_url: value("ELASTICSEARCH_URL"),
            elasticsearch_api_key: value("ELASTICSEARCH_API_KEY"),
            elasticsearch_timeout: Duration::from_secs(elasticsearch_timeout),
            database_url: value("DATABASE_URL"),
            predictions_table: value("PREDICTIONS_TABLE")
                .unwrap_or_else(|| DEFAULT_PREDICTIONS_TABLE.to_string()),
        })
    }

    pub fn require_elasticsearch_url(&self) -> Result<&str> {
        self.elasticsearch_url
            .as_deref()
            .context("ELASTICSEARCH_URL is required unless --csv is given")
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL is required unless --dry-run is given")
    }
}

/// Read predictor settings from `path`, or use the defaults
pub fn load_predictor_config(path: Option<&Path>) -> Result<PredictorConfig> {
    let config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<PredictorConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => PredictorConfig::default(),
    };

    config.validate().context("invalid predictor configuration")?;
    Ok(config)
}
