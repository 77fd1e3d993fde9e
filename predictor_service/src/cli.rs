use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "predictor_service",
    version,
    about = "Predict grouped message metrics over a future horizon"
)]
pub struct Args {
    /// Index holding the training records
    #[arg(long)]
    pub index: String,
    /// Start of the training window
    #[arg(long, value_parser = parse_datetime)]
    pub from: DateTime<Utc>,
    /// End of the training window and start of the prediction horizon
    #[arg(long, value_parser = parse_datetime)]
    pub to: DateTime<Utc>,
    /// End of the prediction horizon
    #[arg(long, value_parser = parse_datetime)]
    pub predict_to: DateTime<Utc>,
    /// TOML file with predictor settings
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Print predictions as JSON instead of writing them
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
    /// Read training records from a CSV file instead of Elasticsearch
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    forecast_core::data::parse_timestamp(&serde_json::Value::String(raw.to_string()))
        .ok_or_else(|| format!("`{}` is not a date time like 2024-01-01T00:00:00", raw))
}
