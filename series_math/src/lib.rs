//! # Series Math
//!
//! Numeric building blocks for metric series forecasting.
//! This crate provides the quantile, regression and interval calculations
//! the forecasting pipeline is assembled from.

use thiserror::Error;

pub mod intervals;
pub mod quantile;
pub mod regression;

pub use intervals::{normal_quantile, residual_std_dev, PredictionInterval};
pub use quantile::quantile;
pub use regression::LinearFit;

/// Errors that can occur in series calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for series math operations
pub type Result<T> = std::result::Result<T, MathError>;
