//! Stages of the prediction pipeline
//!
//! raw records → [`group_records`] → [`filter_groups`] → [`ForecastRunner`]
//! (trimming each training frame and predicting over a shared
//! [`FutureTimeline`]) → [`merge_forecasts`] → flat prediction records.

pub mod filter;
pub mod grouper;
pub mod merger;
pub mod runner;
pub mod timeline;

pub use filter::{filter_groups, DroppedGroup, FilterOutcome};
pub use grouper::{group_records, SeriesGroup};
pub use merger::{merge_forecasts, MetricForecast, PredictionRecord};
pub use runner::{ForecastMap, ForecastRunner, RunOutcome, UnitFailure};
pub use timeline::FutureTimeline;
