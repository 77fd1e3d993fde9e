//! Drop series with too little history to fit on

use crate::data::SeriesKey;
use crate::error::ForecastError;
use crate::pipeline::SeriesGroup;
use serde::Serialize;
use std::collections::BTreeMap;

/// A series the filter removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedGroup {
    pub key: SeriesKey,
    pub count: usize,
    pub minimum: usize,
}

impl DroppedGroup {
    /// The soft error this drop corresponds to
    pub fn to_error(&self) -> ForecastError {
        ForecastError::InsufficientGroupSize {
            key: self.key.clone(),
            count: self.count,
            minimum: self.minimum,
        }
    }
}

/// Groups that survived plus a record of the ones that did not
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub kept: BTreeMap<SeriesKey, SeriesGroup>,
    pub dropped: Vec<DroppedGroup>,
}

/// Keep the groups with at least `minimum_count` records
pub fn filter_groups(
    groups: BTreeMap<SeriesKey, SeriesGroup>,
    minimum_count: usize,
) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for (key, group) in groups {
        if group.len() >= minimum_count {
            outcome.kept.insert(key, group);
            continue;
        }

        let dropped = DroppedGroup {
            key,
            count: group.len(),
            minimum: minimum_count,
        };
        tracing::info!(
            cohort_id = dropped.key.cohort_id,
            sub_cohort_id = %dropped.key.sub_cohort_id,
            count = dropped.count,
            reason = %dropped.to_error(),
            "not enough records for series, skipping"
        );
        outcome.dropped.push(dropped);
    }

    outcome
}
