//! Partition raw records into one group per series key

use crate::data::{RawRecord, SeriesKey};
use std::collections::BTreeMap;

/// Records sharing one (cohort id, sub-cohort id) pair
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesGroup {
    key: SeriesKey,
    records: Vec<RawRecord>,
}

impl SeriesGroup {
    fn new(key: SeriesKey) -> Self {
        Self {
            key,
            records: Vec::new(),
        }
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Group records by exact equality of their series key.
///
/// Every record lands in exactly one group; records keep their input order
/// within a group.
pub fn group_records(records: Vec<RawRecord>) -> BTreeMap<SeriesKey, SeriesGroup> {
    let mut groups: BTreeMap<SeriesKey, SeriesGroup> = BTreeMap::new();

    for record in records {
        let key = record.key();
        groups
            .entry(key)
            .or_insert_with_key(|key| SeriesGroup::new(key.clone()))
            .records
            .push(record);
    }

    groups
}
