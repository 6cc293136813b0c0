//! Metadata aggregation utilities.
//!
//! A pattern's `metadata_accumulator` is a per-key set-union of every
//! metadata map observed across the events that contributed to the pattern
//! (§3, §4.5). [`MetadataAccumulator`] implements that merge; it is used by
//! both `LearningEngine` (building the initial union) and `PredictionScorer`
//! (aggregating for display).

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Per-key set-union accumulator over metadata maps.
///
/// Values are compared by their canonical JSON string representation so
/// that structurally equal values (independent of key insertion order)
/// collapse to one entry.
#[derive(Debug, Clone, Default)]
pub struct MetadataAccumulator {
    values: BTreeMap<String, BTreeSet<String>>,
}

impl MetadataAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a single observation's metadata map into the accumulator.
    pub fn merge(&mut self, metadata: &BTreeMap<String, Value>) {
        for (key, value) in metadata {
            self.values
                .entry(key.clone())
                .or_default()
                .insert(canonical_json(value));
        }
    }

    /// Merge every map in a sequence, in order.
    pub fn merge_all<'a, I>(&mut self, maps: I)
    where
        I: IntoIterator<Item = &'a BTreeMap<String, Value>>,
    {
        for map in maps {
            self.merge(map);
        }
    }

    /// Union this accumulator with another, consuming both.
    pub fn union(mut self, other: MetadataAccumulator) -> Self {
        for (key, values) in other.values {
            self.values.entry(key).or_default().extend(values);
        }
        self
    }

    /// Materialize as `key -> sorted distinct JSON-value strings`, the shape
    /// stored on [`crate::types::Pattern::metadata_accumulator`].
    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.values
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn canonical_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
