//! Core data model (§3): observations, events, patterns, session state, and
//! predictions.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// A single flattened symbol inside an event, e.g. `"apple"` or
/// `"VCTR|<hex>"`.
pub type Symbol = String;

/// A deterministic flattening of one accepted observation (§3): vector
/// symbols first in arrival order, then string tokens sorted ascending.
pub type Event = Vec<Symbol>;

/// Byte separating symbols within a single event's canonical serialization.
pub const SYMBOL_SEPARATOR: u8 = 0x1f;

/// Byte separating events within a pattern's canonical serialization.
pub const EVENT_SEPARATOR: u8 = 0x1e;

/// Prefix applied to the hex digest of a novel vector's bytes.
pub const VECTOR_SYMBOL_PREFIX: &str = "VCTR|";

/// Prefix applied to a pattern identity in wire responses (§6).
pub const PATTERN_WIRE_PREFIX: &str = "PTRN|";

/// An immutable client-supplied observation (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    #[serde(default)]
    pub strings: Vec<String>,
    #[serde(default)]
    pub vectors: Vec<Vec<f32>>,
    #[serde(default)]
    pub emotives: BTreeMap<String, f64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub unique_id: Option<String>,
}

impl Observation {
    /// An observation with no strings and no vectors carries no event;
    /// emotives/metadata alone never produce one (§3).
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.vectors.is_empty()
    }
}

/// Canonical little-endian IEEE-754 byte encoding of a vector, used both to
/// name novel vector symbols and as the vector backend's stored payload key.
pub fn canonical_vector_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for component in vector {
        bytes.extend_from_slice(&component.to_le_bytes());
    }
    bytes
}

/// Compute `"VCTR|" + HEX(SHA1(canonical_bytes(vector)))`.
pub fn vector_symbol(vector: &[f32]) -> Symbol {
    let mut hasher = Sha1::new();
    hasher.update(canonical_vector_bytes(vector));
    format!("{VECTOR_SYMBOL_PREFIX}{:x}", hasher.finalize())
}

/// Canonical serialization of a pattern's events (§3): each event is its
/// sorted symbols joined by [`SYMBOL_SEPARATOR`], and events are joined by
/// [`EVENT_SEPARATOR`].
pub fn canonical_serialization(events: &[Event]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (i, event) in events.iter().enumerate() {
        if i > 0 {
            buf.push(EVENT_SEPARATOR);
        }
        for (j, symbol) in event.iter().enumerate() {
            if j > 0 {
                buf.push(SYMBOL_SEPARATOR);
            }
            buf.extend_from_slice(symbol.as_bytes());
        }
    }
    buf
}

/// A deterministic hex-digest pattern identity: `HEX(SHA1(canonical_serialization(events)))`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternIdentity(String);

impl PatternIdentity {
    /// Compute the identity of an event sequence (§3).
    pub fn from_events(events: &[Event]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(canonical_serialization(events));
        Self(format!("{:x}", hasher.finalize()))
    }

    /// The bare 40-hex digest, as used in internal storage keys.
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// The `"PTRN|" + 40-hex` wire representation (§6).
    pub fn to_wire(&self) -> String {
        format!("{PATTERN_WIRE_PREFIX}{}", self.0)
    }

    /// Parse a wire-format or bare-hex identity back into a [`PatternIdentity`].
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix(PATTERN_WIRE_PREFIX) {
            Some(hex) => Self(hex.to_string()),
            None => Self(s.to_string()),
        }
    }
}

impl fmt::Display for PatternIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Arithmetic mean, per key, across a sequence of raw emotive maps. Used by
/// `LearningEngine` to collapse a STM window's per-event emotive snapshots
/// into the single map pushed onto a pattern's `emotive_profile` (§4.7).
pub fn mean_per_key(maps: &[BTreeMap<String, f64>]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for map in maps {
        for (key, value) in map {
            *sums.entry(key.clone()).or_insert(0.0) += value;
            *counts.entry(key.clone()).or_insert(0) += 1;
        }
    }
    sums.into_iter()
        .map(|(key, sum)| {
            let count = counts[&key] as f64;
            (key, sum / count)
        })
        .collect()
}

/// A learned, durable sequence of events (§3).
///
/// Immutable once written except for `frequency`, `emotive_profile`, and
/// `metadata_accumulator`, which merge on re-learn (`PatternStore::upsert`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pattern {
    pub identity: PatternIdentity,
    pub events: Vec<Event>,
    pub length: usize,
    pub frequency: u64,
    /// Bounded rolling window of per-learn emotive maps, length ≤ `persistence`.
    pub emotive_profile: VecDeque<BTreeMap<String, f64>>,
    /// Per-key set-union of metadata values observed during learning.
    pub metadata_accumulator: BTreeMap<String, Vec<String>>,
    /// Logical partition (§6).
    pub kb_id: String,
}

impl Pattern {
    /// Construct a freshly learned pattern with `frequency = 1` (§4.7).
    pub fn new(
        events: Vec<Event>,
        emotives: BTreeMap<String, f64>,
        metadata: BTreeMap<String, Vec<String>>,
        kb_id: impl Into<String>,
    ) -> Self {
        let identity = PatternIdentity::from_events(&events);
        let length = events.len();
        let mut emotive_profile = VecDeque::new();
        emotive_profile.push_back(emotives);
        Self {
            identity,
            events,
            length,
            frequency: 1,
            emotive_profile,
            metadata_accumulator: metadata,
            kb_id: kb_id.into(),
        }
    }

    /// Merge a re-learn of the same identity into this pattern in place
    /// (§4.6): increment frequency, push the new emotive snapshot respecting
    /// `persistence`, and union in the new metadata.
    pub fn merge_relearn(
        &mut self,
        emotives: BTreeMap<String, f64>,
        metadata: BTreeMap<String, Vec<String>>,
        persistence: usize,
    ) {
        self.frequency += 1;
        self.emotive_profile.push_back(emotives);
        while self.emotive_profile.len() > persistence.max(1) {
            self.emotive_profile.pop_front();
        }
        for (key, values) in metadata {
            let entry = self.metadata_accumulator.entry(key).or_default();
            for value in values {
                if !entry.contains(&value) {
                    entry.push(value);
                }
            }
            entry.sort();
            entry.dedup();
        }
    }

    /// Arithmetic mean of the emotive profile, per key (§4.5).
    pub fn aggregated_emotives(&self) -> BTreeMap<String, f64> {
        let mut sums: BTreeMap<String, f64> = BTreeMap::new();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for snapshot in &self.emotive_profile {
            for (key, value) in snapshot {
                *sums.entry(key.clone()).or_insert(0.0) += value;
                *counts.entry(key.clone()).or_insert(0) += 1;
            }
        }
        sums.into_iter()
            .map(|(key, sum)| {
                let count = counts[&key] as f64;
                (key, sum / count)
            })
            .collect()
    }

    /// The symbol bag (distinct symbols across all events), used for
    /// candidate retrieval and recall filtering.
    pub fn symbol_bag(&self) -> std::collections::BTreeSet<&str> {
        self.events
            .iter()
            .flat_map(|event| event.iter().map(String::as_str))
            .collect()
    }
}

/// How prediction candidates are ordered (§4.5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankSortAlgo {
    Similarity,
    Confidence,
    Evidence,
    GrandHamiltonian,
}

impl Default for RankSortAlgo {
    fn default() -> Self {
        Self::Similarity
    }
}

/// Per-session configuration overrides (§6). Unknown keys are rejected at
/// validation time rather than silently ignored (§9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionConfig {
    pub recall_threshold: f64,
    pub max_predictions: usize,
    /// 0 means unbounded STM / manual learn only.
    pub max_pattern_length: usize,
    pub persistence: usize,
    pub use_token_matching: bool,
    /// 0 disables fuzzy matching.
    pub fuzzy_token_threshold: f64,
    pub rank_sort_algo: RankSortAlgo,
    pub process_predictions: bool,
    /// Fixed vector dimension this session accepts; `None` means the first
    /// observed vector establishes it.
    pub vector_dimension: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recall_threshold: 0.1,
            max_predictions: 100,
            max_pattern_length: 0,
            persistence: 5,
            use_token_matching: false,
            fuzzy_token_threshold: 0.0,
            rank_sort_algo: RankSortAlgo::Similarity,
            process_predictions: true,
            vector_dimension: None,
        }
    }
}

impl SessionConfig {
    /// Validate the ranges prescribed in §6, producing a descriptive error
    /// message for the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.recall_threshold) {
            return Err("recall_threshold must be in [0, 1]".into());
        }
        if !(1..=1000).contains(&self.max_predictions) {
            return Err("max_predictions must be in [1, 1000]".into());
        }
        if self.persistence < 1 {
            return Err("persistence must be >= 1".into());
        }
        if !(0.0..=1.0).contains(&self.fuzzy_token_threshold) {
            return Err("fuzzy_token_threshold must be in [0, 1]".into());
        }
        Ok(())
    }
}

/// A fuzzy-matched symbol pair within a prediction's present window (§4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub expected: String,
    pub observed: String,
    pub similarity: f64,
}

/// A single ranked prediction (§4.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// The pattern identity in wire format, `"PTRN|" + 40-hex`.
    pub name: String,
    pub past: Vec<Event>,
    pub present: Vec<Event>,
    pub future: Vec<Event>,
    pub matches: Vec<Symbol>,
    pub missing: Vec<Symbol>,
    pub extras: Vec<Symbol>,
    pub anomalies: Vec<Anomaly>,
    pub similarity: f64,
    pub confidence: f64,
    pub evidence: f64,
    pub entropy: f64,
    pub frequency: u64,
    pub emotives: BTreeMap<String, f64>,
    pub metadata: BTreeMap<String, Vec<String>>,
    pub hamiltonian: f64,
    pub grand_hamiltonian: f64,
    pub confluence: f64,
}

/// Per-session mutable state (§3). Owned exclusively by `SessionManager`;
/// every engine component receives a copy as a parameter and returns a new
/// copy rather than mutating shared state (§9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    /// The logical KB partition this session's patterns live in.
    pub node_id: String,
    pub stm: Vec<Event>,
    /// Monotonically increasing observation counter.
    pub time: u64,
    pub emotive_accumulator: Vec<BTreeMap<String, f64>>,
    pub metadata_accumulator: Vec<BTreeMap<String, serde_json::Value>>,
    /// Snapshot of the most recent observation, if any.
    pub percept_data: Option<Observation>,
    /// Last computed predictions, cached for GET.
    pub predictions: Vec<Prediction>,
    pub config: SessionConfig,
    /// Bumped on every successful store; used for optimistic-CAS `put`.
    pub version: u64,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, node_id: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            session_id: session_id.into(),
            node_id: node_id.into(),
            stm: Vec::new(),
            time: 0,
            emotive_accumulator: Vec::new(),
            metadata_accumulator: Vec::new(),
            percept_data: None,
            predictions: Vec::new(),
            config,
            version: 0,
        }
    }
}

/// Response to an `observe` RPC (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserveResult {
    pub status: String,
    pub stm_length: usize,
    pub time: u64,
    pub unique_id: Option<String>,
    pub auto_learned_pattern: Option<String>,
    pub predictions: Vec<Prediction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_within_event_identity_matches_literal_digest() {
        // Scenario 1: identity equals SHA1("apple\x1fmonkey\x1fzebra").
        let events = vec![vec![
            "apple".to_string(),
            "monkey".to_string(),
            "zebra".to_string(),
        ]];
        let identity = PatternIdentity::from_events(&events);

        let mut hasher = Sha1::new();
        hasher.update(b"apple\x1fmonkey\x1fzebra");
        let expected = format!("{:x}", hasher.finalize());

        assert_eq!(identity.as_hex(), expected);
    }

    #[test]
    fn identity_is_pure_function_of_events() {
        let events = vec![vec!["x".to_string()], vec!["y".to_string()]];
        assert_eq!(
            PatternIdentity::from_events(&events),
            PatternIdentity::from_events(&events.clone())
        );
    }

    #[test]
    fn wire_format_roundtrips() {
        let events = vec![vec!["a".to_string()]];
        let identity = PatternIdentity::from_events(&events);
        let wire = identity.to_wire();
        assert!(wire.starts_with(PATTERN_WIRE_PREFIX));
        assert_eq!(PatternIdentity::parse(&wire), identity);
    }

    #[test]
    fn relearn_increments_frequency_and_unions_metadata() {
        let events = vec![vec!["x".to_string()]];
        let mut pattern = Pattern::new(events, BTreeMap::new(), BTreeMap::new(), "kb1");
        assert_eq!(pattern.frequency, 1);

        let mut metadata = BTreeMap::new();
        metadata.insert("src".to_string(), vec!["a".to_string()]);
        pattern.merge_relearn(BTreeMap::new(), metadata, 5);
        assert_eq!(pattern.frequency, 2);
        assert_eq!(pattern.metadata_accumulator["src"], vec!["a".to_string()]);
    }

    #[test]
    fn emotive_profile_respects_persistence_bound() {
        let events = vec![vec!["x".to_string()]];
        let mut pattern = Pattern::new(events, BTreeMap::new(), BTreeMap::new(), "kb1");
        for _ in 0..10 {
            pattern.merge_relearn(BTreeMap::new(), BTreeMap::new(), 3);
        }
        assert!(pattern.emotive_profile.len() <= 3);
    }

    #[test]
    fn mean_per_key_averages_across_maps() {
        let mut a = BTreeMap::new();
        a.insert("joy".to_string(), 1.0);
        let mut b = BTreeMap::new();
        b.insert("joy".to_string(), 3.0);
        let mean = mean_per_key(&[a, b]);
        assert_eq!(mean["joy"], 2.0);
    }

    #[test]
    fn default_session_config_matches_spec_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.recall_threshold, 0.1);
        assert_eq!(config.max_predictions, 100);
        assert_eq!(config.max_pattern_length, 0);
        assert_eq!(config.persistence, 5);
        assert_eq!(config.fuzzy_token_threshold, 0.0);
    }

    #[test]
    fn config_validation_rejects_out_of_range_values() {
        let mut config = SessionConfig::default();
        config.recall_threshold = 2.0;
        assert!(config.validate().is_err());
    }
}
