//! Capability contracts for the engine's external collaborators (§4.6, §4.2,
//! §6). The engine itself is pure; these traits are the only places an
//! implementation talks to durable storage or the vector backend.

use crate::error::Result;
use crate::types::{Event, Pattern, PatternIdentity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Durable storage of learned patterns keyed by deterministic identity
/// (§4.6). Writes must be durable with majority-acknowledgement semantics;
/// `retrieve_candidates` must be linearizable with respect to completed
/// `upsert`s on the same `kb_id`.
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Insert a freshly learned pattern, or merge into an existing one with
    /// the same identity: `frequency += 1`, push the new emotive snapshot
    /// respecting `persistence`, union in new metadata.
    async fn upsert(&self, pattern: Pattern, persistence: usize) -> Result<()>;

    /// Return a superset of patterns in `kb_id` whose symbol bag intersects
    /// `stm_symbol_bag`. Backends may pre-filter via MinHash/LSH/Bloom
    /// buckets; correctness only requires a superset of the true matches.
    async fn retrieve_candidates(
        &self,
        kb_id: &str,
        stm_symbol_bag: &std::collections::BTreeSet<String>,
    ) -> Result<Vec<Pattern>>;

    /// Fetch a single pattern by identity, if present.
    async fn get(&self, kb_id: &str, identity: &PatternIdentity) -> Result<Option<Pattern>>;
}

/// Frequency counters, rolling emotive windows, and metadata accumulators
/// per pattern, namespaced by `(kb_id, identity)` (§4.6, §6). Distinct from
/// `PatternStore` because a deployment may back them with a faster,
/// lower-durability store (the spec only requires patterns themselves to be
/// majority-durable).
#[async_trait]
pub trait MetadataCache: Send + Sync {
    /// Increment the frequency counter for `(kb_id, identity)`.
    async fn increment_frequency(&self, kb_id: &str, identity: &PatternIdentity) -> Result<u64>;

    /// Append an emotive snapshot to the rolling window, evicting the
    /// oldest entry past `persistence`.
    async fn append_emotive(
        &self,
        kb_id: &str,
        identity: &PatternIdentity,
        emotives: BTreeMap<String, f64>,
        persistence: usize,
    ) -> Result<()>;

    /// Union new metadata values into the per-key accumulator.
    async fn append_metadata(
        &self,
        kb_id: &str,
        identity: &PatternIdentity,
        metadata: BTreeMap<String, Vec<String>>,
    ) -> Result<()>;

    /// Current frequency for `(kb_id, identity)`, or 0 if unseen.
    async fn frequency(&self, kb_id: &str, identity: &PatternIdentity) -> Result<u64>;
}

/// A stored vector and the symbol it is bound to, as kept in a `kb_id`'s
/// vector collection (§4.2, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub symbol: String,
    pub vector: Vec<f32>,
}

/// A nearest-neighbor hit returned by [`VectorBackend::find_nearest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestNeighbor {
    pub entry: VectorEntry,
    pub cosine_distance: f64,
}

/// The vector-similarity backend, treated as an external capability (§1):
/// "given a query vector and a collection id, return top-k nearest neighbor
/// ids with cosine distance." One collection per `kb_id`.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Find the single nearest neighbor to `vector` in `kb_id`'s collection
    /// by cosine distance. Ties are broken by the vector id's lexicographic
    /// order (§4.2).
    async fn find_nearest(&self, kb_id: &str, vector: &[f32]) -> Result<Option<NearestNeighbor>>;

    /// Insert a new vector/symbol pair into `kb_id`'s collection. Must be
    /// idempotent for the same `(id, symbol, vector)` triple, since
    /// `SymbolBinder::bind` is racy by design across concurrent sessions
    /// (§5).
    async fn insert(&self, kb_id: &str, entry: VectorEntry) -> Result<()>;
}

/// Session persistence and lifecycle (§4.8, §5). `SessionManager` adapters
/// implement this over whatever backing store holds session state; the
/// engine never assumes a particular one.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the current state for `session_id`, if the session exists and
    /// has not expired.
    async fn get(&self, session_id: &str) -> Result<Option<crate::types::SessionState>>;

    /// Store `new_state` if `expected_version` matches the currently stored
    /// version (optimistic CAS). Returns `Ok(true)` on success, `Ok(false)`
    /// on a version conflict.
    async fn put(
        &self,
        session_id: &str,
        new_state: crate::types::SessionState,
        expected_version: u64,
    ) -> Result<bool>;

    /// Create a brand new session, failing if one already exists with this
    /// id.
    async fn create(&self, state: crate::types::SessionState, ttl_seconds: u64) -> Result<()>;

    /// Remove a session unconditionally (`clear-all` / explicit delete).
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Extend a session's sliding TTL without otherwise touching its state.
    async fn touch(&self, session_id: &str, ttl_seconds: u64) -> Result<()>;
}

/// A reusable building block for `PatternStore`/`VectorBackend`
/// implementations that need to decide which matching strategy applies to
/// an event, independent of storage.
pub fn events_symbol_bag(events: &[Event]) -> std::collections::BTreeSet<String> {
    events
        .iter()
        .flat_map(|event| event.iter().cloned())
        .collect()
}
