//! In-memory reference implementation of [`PatternStore`] (§4.6).
//!
//! Patterns are partitioned by `kb_id`, each partition holding an
//! identity-keyed map plus an inverted index from symbol to identities for
//! candidate retrieval. A `DashMap` per partition gives per-key locking
//! without a process-wide mutex, matching how the rest of the pack shards
//! concurrent in-memory state.

use async_trait::async_trait;
use dashmap::DashMap;
use kato_core::error::Result;
use kato_core::traits::PatternStore;
use kato_core::types::{Pattern, PatternIdentity};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct Partition {
    patterns: DashMap<String, Pattern>,
    /// symbol -> set of identities containing it.
    inverted_index: DashMap<String, BTreeSet<String>>,
}

/// Thread-safe, process-local `PatternStore`. Suitable as the reference
/// backend for tests and single-node deployments; a durable backend would
/// implement the same trait against a real database.
#[derive(Default)]
pub struct InMemoryPatternStore {
    partitions: DashMap<String, Arc<Partition>>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, kb_id: &str) -> Arc<Partition> {
        self.partitions
            .entry(kb_id.to_string())
            .or_insert_with(|| Arc::new(Partition::default()))
            .clone()
    }
}

#[async_trait]
impl PatternStore for InMemoryPatternStore {
    async fn upsert(&self, pattern: Pattern, persistence: usize) -> Result<()> {
        let partition = self.partition(&pattern.kb_id);
        let identity = pattern.identity.as_hex().to_string();

        for symbol in pattern.symbol_bag() {
            partition
                .inverted_index
                .entry(symbol.to_string())
                .or_default()
                .insert(identity.clone());
        }

        match partition.patterns.entry(identity.clone()) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                debug!(identity = %identity, "pattern learned for the first time");
                slot.insert(pattern);
            }
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                let emotives = pattern
                    .emotive_profile
                    .back()
                    .cloned()
                    .unwrap_or_default();
                let metadata = pattern.metadata_accumulator;
                slot.get_mut().merge_relearn(emotives, metadata, persistence);
                debug!(
                    identity = %identity,
                    frequency = slot.get().frequency,
                    "pattern re-learned"
                );
            }
        }
        Ok(())
    }

    async fn retrieve_candidates(
        &self,
        kb_id: &str,
        stm_symbol_bag: &std::collections::BTreeSet<String>,
    ) -> Result<Vec<Pattern>> {
        let partition = self.partition(kb_id);
        let mut identities: BTreeSet<String> = BTreeSet::new();
        for symbol in stm_symbol_bag {
            if let Some(ids) = partition.inverted_index.get(symbol) {
                identities.extend(ids.iter().cloned());
            }
        }

        let patterns = identities
            .into_iter()
            .filter_map(|identity| partition.patterns.get(&identity).map(|e| e.value().clone()))
            .collect();
        Ok(patterns)
    }

    async fn get(&self, kb_id: &str, identity: &PatternIdentity) -> Result<Option<Pattern>> {
        let partition = self.partition(kb_id);
        Ok(partition
            .patterns
            .get(identity.as_hex())
            .map(|e| e.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn pattern(events: Vec<Vec<&str>>, kb_id: &str) -> Pattern {
        let events: Vec<Vec<String>> = events
            .into_iter()
            .map(|e| e.into_iter().map(String::from).collect())
            .collect();
        Pattern::new(events, BTreeMap::new(), BTreeMap::new(), kb_id)
    }

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let store = InMemoryPatternStore::new();
        let pattern = pattern(vec![vec!["a"], vec!["b"]], "kb1");
        let identity = pattern.identity.clone();
        store.upsert(pattern, 5).await.unwrap();

        let fetched = store.get("kb1", &identity).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn relearn_same_identity_increments_frequency() {
        let store = InMemoryPatternStore::new();
        let p1 = pattern(vec![vec!["x"], vec!["y"]], "kb1");
        let p2 = pattern(vec![vec!["x"], vec!["y"]], "kb1");
        let identity = p1.identity.clone();

        store.upsert(p1, 5).await.unwrap();
        store.upsert(p2, 5).await.unwrap();

        let fetched = store.get("kb1", &identity).await.unwrap().unwrap();
        assert_eq!(fetched.frequency, 2);
    }

    #[tokio::test]
    async fn candidate_retrieval_is_superset_of_overlapping_patterns() {
        let store = InMemoryPatternStore::new();
        store
            .upsert(pattern(vec![vec!["hello", "world"]], "kb1"), 5)
            .await
            .unwrap();
        store
            .upsert(pattern(vec![vec!["unrelated"]], "kb1"), 5)
            .await
            .unwrap();

        let bag: BTreeSet<String> = ["hello".to_string()].into_iter().collect();
        let candidates = store.retrieve_candidates("kb1", &bag).await.unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[tokio::test]
    async fn partitions_isolate_kb_ids() {
        let store = InMemoryPatternStore::new();
        let p = pattern(vec![vec!["shared"]], "kb1");
        let identity = p.identity.clone();
        store.upsert(p, 5).await.unwrap();

        assert!(store.get("kb2", &identity).await.unwrap().is_none());
    }
}
