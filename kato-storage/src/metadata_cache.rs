//! In-memory reference implementation of [`MetadataCache`] (§4.6).
//!
//! Separate from `PatternStore` because a deployment may want a faster,
//! lower-durability store for these counters; the spec only requires
//! patterns themselves to be majority-durable (§4.6).

use async_trait::async_trait;
use dashmap::DashMap;
use kato_core::error::Result;
use kato_core::traits::MetadataCache;
use kato_core::types::PatternIdentity;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Entry {
    frequency: AtomicU64,
    emotive_profile: Mutex<VecDeque<BTreeMap<String, f64>>>,
    metadata_accumulator: Mutex<BTreeMap<String, Vec<String>>>,
}

#[derive(Default)]
pub struct InMemoryMetadataCache {
    entries: DashMap<(String, String), Arc<Entry>>,
}

impl InMemoryMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, kb_id: &str, identity: &PatternIdentity) -> Arc<Entry> {
        self.entries
            .entry((kb_id.to_string(), identity.as_hex().to_string()))
            .or_insert_with(|| Arc::new(Entry::default()))
            .clone()
    }
}

#[async_trait]
impl MetadataCache for InMemoryMetadataCache {
    async fn increment_frequency(&self, kb_id: &str, identity: &PatternIdentity) -> Result<u64> {
        let entry = self.entry(kb_id, identity);
        Ok(entry.frequency.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn append_emotive(
        &self,
        kb_id: &str,
        identity: &PatternIdentity,
        emotives: BTreeMap<String, f64>,
        persistence: usize,
    ) -> Result<()> {
        let entry = self.entry(kb_id, identity);
        let mut profile = entry.emotive_profile.lock();
        profile.push_back(emotives);
        while profile.len() > persistence.max(1) {
            profile.pop_front();
        }
        Ok(())
    }

    async fn append_metadata(
        &self,
        kb_id: &str,
        identity: &PatternIdentity,
        metadata: BTreeMap<String, Vec<String>>,
    ) -> Result<()> {
        let entry = self.entry(kb_id, identity);
        let mut accumulator = entry.metadata_accumulator.lock();
        for (key, values) in metadata {
            let slot = accumulator.entry(key).or_default();
            for value in values {
                if !slot.contains(&value) {
                    slot.push(value);
                }
            }
            slot.sort();
        }
        Ok(())
    }

    async fn frequency(&self, kb_id: &str, identity: &PatternIdentity) -> Result<u64> {
        Ok(self.entry(kb_id, identity).frequency.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> PatternIdentity {
        PatternIdentity::from_events(&[vec!["a".to_string()]])
    }

    #[tokio::test]
    async fn increment_frequency_accumulates() {
        let cache = InMemoryMetadataCache::new();
        let id = identity();
        cache.increment_frequency("kb1", &id).await.unwrap();
        let freq = cache.increment_frequency("kb1", &id).await.unwrap();
        assert_eq!(freq, 2);
    }

    #[tokio::test]
    async fn emotive_window_respects_persistence() {
        let cache = InMemoryMetadataCache::new();
        let id = identity();
        for i in 0..10 {
            let mut map = BTreeMap::new();
            map.insert("joy".to_string(), i as f64);
            cache.append_emotive("kb1", &id, map, 3).await.unwrap();
        }
        let entry = cache.entry("kb1", &id);
        assert_eq!(entry.emotive_profile.lock().len(), 3);
    }

    #[tokio::test]
    async fn metadata_union_deduplicates() {
        let cache = InMemoryMetadataCache::new();
        let id = identity();
        let mut m1 = BTreeMap::new();
        m1.insert("src".to_string(), vec!["a".to_string()]);
        cache.append_metadata("kb1", &id, m1.clone()).await.unwrap();
        cache.append_metadata("kb1", &id, m1).await.unwrap();
        let entry = cache.entry("kb1", &id);
        assert_eq!(entry.metadata_accumulator.lock()["src"].len(), 1);
    }
}
