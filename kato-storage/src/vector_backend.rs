//! In-memory reference implementation of the vector-similarity backend
//! (§1, §4.2, §6).
//!
//! The spec treats this backend as an external capability; this is the
//! brute-force in-process stand-in used for tests and small deployments. One
//! collection per `kb_id`, linear scan for nearest neighbor — fine at the
//! scale this engine's STM/pattern windows operate at.

use async_trait::async_trait;
use dashmap::DashMap;
use kato_core::error::Result;
use kato_core::traits::{NearestNeighbor, VectorBackend, VectorEntry};
use parking_lot::RwLock;
use std::sync::Arc;

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)) as f64
    }
}

#[derive(Default)]
pub struct InMemoryVectorBackend {
    collections: DashMap<String, Arc<RwLock<Vec<VectorEntry>>>>,
}

impl InMemoryVectorBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, kb_id: &str) -> Arc<RwLock<Vec<VectorEntry>>> {
        self.collections
            .entry(kb_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
            .clone()
    }
}

#[async_trait]
impl VectorBackend for InMemoryVectorBackend {
    async fn find_nearest(&self, kb_id: &str, vector: &[f32]) -> Result<Option<NearestNeighbor>> {
        let collection = self.collection(kb_id);
        let entries = collection.read();

        // Ties broken by vector id's lexicographic order (§4.2): iterate in
        // id order and keep strictly-better candidates only.
        let mut sorted: Vec<&VectorEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let mut best: Option<(f64, &VectorEntry)> = None;
        for entry in sorted {
            let similarity = cosine_similarity(vector, &entry.vector);
            match best {
                Some((best_similarity, _)) if similarity <= best_similarity => {}
                _ => best = Some((similarity, entry)),
            }
        }

        Ok(best.map(|(similarity, entry)| NearestNeighbor {
            entry: entry.clone(),
            cosine_distance: 1.0 - similarity,
        }))
    }

    async fn insert(&self, kb_id: &str, entry: VectorEntry) -> Result<()> {
        let collection = self.collection(kb_id);
        let mut entries = collection.write();
        // Idempotent: a vector/symbol pair already present by id is not
        // duplicated (SymbolBinder::bind is racy by design, §5).
        if !entries.iter().any(|e| e.id == entry.id) {
            entries.push(entry);
        }
        Ok(())
    }
}
