//! SymbolBinder (§4.2): turns raw vectors into stable symbolic tokens via
//! nearest-neighbor lookup in a vector collection.

use kato_core::error::Result;
use kato_core::traits::VectorBackend;
use kato_core::types::vector_symbol;
use kato_core::VectorEntry;
use std::sync::Arc;
use tracing::trace;

/// Binds vectors to symbols, reusing the nearest existing symbol when one
/// lies within `similarity_radius`, minting a new one otherwise.
pub struct SymbolBinder {
    backend: Arc<dyn VectorBackend>,
    similarity_radius: f64,
}

impl SymbolBinder {
    pub fn new(backend: Arc<dyn VectorBackend>, similarity_radius: f64) -> Self {
        Self {
            backend,
            similarity_radius,
        }
    }

    /// `bind(kb_id, vector) -> (symbol, is_novel)` (§4.2).
    pub async fn bind(&self, kb_id: &str, vector: &[f32]) -> Result<(String, bool)> {
        if let Some(neighbor) = self.backend.find_nearest(kb_id, vector).await? {
            let similarity = 1.0 - neighbor.cosine_distance;
            if similarity >= self.similarity_radius {
                trace!(kb_id, symbol = %neighbor.entry.symbol, similarity, "reused existing vector symbol");
                return Ok((neighbor.entry.symbol, false));
            }
        }

        let symbol = vector_symbol(vector);
        self.backend
            .insert(
                kb_id,
                VectorEntry {
                    id: symbol.clone(),
                    symbol: symbol.clone(),
                    vector: vector.to_vec(),
                },
            )
            .await?;
        trace!(kb_id, symbol = %symbol, "minted novel vector symbol");
        Ok((symbol, true))
    }

    /// Bind a sequence of vectors in arrival order, collecting their symbols.
    pub async fn bind_all(&self, kb_id: &str, vectors: &[Vec<f32>]) -> Result<Vec<String>> {
        let mut symbols = Vec::with_capacity(vectors.len());
        for vector in vectors {
            let (symbol, _) = self.bind(kb_id, vector).await?;
            symbols.push(symbol);
        }
        Ok(symbols)
    }
}
