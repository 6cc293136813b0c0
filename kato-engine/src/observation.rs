//! ObservationPipeline (§4.3): turns one client observation into an event,
//! appends it to STM, auto-learns when the pattern length bound is hit, and
//! optionally recomputes predictions.

use crate::learning::learn_window;
use crate::matcher::align;
use crate::scorer::rank;
use crate::symbol_binder::SymbolBinder;
use kato_core::error::{KatoError, Result};
use kato_core::traits::{events_symbol_bag, MetadataCache, PatternStore};
use kato_core::types::{Observation, ObserveResult, SessionState};
use std::sync::Arc;
use tracing::debug;

/// Run the full observation pipeline (§4.3 steps 1-8) and return the
/// resulting session state alongside the RPC-shaped result.
pub async fn observe(
    session: &SessionState,
    observation: Observation,
    pattern_store: &dyn PatternStore,
    metadata_cache: &dyn MetadataCache,
    symbol_binder: &SymbolBinder,
) -> Result<(SessionState, ObserveResult)> {
    if observation.is_empty() {
        return Err(KatoError::validation(
            "observation must contain at least one string or vector",
        ));
    }
    if observation.strings.iter().any(|s| s.is_empty()) {
        return Err(KatoError::validation(
            "observation.strings must not contain empty string tokens",
        ));
    }

    let mut new_state = session.clone();

    if let Some(expected_dim) = new_state.config.vector_dimension {
        for vector in &observation.vectors {
            if vector.len() != expected_dim {
                return Err(KatoError::validation(format!(
                    "vector dimension {} does not match session dimension {}",
                    vector.len(),
                    expected_dim
                )));
            }
        }
    } else if let Some(first) = observation.vectors.first() {
        new_state.config.vector_dimension = Some(first.len());
    }

    // Step 2: vector symbols, arrival order preserved.
    let mut vector_symbols = Vec::with_capacity(observation.vectors.len());
    for vector in &observation.vectors {
        let (symbol, is_novel) = symbol_binder.bind(&new_state.node_id, vector).await?;
        debug!(symbol = %symbol, is_novel, "bound vector to symbol");
        vector_symbols.push(symbol);
    }

    // Step 3: form the event -- vector symbols first, then sorted strings.
    let mut strings = observation.strings.clone();
    strings.sort();
    let mut event = vector_symbols;
    event.extend(strings);

    // Step 4: append + bookkeeping.
    new_state.stm.push(event);
    new_state.time += 1;
    new_state.emotive_accumulator.push(observation.emotives.clone());
    new_state.metadata_accumulator.push(observation.metadata.clone());
    new_state.percept_data = Some(observation.clone());

    // Step 5: unique_id passthrough.
    let unique_id = observation.unique_id.clone();

    // Step 6: auto-learn when the STM has grown past the configured bound.
    let mut auto_learned_pattern = None;
    if new_state.config.max_pattern_length > 0
        && new_state.stm.len() > new_state.config.max_pattern_length
    {
        let learn_len = new_state.stm.len() - 1;
        let learned_events = new_state.stm[..learn_len].to_vec();
        let learned_emotives = new_state.emotive_accumulator[..learn_len].to_vec();
        let learned_metadata = new_state.metadata_accumulator[..learn_len].to_vec();

        let identity = learn_window(
            &learned_events,
            &learned_emotives,
            &learned_metadata,
            &new_state.node_id,
            new_state.config.persistence,
            pattern_store,
            metadata_cache,
        )
        .await?;

        new_state.stm = new_state.stm[learn_len..].to_vec();
        new_state.emotive_accumulator = new_state.emotive_accumulator[learn_len..].to_vec();
        new_state.metadata_accumulator = new_state.metadata_accumulator[learn_len..].to_vec();
        auto_learned_pattern = Some(identity.to_wire());
    }

    // Step 7: optionally recompute predictions against the updated STM.
    let predictions = if new_state.config.process_predictions {
        compute_predictions(&new_state, pattern_store).await?
    } else {
        Vec::new()
    };
    new_state.predictions = predictions.clone();

    let result = ObserveResult {
        status: "okay".to_string(),
        stm_length: new_state.stm.len(),
        time: new_state.time,
        unique_id,
        auto_learned_pattern,
        predictions,
    };

    Ok((new_state, result))
}

/// Retrieve candidates overlapping the current STM's symbol bag, align each,
/// and score/rank the survivors (§4.4, §4.5). Used both by `observe` (when
/// `process_predictions` is set) and by the `predictions` RPC's recompute-on-
/// GET path (§9).
pub async fn compute_predictions(
    session: &SessionState,
    pattern_store: &dyn PatternStore,
) -> Result<Vec<kato_core::types::Prediction>> {
    if session.stm.is_empty() {
        return Ok(Vec::new());
    }

    let stm_symbol_bag = events_symbol_bag(&session.stm);
    let candidates = pattern_store
        .retrieve_candidates(&session.node_id, &stm_symbol_bag)
        .await?;

    let fuzzy_threshold = if session.config.use_token_matching {
        session.config.fuzzy_token_threshold
    } else {
        0.0
    };

    let aligned: Vec<_> = candidates
        .into_iter()
        .filter_map(|pattern| align(pattern, &session.stm, fuzzy_threshold))
        .collect();

    Ok(rank(aligned, &stm_symbol_bag, &session.config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kato_core::types::SessionConfig;
    use kato_storage::{InMemoryMetadataCache, InMemoryPatternStore, InMemoryVectorBackend};

    fn observation(strings: &[&str]) -> Observation {
        Observation {
            strings: strings.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rejects_empty_observation() {
        let session = SessionState::new("s1", "kb1", SessionConfig::default());
        let pattern_store = InMemoryPatternStore::new();
        let metadata_cache = InMemoryMetadataCache::new();
        let binder = SymbolBinder::new(Arc::new(InMemoryVectorBackend::new()), 0.95);

        let result = observe(&session, Observation::default(), &pattern_store, &metadata_cache, &binder).await;
        assert!(matches!(result, Err(KatoError::Validation(_))));
    }

    #[tokio::test]
    async fn rejects_empty_string_token() {
        let session = SessionState::new("s1", "kb1", SessionConfig::default());
        let pattern_store = InMemoryPatternStore::new();
        let metadata_cache = InMemoryMetadataCache::new();
        let binder = SymbolBinder::new(Arc::new(InMemoryVectorBackend::new()), 0.95);

        let result = observe(
            &session,
            observation(&["", "a"]),
            &pattern_store,
            &metadata_cache,
            &binder,
        )
        .await;
        assert!(matches!(result, Err(KatoError::Validation(_))));
    }

    #[tokio::test]
    async fn sorts_strings_within_event() {
        let session = SessionState::new("s1", "kb1", SessionConfig::default());
        let pattern_store = InMemoryPatternStore::new();
        let metadata_cache = InMemoryMetadataCache::new();
        let binder = SymbolBinder::new(Arc::new(InMemoryVectorBackend::new()), 0.95);

        let (new_state, result) = observe(
            &session,
            observation(&["zebra", "apple", "monkey"]),
            &pattern_store,
            &metadata_cache,
            &binder,
        )
        .await
        .unwrap();

        assert_eq!(
            new_state.stm[0],
            vec!["apple".to_string(), "monkey".to_string(), "zebra".to_string()]
        );
        assert_eq!(result.stm_length, 1);
        assert_eq!(result.time, 1);
    }

    #[tokio::test]
    async fn auto_learns_at_max_pattern_length() {
        // Scenario 5: max_pattern_length = 3, observing a 4th event learns
        // the first three and leaves the new one alone in STM.
        let mut config = SessionConfig::default();
        config.max_pattern_length = 3;
        config.process_predictions = false;
        let mut session = SessionState::new("s1", "kb1", config);
        let pattern_store = InMemoryPatternStore::new();
        let metadata_cache = InMemoryMetadataCache::new();
        let binder = SymbolBinder::new(Arc::new(InMemoryVectorBackend::new()), 0.95);

        for letter in ["a", "b", "c"] {
            let (next, _) = observe(&session, observation(&[letter]), &pattern_store, &metadata_cache, &binder)
                .await
                .unwrap();
            session = next;
        }
        assert_eq!(session.stm.len(), 3);

        let (next, result) = observe(&session, observation(&["d"]), &pattern_store, &metadata_cache, &binder)
            .await
            .unwrap();

        assert!(result.auto_learned_pattern.is_some());
        assert_eq!(next.stm, vec![vec!["d".to_string()]]);
    }

    #[tokio::test]
    async fn rejects_mismatched_vector_dimension() {
        let mut config = SessionConfig::default();
        config.vector_dimension = Some(3);
        let session = SessionState::new("s1", "kb1", config);
        let pattern_store = InMemoryPatternStore::new();
        let metadata_cache = InMemoryMetadataCache::new();
        let binder = SymbolBinder::new(Arc::new(InMemoryVectorBackend::new()), 0.95);

        let mut observation = Observation::default();
        observation.vectors.push(vec![1.0, 0.0]);

        let result = observe(&session, observation, &pattern_store, &metadata_cache, &binder).await;
        assert!(matches!(result, Err(KatoError::Validation(_))));
    }
}
