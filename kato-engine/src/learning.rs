//! LearningEngine (§4.7): compresses STM into a pattern, computes its
//! identity, writes it to the pattern store, and updates the metadata
//! cache.

use kato_core::error::{KatoError, Result};
use kato_core::metadata::MetadataAccumulator;
use kato_core::traits::{MetadataCache, PatternStore};
use kato_core::types::{mean_per_key, Event, Pattern, PatternIdentity, SessionState};
use serde_json::Value;
use std::collections::BTreeMap;

/// `learn(session) -> (pattern_identity, emptied_session)` (§4.7).
///
/// Fails with [`KatoError::EmptyStm`] when `session.stm` is empty, without
/// touching session state.
pub async fn learn(
    session: &SessionState,
    pattern_store: &dyn PatternStore,
    metadata_cache: &dyn MetadataCache,
) -> Result<(PatternIdentity, SessionState)> {
    if session.stm.is_empty() {
        return Err(KatoError::EmptyStm);
    }

    let identity = learn_window(
        &session.stm,
        &session.emotive_accumulator,
        &session.metadata_accumulator,
        &session.node_id,
        session.config.persistence,
        pattern_store,
        metadata_cache,
    )
    .await?;

    let mut new_state = session.clone();
    new_state.stm.clear();
    new_state.emotive_accumulator.clear();
    new_state.metadata_accumulator.clear();
    new_state.predictions.clear();

    Ok((identity, new_state))
}

/// Learn a specific window of events (used both by explicit `learn` over
/// the whole STM and by auto-learn over `new_stm[:-1]`, §4.3 step 6).
pub async fn learn_window(
    events: &[Event],
    emotive_accumulator: &[BTreeMap<String, f64>],
    metadata_accumulator: &[BTreeMap<String, Value>],
    kb_id: &str,
    persistence: usize,
    pattern_store: &dyn PatternStore,
    metadata_cache: &dyn MetadataCache,
) -> Result<PatternIdentity> {
    let events: Vec<Event> = events.to_vec();
    let emotives = mean_per_key(emotive_accumulator);

    let mut accumulator = MetadataAccumulator::new();
    accumulator.merge_all(metadata_accumulator);
    let metadata = accumulator.into_map();

    let pattern = Pattern::new(events, emotives.clone(), metadata.clone(), kb_id);
    let identity = pattern.identity.clone();

    pattern_store.upsert(pattern, persistence).await?;
    metadata_cache.increment_frequency(kb_id, &identity).await?;
    metadata_cache
        .append_emotive(kb_id, &identity, emotives, persistence)
        .await?;
    metadata_cache
        .append_metadata(kb_id, &identity, metadata)
        .await?;

    Ok(identity)
}
