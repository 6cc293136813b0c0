//! SessionManager (§4.8, §5): serializes every mutating operation on a
//! session behind a per-session lock, following the load -> invoke pure
//! pipeline -> store-with-CAS sequence.

use crate::learning::learn;
use crate::observation::{compute_predictions, observe as observe_pipeline};
use crate::symbol_binder::SymbolBinder;
use dashmap::DashMap;
use kato_core::error::{KatoError, Result};
use kato_core::traits::{MetadataCache, PatternStore, SessionStore};
use kato_core::types::{Event, ObserveResult, Observation, Prediction, SessionConfig, SessionState};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// How many times a mutating operation retries on an optimistic-CAS version
/// conflict before giving up (§5, §9).
const MAX_CAS_RETRIES: u32 = 5;

/// Owns the collaborators an engine deployment needs and serializes access
/// per session id (§5: "every mutating RPC runs under the session lock").
pub struct SessionManager {
    session_store: Arc<dyn SessionStore>,
    pattern_store: Arc<dyn PatternStore>,
    metadata_cache: Arc<dyn MetadataCache>,
    symbol_binder: SymbolBinder,
    ttl_seconds: u64,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionManager {
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        pattern_store: Arc<dyn PatternStore>,
        metadata_cache: Arc<dyn MetadataCache>,
        symbol_binder: SymbolBinder,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            session_store,
            pattern_store,
            metadata_cache,
            symbol_binder,
            ttl_seconds,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create a brand new session with the given node partition and config.
    pub async fn create_session(
        &self,
        session_id: &str,
        node_id: &str,
        config: SessionConfig,
    ) -> Result<()> {
        config.validate().map_err(KatoError::validation)?;
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;
        let state = SessionState::new(session_id, node_id, config);
        self.session_store.create(state, self.ttl_seconds).await
    }

    async fn load(&self, session_id: &str) -> Result<SessionState> {
        self.session_store
            .get(session_id)
            .await?
            .ok_or_else(|| KatoError::session_not_found(session_id))
    }

    /// Run `step` under the session lock, retrying the CAS store on version
    /// conflicts. `step` receives the freshly loaded state and returns the
    /// new state alongside whatever the caller wants to hand back.
    async fn with_session<F, Fut, T>(&self, session_id: &str, step: F) -> Result<T>
    where
        F: Fn(SessionState) -> Fut,
        Fut: std::future::Future<Output = Result<(SessionState, T)>>,
    {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        for attempt in 0..MAX_CAS_RETRIES {
            let current = self.load(session_id).await?;
            let expected_version = current.version;
            let (mut new_state, output) = step(current).await?;
            new_state.version = expected_version + 1;

            if self
                .session_store
                .put(session_id, new_state, expected_version)
                .await?
            {
                self.session_store.touch(session_id, self.ttl_seconds).await?;
                return Ok(output);
            }
            warn!(session_id, attempt, "session CAS conflict, retrying");
        }

        Err(KatoError::storage_conflict(format!(
            "session {session_id} did not converge after {MAX_CAS_RETRIES} attempts"
        )))
    }

    /// `observe` RPC (§4.3, §6).
    pub async fn observe(&self, session_id: &str, observation: Observation) -> Result<ObserveResult> {
        self.with_session(session_id, |state| async {
            let (new_state, result) = observe_pipeline(
                &state,
                observation.clone(),
                self.pattern_store.as_ref(),
                self.metadata_cache.as_ref(),
                &self.symbol_binder,
            )
            .await?;
            Ok((new_state, result))
        })
        .await
    }

    /// `learn` RPC (§4.7, §6): force-learn the current STM.
    pub async fn learn(&self, session_id: &str) -> Result<String> {
        self.with_session(session_id, |state| async {
            let (identity, new_state) =
                learn(&state, self.pattern_store.as_ref(), self.metadata_cache.as_ref()).await?;
            Ok((new_state, identity.to_wire()))
        })
        .await
    }

    /// `clear-stm` RPC (§6): empty STM and accumulators without learning.
    pub async fn clear_stm(&self, session_id: &str) -> Result<()> {
        self.with_session(session_id, |mut state| async {
            state.stm.clear();
            state.emotive_accumulator.clear();
            state.metadata_accumulator.clear();
            state.predictions.clear();
            state.percept_data = None;
            Ok((state, ()))
        })
        .await
    }

    /// `clear-all` RPC (§6): delete the session entirely.
    pub async fn clear_all(&self, session_id: &str) -> Result<()> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;
        self.session_store.delete(session_id).await
    }

    /// `predictions` RPC (§6, §9): recompute on GET rather than relying on
    /// the cached copy from the last `observe`, resolving the
    /// `process_predictions = false` open question in the spec's favor of
    /// "defer to next GET".
    pub async fn predictions(&self, session_id: &str) -> Result<Vec<Prediction>> {
        let state = self.load(session_id).await?;
        compute_predictions(&state, self.pattern_store.as_ref()).await
    }

    /// `stm` RPC (§6): current short-term memory.
    pub async fn stm(&self, session_id: &str) -> Result<Vec<Event>> {
        let state = self.load(session_id).await?;
        Ok(state.stm)
    }

    /// `config` RPC (§6): replace the session's config wholesale.
    pub async fn update_config(&self, session_id: &str, config: SessionConfig) -> Result<()> {
        config.validate().map_err(KatoError::validation)?;
        self.with_session(session_id, |mut state| async {
            state.config = config.clone();
            Ok((state, ()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kato_storage::{InMemoryMetadataCache, InMemoryPatternStore, InMemorySessionStore, InMemoryVectorBackend};

    fn manager() -> SessionManager {
        SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryPatternStore::new()),
            Arc::new(InMemoryMetadataCache::new()),
            SymbolBinder::new(Arc::new(InMemoryVectorBackend::new()), 0.95),
            3600,
        )
    }

    fn observation(strings: &[&str]) -> Observation {
        Observation {
            strings: strings.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_then_observe_roundtrips() {
        let manager = manager();
        manager
            .create_session("s1", "kb1", SessionConfig::default())
            .await
            .unwrap();

        let result = manager.observe("s1", observation(&["a"])).await.unwrap();
        assert_eq!(result.stm_length, 1);

        let stm = manager.stm("s1").await.unwrap();
        assert_eq!(stm, vec![vec!["a".to_string()]]);
    }

    #[tokio::test]
    async fn unknown_session_errors() {
        let manager = manager();
        let result = manager.observe("ghost", observation(&["a"])).await;
        assert!(matches!(result, Err(KatoError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn learn_then_clear_stm_empties_state() {
        let manager = manager();
        manager
            .create_session("s1", "kb1", SessionConfig::default())
            .await
            .unwrap();
        manager.observe("s1", observation(&["a"])).await.unwrap();
        manager.learn("s1").await.unwrap();

        let stm = manager.stm("s1").await.unwrap();
        assert!(stm.is_empty());

        manager.observe("s1", observation(&["b"])).await.unwrap();
        manager.clear_stm("s1").await.unwrap();
        assert!(manager.stm("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_all_deletes_session() {
        let manager = manager();
        manager
            .create_session("s1", "kb1", SessionConfig::default())
            .await
            .unwrap();
        manager.clear_all("s1").await.unwrap();
        assert!(manager.stm("s1").await.is_err());
    }

    #[tokio::test]
    async fn relearning_same_sequence_across_sessions_shares_identity() {
        // Scenario 6, driven through the manager rather than learning.rs directly.
        let manager = manager();
        manager
            .create_session("s1", "kb1", SessionConfig::default())
            .await
            .unwrap();
        manager
            .create_session("s2", "kb1", SessionConfig::default())
            .await
            .unwrap();

        manager.observe("s1", observation(&["x"])).await.unwrap();
        manager.observe("s1", observation(&["y"])).await.unwrap();
        let id1 = manager.learn("s1").await.unwrap();

        manager.observe("s2", observation(&["x"])).await.unwrap();
        manager.observe("s2", observation(&["y"])).await.unwrap();
        let id2 = manager.learn("s2").await.unwrap();

        assert_eq!(id1, id2);
    }
}
