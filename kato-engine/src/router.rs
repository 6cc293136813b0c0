//! EngineRouter (§4.8, §6, component C10): stateless dispatch in front of
//! `SessionManager`, shaped to match the RPC surface in §6 one-to-one.

use crate::session::SessionManager;
use kato_core::error::Result;
use kato_core::types::{Event, ObserveResult, Observation, Prediction, SessionConfig};
use std::sync::Arc;

/// Thin façade translating external RPC calls into `SessionManager`
/// invocations. Holds no state of its own beyond the manager handle, so it
/// is freely cloneable and shareable across request-handling workers.
#[derive(Clone)]
pub struct EngineRouter {
    manager: Arc<SessionManager>,
}

impl EngineRouter {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// `POST /sessions` (§6).
    pub async fn create_session(&self, session_id: &str, node_id: &str, config: SessionConfig) -> Result<()> {
        self.manager.create_session(session_id, node_id, config).await
    }

    /// `POST /sessions/{id}/observe` (§6).
    pub async fn observe(&self, session_id: &str, observation: Observation) -> Result<ObserveResult> {
        self.manager.observe(session_id, observation).await
    }

    /// `POST /sessions/{id}/observe-sequence` (§6): batch of observations
    /// with optional `learn` interleaved after each one, or once at the end.
    pub async fn observe_sequence(
        &self,
        session_id: &str,
        observations: Vec<Observation>,
        learn_between: bool,
        learn_at_end: bool,
    ) -> Result<Vec<ObserveResult>> {
        let mut results = Vec::with_capacity(observations.len());
        for observation in observations {
            results.push(self.manager.observe(session_id, observation).await?);
            if learn_between {
                self.manager.learn(session_id).await?;
            }
        }
        if learn_at_end && !learn_between {
            self.manager.learn(session_id).await?;
        }
        Ok(results)
    }

    /// `POST /sessions/{id}/learn` (§6).
    pub async fn learn(&self, session_id: &str) -> Result<String> {
        self.manager.learn(session_id).await
    }

    /// `GET /sessions/{id}/predictions` (§6): always recomputed, never
    /// served from a session-state cache (§9).
    pub async fn predictions(&self, session_id: &str) -> Result<Vec<Prediction>> {
        self.manager.predictions(session_id).await
    }

    /// `GET /sessions/{id}/stm` (§6).
    pub async fn stm(&self, session_id: &str) -> Result<Vec<Event>> {
        self.manager.stm(session_id).await
    }

    /// `POST /sessions/{id}/clear-stm` (§6).
    pub async fn clear_stm(&self, session_id: &str) -> Result<()> {
        self.manager.clear_stm(session_id).await
    }

    /// `DELETE /sessions/{id}` and `POST /sessions/{id}/clear-all` (§6).
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.manager.clear_all(session_id).await
    }

    /// `POST /sessions/{id}/config` (§6).
    pub async fn update_config(&self, session_id: &str, config: SessionConfig) -> Result<()> {
        self.manager.update_config(session_id, config).await
    }
}
