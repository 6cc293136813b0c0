//! In-memory reference implementation of [`SessionStore`] (§4.8, §5).
//!
//! Each session carries a sliding-TTL expiry alongside its state; `put` is
//! an optimistic compare-and-swap on `version` so two racing writers never
//! silently clobber one another (§5: storage contention is resolved by the
//! store, either single-writer merge or optimistic CAS).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use kato_core::error::Result;
use kato_core::traits::SessionStore;
use kato_core::types::SessionState;
use tracing::debug;

struct StoredSession {
    state: SessionState,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, StoredSession>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of sessions currently tracked, including ones past expiry that
    /// have not yet been touched (useful for a reaper sweep).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionState>> {
        match self.sessions.get(session_id) {
            Some(entry) if entry.expires_at > Utc::now() => Ok(Some(entry.state.clone())),
            Some(_) => {
                drop(self.sessions.remove(session_id));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, session_id: &str, new_state: SessionState, expected_version: u64) -> Result<bool> {
        let Some(mut entry) = self.sessions.get_mut(session_id) else {
            return Ok(false);
        };
        if entry.state.version != expected_version {
            debug!(session_id, expected_version, actual_version = entry.state.version, "storage conflict");
            return Ok(false);
        }
        let mut new_state = new_state;
        new_state.version = expected_version + 1;
        entry.state = new_state;
        Ok(true)
    }

    async fn create(&self, state: SessionState, ttl_seconds: u64) -> Result<()> {
        let expires_at = Utc::now() + Duration::seconds(ttl_seconds as i64);
        self.sessions
            .entry(state.session_id.clone())
            .or_insert(StoredSession { state, expires_at });
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn touch(&self, session_id: &str, ttl_seconds: u64) -> Result<()> {
        if let Some(mut entry) = self.sessions.get_mut(session_id) {
            entry.expires_at = Utc::now() + Duration::seconds(ttl_seconds as i64);
        }
        Ok(())
    }
}
