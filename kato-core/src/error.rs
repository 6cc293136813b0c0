//! Error taxonomy for the engine (§7).

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, KatoError>;

/// Main error type for the engine.
///
/// Variants map directly onto the error taxonomy: validation and not-found
/// errors never mutate session state; storage errors are distinguished by
/// whether a retry can help.
#[derive(Debug, thiserror::Error)]
pub enum KatoError {
    /// Client-supplied input failed validation: empty observation, empty
    /// symbol, wrong vector dimension, unknown configuration key.
    #[error("validation error: {0}")]
    Validation(String),

    /// No session exists with the given id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The session existed but its TTL lapsed.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// `learn` was invoked against an empty short-term memory.
    #[error("cannot learn: short-term memory is empty")]
    EmptyStm,

    /// A learned pattern could not be found by identity.
    #[error("pattern not found: {0}")]
    PatternNotFound(String),

    /// The pattern store or vector backend is transiently unavailable.
    /// Retryable.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// An optimistic compare-and-swap lost the race after exhausting its
    /// retry budget.
    #[error("storage conflict: {0}")]
    StorageConflict(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (unknown key, value out of range).
    #[error("configuration error: {0}")]
    Config(String),

    /// Programming error or invariant violation. Fatal to the request, not
    /// to the process: each mutation operates on a fresh copy of session
    /// state, so the session itself is never left corrupted.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapped anyhow errors for adapter boundaries.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KatoError {
    /// Build a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a session-not-found error.
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound(session_id.into())
    }

    /// Build a session-expired error.
    pub fn session_expired(session_id: impl Into<String>) -> Self {
        Self::SessionExpired(session_id.into())
    }

    /// Build a pattern-not-found error.
    pub fn pattern_not_found(identity: impl Into<String>) -> Self {
        Self::PatternNotFound(identity.into())
    }

    /// Build a storage-unavailable error.
    pub fn storage_unavailable(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    /// Build a storage-conflict error.
    pub fn storage_conflict(msg: impl Into<String>) -> Self {
        Self::StorageConflict(msg.into())
    }

    /// Build a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for errors that leave session state untouched (validation,
    /// not-found, expired, empty-STM).
    pub fn is_state_preserving(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::SessionNotFound(_)
                | Self::SessionExpired(_)
                | Self::EmptyStm
                | Self::PatternNotFound(_)
        )
    }

    /// True for errors where a client retry, possibly with backoff, may
    /// succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::StorageConflict(_))
    }
}
