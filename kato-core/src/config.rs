//! Process-wide engine configuration: defaults applied when a session does
//! not override a value, plus deployment-level knobs (session TTL, logging).
//! Per-session overrides live in [`crate::types::SessionConfig`]; this
//! module only supplies the baseline and loads it from the environment.

use crate::types::{RankSortAlgo, SessionConfig};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Prefix for environment variables recognized by [`GlobalConfig::from_env`].
pub const ENV_PREFIX: &str = "KATO_";

/// Deployment profile, mirroring the environments an operator runs the
/// engine under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigProfile {
    Dev,
    Prod,
    Test,
}

impl ConfigProfile {
    /// Read `KATO_PROFILE` from the environment, defaulting to `Dev`.
    pub fn from_env() -> Self {
        match std::env::var(format!("{ENV_PREFIX}PROFILE")).as_deref() {
            Ok("prod") | Ok("production") => Self::Prod,
            Ok("test") => Self::Test,
            _ => Self::Dev,
        }
    }
}

/// Global, process-wide configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalConfig {
    /// Baseline session config applied to newly created sessions absent an
    /// explicit override.
    pub default_session_config: SessionConfig,
    /// Sliding TTL applied to sessions on creation and on every mutating RPC
    /// (§5).
    pub session_ttl_seconds: u64,
    /// Cosine-similarity radius used by `SymbolBinder` to decide whether a
    /// vector is novel (§4.2).
    pub vector_similarity_radius: f64,
    /// Bounded attempts for optimistic-CAS retry on `StorageConflict` (§7).
    pub storage_conflict_retry_limit: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_session_config: SessionConfig::default(),
            session_ttl_seconds: 3600,
            vector_similarity_radius: 0.95,
            storage_conflict_retry_limit: 5,
        }
    }
}

impl GlobalConfig {
    /// Overlay recognized `KATO_*` environment variables on top of the
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}SESSION_TTL_SECONDS")) {
            if let Ok(parsed) = v.parse() {
                config.session_ttl_seconds = parsed;
            }
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}VECTOR_SIMILARITY_RADIUS")) {
            if let Ok(parsed) = v.parse() {
                config.vector_similarity_radius = parsed;
            }
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}RECALL_THRESHOLD")) {
            if let Ok(parsed) = v.parse() {
                config.default_session_config.recall_threshold = parsed;
            }
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}MAX_PREDICTIONS")) {
            if let Ok(parsed) = v.parse() {
                config.default_session_config.max_predictions = parsed;
            }
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}RANK_SORT_ALGO")) {
            config.default_session_config.rank_sort_algo = match v.as_str() {
                "confidence" => RankSortAlgo::Confidence,
                "evidence" => RankSortAlgo::Evidence,
                "grand_hamiltonian" => RankSortAlgo::GrandHamiltonian,
                _ => RankSortAlgo::Similarity,
            };
        }

        config
    }
}

/// Metadata describing how the active config was assembled, useful for
/// startup logging.
#[derive(Debug, Clone)]
pub struct ConfigMetadata {
    pub profile: ConfigProfile,
    pub loaded_from_env: bool,
}

/// Process-wide singleton holding the active [`GlobalConfig`].
pub struct ConfigManager {
    config: Arc<RwLock<GlobalConfig>>,
    metadata: ConfigMetadata,
}

static INSTANCE: OnceCell<ConfigManager> = OnceCell::new();

impl ConfigManager {
    /// Initialize the global singleton from the environment. Idempotent:
    /// later calls are no-ops and return the already-initialized instance.
    pub fn init_from_env() -> &'static ConfigManager {
        INSTANCE.get_or_init(|| {
            let profile = ConfigProfile::from_env();
            debug!(?profile, "loaded global config from environment");
            ConfigManager {
                config: Arc::new(RwLock::new(GlobalConfig::from_env())),
                metadata: ConfigMetadata {
                    profile,
                    loaded_from_env: true,
                },
            }
        })
    }

    /// Access the singleton, initializing it from defaults if necessary.
    pub fn global() -> &'static ConfigManager {
        INSTANCE.get_or_init(|| ConfigManager {
            config: Arc::new(RwLock::new(GlobalConfig::default())),
            metadata: ConfigMetadata {
                profile: ConfigProfile::Dev,
                loaded_from_env: false,
            },
        })
    }

    pub fn current(&self) -> GlobalConfig {
        self.config.read().clone()
    }

    pub fn metadata(&self) -> &ConfigMetadata {
        &self.metadata
    }

    /// Replace the active config, e.g. after a hot-reload trigger.
    pub fn set(&self, new_config: GlobalConfig) {
        *self.config.write() = new_config;
    }
}
