//! The KATO sequence-memory and prediction engine (§1-§9): turns a stream of
//! observations into learned patterns and ranked predictions of what comes
//! next, deterministically and reproducibly across process restarts.
//!
//! # Architecture
//!
//! Observations flow through a pipeline of pure, testable components
//! orchestrated by a session-locked manager:
//!
//! 1. **SymbolBinder**: binds raw vectors to stable symbolic tokens via
//!    nearest-neighbor lookup.
//! 2. **ObservationPipeline**: folds one observation into an event, appends
//!    it to STM, and triggers auto-learn past `max_pattern_length`.
//! 3. **PatternMatcher**: aligns STM against candidate learned patterns,
//!    producing past/present/future segmentation.
//! 4. **PredictionScorer**: scores and ranks aligned candidates into the
//!    final prediction list.
//! 5. **LearningEngine**: compresses STM into a durable pattern.
//! 6. **SessionManager**: serializes the above behind a per-session lock,
//!    following load -> invoke -> store-with-CAS.
//! 7. **EngineRouter**: the stateless RPC-shaped façade in front of it all.

pub mod learning;
pub mod matcher;
pub mod observation;
pub mod router;
pub mod scorer;
pub mod session;
pub mod symbol_binder;

pub use observation::{compute_predictions, observe};
pub use router::EngineRouter;
pub use session::SessionManager;
pub use symbol_binder::SymbolBinder;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::learning::{learn, learn_window};
    pub use crate::matcher::{align, AlignedCandidate};
    pub use crate::observation::{compute_predictions, observe};
    pub use crate::router::EngineRouter;
    pub use crate::scorer::rank;
    pub use crate::session::SessionManager;
    pub use crate::symbol_binder::SymbolBinder;
    pub use kato_core::prelude::*;
}
