//! Connection stability and session recovery engines.
//!
//! Two independent actors consume the same [`tether_domain`] collaborators:
//!
//! - [`StabilityEngine`] turns the provider's raw status stream into an
//!   [`tether_domain::EffectiveConnectionState`] that holds steady through
//!   a bounded grace period while a persisted session is being restored.
//! - [`RecoveryEngine`] watches provider faults, and when one means the
//!   persisted session is corrupted, runs a disconnect, purge, cooldown and
//!   reconnect episode within a fixed attempt budget. It also runs the
//!   periodic stale-session sweep.
//!
//! Both engines are constructed explicitly and driven with
//! `tokio::spawn(engine.run())`:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tether_domain::SessionNamespace;
//! use tether_engine::{EngineConfig, RecoveryEngine, StabilityEngine};
//! use tether_sim::{MemoryStore, RecordingSink, SimConfig, SimProvider};
//!
//! # async fn demo() {
//! let provider = Arc::new(SimProvider::new(SimConfig::default()));
//! let store = Arc::new(MemoryStore::new());
//!
//! let stability = StabilityEngine::new(
//!     provider.clone(),
//!     store.clone(),
//!     SessionNamespace::default(),
//!     EngineConfig::default(),
//! );
//! let mut state_rx = stability.subscribe();
//! tokio::spawn(stability.run());
//!
//! let (recovery, handle) = RecoveryEngine::new(
//!     provider.clone(),
//!     provider,
//!     store,
//!     SessionNamespace::default(),
//!     Arc::new(RecordingSink::new()),
//!     EngineConfig::default(),
//! );
//! tokio::spawn(recovery.run());
//!
//! state_rx.changed().await.ok();
//! let _ = handle.status();
//! # }
//! ```

mod classify;
mod config;
mod persisted;
mod recovery;
mod stability;
mod sweep;
mod timer;

// --- configuration
pub use config::EngineConfig;

// --- helpers
pub use classify::{classify, is_session_error, FaultClass, SESSION_ERROR_PATTERNS};
pub use persisted::read_persisted_record;
pub use sweep::{sweep_store, sweep_store_now, SweepReport};
pub use timer::ScheduledTask;

// --- engines
pub use recovery::{
    // ---
    RecoveryEngine,
    RecoveryHandle,
    RecoveryOutcome,
    RecoveryPhase,
    RecoveryStatus,
};
pub use stability::{compute_state, StabilityEngine};
