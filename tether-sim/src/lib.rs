//! In-process collaborators for tether unit and integration testing.
//!
//! [`SimProvider`] implements [`tether_domain::ConnectionProvider`] and
//! [`tether_domain::FaultSource`] with tokio channels instead of a real
//! wallet SDK. [`SimConfig`] controls how it answers `reconnect()`:
//!
//! - Reconnect latency
//! - Whether in-flight reconnects are announced as `Reconnecting`
//! - Failure probability with a deterministic RNG seed
//! - The address restored on success (none = the call resolves but nothing
//!   is restored)
//!
//! Individual calls can be scripted with [`SimProvider::script_reconnect`].
//! [`MemoryStore`] and [`RecordingSink`] stand in for browser storage and
//! the toast layer.
//!
//! # Quick start
//!
//! ```rust
//! use tether_sim::{MemoryStore, SimConfig, SimProvider};
//!
//! let provider = SimProvider::new(SimConfig::restoring("0xABC"));
//! let store = MemoryStore::new();
//! store.persist_connection("0xABC", "walletConnect");
//! ```

mod config;
mod provider;
mod sink;
mod store;

// --- public API
pub use config::SimConfig;
pub use provider::{ReconnectOutcome, SimProvider};
pub use sink::RecordingSink;
pub use store::{persisted_store_json, MemoryStore};
