//! Core types and collaborator traits for the tether connection layer.
//!
//! This crate defines the vocabulary of the system. The engines, the
//! simulator and the agent all speak its types. No engine logic lives here.
//!
//! # Structure
//!
//! - `error`    : [`TetherError`] and [`Result<T>`] alias
//! - `status`   : [`RawStatus`], [`Address`], [`ConnectionSnapshot`]
//! - `session`  : [`PersistedSessionRecord`], [`EffectiveConnectionState`]
//! - `provider` : [`ConnectionProvider`], [`FaultSource`] traits
//! - `store`    : [`SessionStore`] trait and [`SessionNamespace`] key layout
//! - `notify`   : [`Notification`] and the [`NotificationSink`] trait

mod error;
mod notify;
mod provider;
mod session;
mod status;
mod store;

// --- error
pub use error::{Result, TetherError};

// --- status
pub use status::{Address, ConnectionSnapshot, RawStatus};

// --- session
pub use session::{EffectiveConnectionState, PersistedSessionRecord};

// --- provider
pub use provider::{
    // ---
    ConnectionProvider,
    ConnectionProviderPtr,
    FaultSource,
    FaultSourcePtr,
    ProviderFault,
};

// --- store
pub use store::{SessionNamespace, SessionStore, SessionStorePtr};

// --- notify
pub use notify::{Notification, NotificationSink, NotificationSinkPtr};
