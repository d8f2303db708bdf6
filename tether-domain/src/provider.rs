use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use super::error::Result;
use super::status::ConnectionSnapshot;

// ---------------------------------------------------------------------------
// ConnectionProvider
// ---------------------------------------------------------------------------

/// The external wallet/session provider whose status this layer smooths.
///
/// Implementations: `tether_sim::SimProvider`. Real integrations wrap a
/// provider SDK and forward its status events into the watch channel.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    // ---
    /// Current snapshot of the provider, including address and chain.
    fn snapshot(&self) -> ConnectionSnapshot;

    /// Subscribe to status changes.
    ///
    /// Use [`watch::Receiver::changed()`] to await each transition.
    fn status_rx(&self) -> watch::Receiver<ConnectionSnapshot>;

    /// Tear down the live session.
    async fn disconnect(&self) -> Result<()>;

    /// Restore a session from persisted state.
    ///
    /// May reject with a free-text message. Callers never inspect error
    /// types, only the message.
    async fn reconnect(&self) -> Result<()>;
}

// ---

/// Convenience alias for a shared [`ConnectionProvider`].
pub type ConnectionProviderPtr = Arc<dyn ConnectionProvider>;

// ---------------------------------------------------------------------------
// FaultSource
// ---------------------------------------------------------------------------

/// An asynchronous failure raised by the provider outside any call the
/// engines made (the provider's equivalent of an unhandled rejection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFault {
    // ---
    pub message: String,
}

// ---

impl ProviderFault {
    // ---
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ---

/// Injected fault-observation capability.
///
/// Replaces a process-global rejection hook so the recovery engine can be
/// driven directly in tests.
pub trait FaultSource: Send + Sync {
    // ---
    fn subscribe_faults(&self) -> broadcast::Receiver<ProviderFault>;
}

// ---

/// Convenience alias for a shared [`FaultSource`].
pub type FaultSourcePtr = Arc<dyn FaultSource>;
