use std::fmt;

// ---------------------------------------------------------------------------
// RawStatus
// ---------------------------------------------------------------------------

/// Status exactly as reported by the connection provider.
///
/// This is the noisy signal. It flickers to `Disconnected` during page
/// navigation and slow session restoration; the stability engine smooths it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RawStatus {
    // ---
    /// No live session.
    #[default]
    Disconnected,

    /// First-time connection handshake in flight.
    Connecting,

    /// Session is live.
    Connected,

    /// Restoring a previously persisted session.
    Reconnecting,
}

// ---

impl RawStatus {
    // ---
    /// `true` while a handshake or restoration is in flight.
    pub fn is_transitioning(self) -> bool {
        matches!(self, RawStatus::Connecting | RawStatus::Reconnecting)
    }
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// Opaque account identifier reported by the provider.
///
/// The layer never interprets the contents; it only caches and forwards it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

// ---

impl Address {
    // ---
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// ConnectionSnapshot
// ---------------------------------------------------------------------------

/// One observation of the provider, published on every status change.
///
/// Ephemeral: the stability engine consumes it for one evaluation cycle and
/// never persists it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionSnapshot {
    // ---
    pub raw_status: RawStatus,

    pub address: Option<Address>,

    pub chain_id: Option<u64>,
}

// ---

impl ConnectionSnapshot {
    // ---
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connected(address: impl Into<Address>, chain_id: Option<u64>) -> Self {
        // ---
        Self {
            raw_status: RawStatus::Connected,
            address: Some(address.into()),
            chain_id,
        }
    }

    pub fn with_status(raw_status: RawStatus) -> Self {
        Self {
            raw_status,
            ..Default::default()
        }
    }

    /// Derived from `raw_status`; never stored separately.
    pub fn is_transitioning(&self) -> bool {
        self.raw_status.is_transitioning()
    }

    pub fn is_connected(&self) -> bool {
        self.raw_status == RawStatus::Connected
    }

    /// Connected with a non-empty address. This is the only state that
    /// counts as a confirmed connection for counter resets.
    pub fn is_confirmed(&self) -> bool {
        self.is_connected() && self.address.as_ref().is_some_and(|a| !a.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
