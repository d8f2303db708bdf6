use super::status::Address;

// ---------------------------------------------------------------------------
// PersistedSessionRecord
// ---------------------------------------------------------------------------

/// What the persisted session store says about a previous connection.
///
/// Read fresh on every evaluation and never written by the stability engine.
/// The empty record (`Default`) is the normal "never connected" state, not
/// an error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistedSessionRecord {
    // ---
    pub has_persisted: bool,

    pub last_address: Option<Address>,

    pub connector_id: Option<String>,
}

// ---

impl PersistedSessionRecord {
    // ---
    pub fn none() -> Self {
        Self::default()
    }

    pub fn persisted(address: impl Into<Address>, connector_id: impl Into<String>) -> Self {
        // ---
        Self {
            has_persisted: true,
            last_address: Some(address.into()),
            connector_id: Some(connector_id.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// EffectiveConnectionState
// ---------------------------------------------------------------------------

/// Stabilized, UI-facing view of connectivity.
///
/// `address` is a display hint only. It is populated outside a live
/// connection solely while transitioning or inside the grace period, and
/// must never be used to authorize an action.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EffectiveConnectionState {
    // ---
    /// Raw connected, transitioning, or inside the grace period.
    pub is_effectively_connected: bool,

    /// Raw status is `Connecting` / `Reconnecting`.
    pub is_transitioning: bool,

    /// Best-known address; see the type-level note.
    pub address: Option<Address>,

    /// Unmodified provider value, for diagnostics.
    pub raw_is_connected: bool,

    /// Mirrors [`PersistedSessionRecord::has_persisted`].
    pub had_previous_connection: bool,
}
