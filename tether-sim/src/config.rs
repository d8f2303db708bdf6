use std::time::Duration;

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

/// Configuration for the in-process provider simulator.
///
/// All fields default to an unresponsive provider: `reconnect()` resolves
/// after a short delay without restoring anything, which is what a real
/// provider does when its connector is not ready yet.
#[derive(Debug, Clone)]
pub struct SimConfig {
    // ---
    /// Time a `reconnect()` call spends in flight.
    pub reconnect_latency: Duration,

    /// Publish `Reconnecting` while a reconnect is in flight.
    pub announce_transitions: bool,

    /// Probability `[0.0, 1.0]` that an unscripted reconnect is rejected.
    pub failure_probability: f64,

    /// Address restored by an unscripted successful reconnect.
    /// `None` = the call succeeds but the status does not change.
    pub restore_address: Option<String>,

    /// Chain reported alongside a restored address.
    pub chain_id: Option<u64>,

    /// RNG seed for reproducible failure sequences. `None` = random.
    pub seed: Option<u64>,
}

// ---

impl Default for SimConfig {
    fn default() -> Self {
        // ---
        Self {
            reconnect_latency: Duration::from_millis(50),
            announce_transitions: true,
            failure_probability: 0.0,
            restore_address: None,
            chain_id: Some(1),
            seed: None,
        }
    }
}

// ---

impl SimConfig {
    // ---
    /// Provider that accepts reconnect calls but never restores a session.
    pub fn unresponsive() -> Self {
        Self::default()
    }

    // ---

    /// Provider that restores `address` on every reconnect.
    pub fn restoring(address: impl Into<String>) -> Self {
        // ---
        Self {
            restore_address: Some(address.into()),
            ..Default::default()
        }
    }

    // ---

    /// Provider that rejects roughly `failure_probability` of reconnects and
    /// restores `address` otherwise. Seeded for reproducible runs.
    pub fn flaky(address: impl Into<String>, failure_probability: f64, seed: u64) -> Self {
        // ---
        Self {
            failure_probability,
            restore_address: Some(address.into()),
            seed: Some(seed),
            ..Default::default()
        }
    }
}
