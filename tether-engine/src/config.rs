//! Tunables for both engines.
//!
//! Every duration and budget the engines use lives here so tests and the
//! agent CLI can shrink or stretch them. `Default` carries the production
//! values.

use std::time::Duration;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EngineConfig {
    // ---
    /// How long a disconnect with a persisted record is still reported as
    /// connected. Long enough to cover a slow session restoration handshake,
    /// short enough to bound how stale the UI can get.
    pub grace_period: Duration,

    /// Delay from grace-period start to the single reconnect trigger.
    pub reconnect_delay: Duration,

    /// Settle time between the storage purge and each reconnect attempt.
    pub cooldown: Duration,

    /// Reconnect attempts per recovery episode before giving up.
    pub max_attempts: u32,

    /// How long the signature of an episode that gave up suppresses
    /// identical errors. A recovered episode clears it at once.
    pub signature_ttl: Duration,

    /// Period of the stale-session sweep. The first sweep runs at start.
    /// Zero is raised to one millisecond.
    pub sweep_interval: Duration,

    /// Ceiling on one operation wrapped by `with_session_recovery`.
    pub operation_timeout: Duration,

    /// Retries `with_session_recovery` grants after a recovered failure.
    pub operation_retries: u32,

    /// Pause between a recovery and the retried operation.
    pub operation_retry_delay: Duration,
}

// ---

impl Default for EngineConfig {
    fn default() -> Self {
        // ---
        Self {
            grace_period: Duration::from_secs(12),
            reconnect_delay: Duration::from_millis(500),
            cooldown: Duration::from_millis(500),
            max_attempts: 3,
            signature_ttl: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(5 * 60),
            operation_timeout: Duration::from_secs(60),
            operation_retries: 1,
            operation_retry_delay: Duration::from_secs(1),
        }
    }
}
