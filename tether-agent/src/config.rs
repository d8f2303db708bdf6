//! CLI configuration for `tether-agent`.
//!
//! Run modes:
//!   tether-agent [--grace-secs 12] grace [--address 0xABC] [--restore]
//!   tether-agent [--cooldown-ms 500] corruption [--address 0xDEF]
//!   tether-agent [--max-attempts 3] exhaustion [--address 0xDEF]

use std::time::Duration;

use clap::{Parser, Subcommand};

// ---

use tether_engine::EngineConfig;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(
    name = "tether-agent",
    about = "Drive the tether engines against a simulated wallet provider"
)]
pub struct Config {
    // ---
    #[command(subcommand)]
    pub scenario: Scenario,

    /// How long a disconnect with a persisted session is still reported as
    /// connected.
    #[arg(long, default_value_t = 12)]
    pub grace_secs: u64,

    /// Settle time between the storage purge and each recovery reconnect.
    #[arg(long, default_value_t = 500)]
    pub cooldown_ms: u64,

    /// Reconnect attempts per recovery episode before giving up.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: u32,

    /// Period of the stale-session sweep.
    #[arg(long, default_value_t = 300)]
    pub sweep_interval_secs: u64,
}

// ---

impl Config {
    // ---
    /// Engine tunables with the CLI overrides applied.
    pub fn engine_config(&self) -> EngineConfig {
        // ---
        EngineConfig {
            grace_period: Duration::from_secs(self.grace_secs),
            cooldown: Duration::from_millis(self.cooldown_ms),
            max_attempts: self.max_attempts,
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
            ..EngineConfig::default()
        }
    }
}

// ---

#[derive(Debug, Clone, Subcommand)]
pub enum Scenario {
    // ---
    /// Drop the connection with a persisted session and watch the grace
    /// period hold the connected view.
    Grace {
        #[arg(long, default_value = "0xABC")]
        address: String,

        /// Let the provider restore the session on the grace-period
        /// reconnect trigger instead of staying silent.
        #[arg(long)]
        restore: bool,
    },

    /// Raise a session-corruption fault while connected and watch the
    /// purge-and-reconnect episode.
    Corruption {
        #[arg(long, default_value = "0xDEF")]
        address: String,
    },

    /// Reject every recovery reconnect until the attempt budget is spent,
    /// then force a reconnect.
    Exhaustion {
        #[arg(long, default_value = "0xDEF")]
        address: String,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
