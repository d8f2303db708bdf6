//! Tether agent.
//!
//! Wires the stability and recovery engines to the in-process simulator and
//! plays one scripted scenario, printing every published state, recovery
//! phase and notification as a JSON line on stdout.
//!
//! Usage:
//!   tether-agent grace --address 0xABC
//!   tether-agent --cooldown-ms 200 corruption
//!   RUST_LOG=debug tether-agent exhaustion

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---

mod config;
mod notifier;
mod report;
mod scenario;

// ---

use config::Config;

// Gateway re-exports; siblings import via super::Symbol
pub use config::Scenario;
pub use notifier::NotifyAgent;
pub use report::Report;

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---

    let cfg = Config::parse();

    let no_color = std::env::var("EMACS").is_ok()
        || std::env::var("NO_COLOR").is_ok()
        || std::env::var("CARGO_TERM_COLOR").as_deref() == Ok("never")
        || !std::io::IsTerminal::is_terminal(&std::io::stderr());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(!no_color)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "tether-agent starting");

    let engine_config = cfg.engine_config();
    info!(
        grace_secs = engine_config.grace_period.as_secs(),
        cooldown_ms = engine_config.cooldown.as_millis() as u64,
        max_attempts = engine_config.max_attempts,
        "engine config",
    );

    tokio::select! {
        summary = scenario::run(&cfg.scenario, engine_config) => {
            let summary = summary?;
            info!(
                connected = summary.state.is_effectively_connected,
                store_entries = summary.store_entries,
                "done",
            );
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("shutting down");
        }
    }

    Ok(())
}
