//! Scripted scenarios against the in-process simulator.
//!
//! Each run wires a fresh [`SimProvider`] and [`MemoryStore`] to both
//! engines, starts a reporter that prints every published state change,
//! then drives the provider through one story.

use std::sync::Arc;
use std::time::Duration;

// ---

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

// ---

use tether_domain::{ConnectionProvider, ConnectionSnapshot, EffectiveConnectionState, SessionNamespace};
use tether_engine::{
    // ---
    EngineConfig,
    RecoveryEngine,
    RecoveryHandle,
    RecoveryStatus,
    StabilityEngine,
};
use tether_sim::{MemoryStore, ReconnectOutcome, SimConfig, SimProvider};

// ---

use super::{NotifyAgent, Report, Scenario};

/// Fault text a relay sends once the session topic it references is gone.
const CORRUPTION_FAULT: &str = "No matching key. session topic doesn't exist: abc123";

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// End state of one scenario run.
#[derive(Debug, Clone)]
pub struct Summary {
    // ---
    pub state: EffectiveConnectionState,
    pub recovery: RecoveryStatus,
    pub reconnect_calls: usize,
    pub disconnect_calls: usize,
    pub store_entries: usize,
}

// ---------------------------------------------------------------------------
// Rig
// ---------------------------------------------------------------------------

struct Rig {
    // ---
    sim: Arc<SimProvider>,
    store: Arc<MemoryStore>,
    handle: RecoveryHandle,
    state_rx: watch::Receiver<EffectiveConnectionState>,
    reporter: JoinHandle<()>,
    config: EngineConfig,
}

// ---

impl Rig {
    // ---
    fn start(sim_config: SimConfig, config: EngineConfig) -> Self {
        // ---
        let started = Instant::now();
        let sim = Arc::new(SimProvider::new(sim_config));
        let store = Arc::new(MemoryStore::new());
        let (notify_tx, _notify_task) = NotifyAgent::spawn(started);

        let stability = StabilityEngine::new(
            sim.clone(),
            store.clone(),
            SessionNamespace::default(),
            config.clone(),
        );
        let state_rx = stability.subscribe();
        tokio::spawn(stability.run());

        let (recovery, handle) = RecoveryEngine::new(
            sim.clone(),
            sim.clone(),
            store.clone(),
            SessionNamespace::default(),
            Arc::new(notify_tx),
            config.clone(),
        );
        tokio::spawn(recovery.run());

        let reporter = spawn_reporter(started, state_rx.clone(), handle.subscribe());

        Self {
            sim,
            store,
            handle,
            state_rx,
            reporter,
            config,
        }
    }

    /// A live session with the keys a WalletConnect relay leaves behind.
    fn seed_session(&self, address: &str) {
        // ---
        self.store.persist_connection(address, "walletConnect");
        self.store
            .insert("wc@2:client:0.3//session", r#"[{"topic":"abc123"}]"#);
        self.store
            .insert("wc@2:core:0.3//keychain", r#"{"abc123":"0f0f"}"#);
        self.sim.connect(address);
    }

    fn finish(self) -> Summary {
        // ---
        self.reporter.abort();
        Summary {
            state: self.state_rx.borrow().clone(),
            recovery: self.handle.status(),
            reconnect_calls: self.sim.reconnect_calls(),
            disconnect_calls: self.sim.disconnect_calls(),
            store_entries: self.store.len(),
        }
    }
}

// ---

fn spawn_reporter(
    started: Instant,
    mut state_rx: watch::Receiver<EffectiveConnectionState>,
    mut recovery_rx: watch::Receiver<RecoveryStatus>,
) -> JoinHandle<()> {
    // ---
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = state_rx.borrow_and_update().clone();
                    Report::state(elapsed_ms(started), &state).emit();
                }
                changed = recovery_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = *recovery_rx.borrow_and_update();
                    Report::recovery(elapsed_ms(started), &status).emit();
                }
            }
        }
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub async fn run(scenario: &Scenario, config: EngineConfig) -> anyhow::Result<Summary> {
    // ---
    tracing::info!(?scenario, "scenario starting");

    let summary = match scenario {
        Scenario::Grace { address, restore } => grace(address, *restore, config).await,
        Scenario::Corruption { address } => corruption(address, config).await,
        Scenario::Exhaustion { address } => exhaustion(address, config).await?,
    };

    tracing::info!(
        connected = summary.state.is_effectively_connected,
        phase = ?summary.recovery.phase,
        reconnects = summary.reconnect_calls,
        disconnects = summary.disconnect_calls,
        "scenario finished",
    );
    Ok(summary)
}

// ---

/// Connected, then a drop with the session still persisted.
async fn grace(address: &str, restore: bool, config: EngineConfig) -> Summary {
    // ---
    let sim_config = if restore {
        SimConfig::restoring(address)
    } else {
        SimConfig::unresponsive()
    };
    let rig = Rig::start(sim_config, config);

    rig.seed_session(address);
    tokio::time::sleep(Duration::from_secs(1)).await;

    tracing::info!("provider drops the connection");
    rig.sim.emit(ConnectionSnapshot::disconnected());

    tokio::time::sleep(rig.config.grace_period + Duration::from_secs(2)).await;
    rig.finish()
}

// ---

/// A corruption fault while connected; the provider restores on reconnect.
async fn corruption(address: &str, config: EngineConfig) -> Summary {
    // ---
    let rig = Rig::start(SimConfig::restoring(address), config);

    rig.seed_session(address);
    tokio::time::sleep(Duration::from_secs(1)).await;

    tracing::info!(fault = CORRUPTION_FAULT, "provider raises fault");
    rig.sim.raise_fault(CORRUPTION_FAULT);

    tokio::time::sleep(rig.config.cooldown + Duration::from_secs(2)).await;
    rig.finish()
}

// ---

/// Every recovery reconnect is rejected until the budget is spent; a forced
/// reconnect then restores the session.
async fn exhaustion(address: &str, config: EngineConfig) -> anyhow::Result<Summary> {
    // ---
    let rig = Rig::start(SimConfig::restoring(address), config);
    for attempt in 1..=rig.config.max_attempts {
        rig.sim.script_reconnect(ReconnectOutcome::Reject(format!(
            "relay unreachable (attempt {attempt})"
        )));
    }

    rig.seed_session(address);
    tokio::time::sleep(Duration::from_secs(1)).await;

    rig.sim.raise_fault("Session not found");
    let per_attempt = rig.config.cooldown + Duration::from_millis(100);
    tokio::time::sleep(per_attempt * rig.config.max_attempts + Duration::from_secs(1)).await;

    tracing::info!(phase = ?rig.handle.status().phase, "forcing reconnect");
    let outcome = rig.handle.force_reconnect().await?;
    tracing::info!(?outcome, connected = rig.sim.snapshot().is_confirmed(), "forced reconnect settled");

    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(rig.finish())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
