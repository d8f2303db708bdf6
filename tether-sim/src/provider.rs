use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ---

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{broadcast, watch};

// ---

use tether_domain::{
    // ---
    Address,
    ConnectionProvider,
    ConnectionSnapshot,
    FaultSource,
    ProviderFault,
    RawStatus,
    Result,
    TetherError,
};

// ---

use super::SimConfig;

// ---------------------------------------------------------------------------
// ReconnectOutcome
// ---------------------------------------------------------------------------

/// How the simulator answers one `reconnect()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectOutcome {
    // ---
    /// Publish `Connected` with this address and resolve `Ok`.
    Restore(Address),

    /// Publish `Disconnected` and reject with this message.
    Reject(String),

    /// Resolve `Ok` without touching the status.
    Silent,
}

// ---------------------------------------------------------------------------
// SimProvider
// ---------------------------------------------------------------------------

/// In-process connection provider.
///
/// Tests drive it with [`SimProvider::emit`] / [`SimProvider::raise_fault`]
/// and inspect the call counters afterwards.
pub struct SimProvider {
    // ---
    status_tx: watch::Sender<ConnectionSnapshot>,
    status_rx: watch::Receiver<ConnectionSnapshot>,
    fault_tx: broadcast::Sender<ProviderFault>,

    /// Outcomes consumed in order before falling back to `config`.
    script: Mutex<VecDeque<ReconnectOutcome>>,

    /// When `Some`, `disconnect()` rejects with this message.
    disconnect_error: Mutex<Option<String>>,

    rng: Mutex<StdRng>,
    reconnect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    config: SimConfig,
}

// ---

impl SimProvider {
    // ---
    /// Create a provider that starts `Disconnected`.
    pub fn new(config: SimConfig) -> Self {
        // ---
        let (status_tx, status_rx) = watch::channel(ConnectionSnapshot::disconnected());
        let (fault_tx, _) = broadcast::channel(32);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            status_tx,
            status_rx,
            fault_tx,
            script: Mutex::new(VecDeque::new()),
            disconnect_error: Mutex::new(None),
            rng: Mutex::new(rng),
            reconnect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            config,
        }
    }

    // ---

    /// Publish a new snapshot to every subscriber.
    pub fn emit(&self, snapshot: ConnectionSnapshot) {
        // ---
        tracing::debug!(status = ?snapshot.raw_status, "sim: emit");
        self.status_tx.send_replace(snapshot);
    }

    /// Publish `Connected` with `address`.
    pub fn connect(&self, address: impl Into<Address>) {
        self.emit(ConnectionSnapshot::connected(address, self.config.chain_id));
    }

    /// Publish a bare status with no address.
    pub fn set_status(&self, status: RawStatus) {
        self.emit(ConnectionSnapshot::with_status(status));
    }

    // ---

    /// Raise an asynchronous provider failure, as an SDK would through an
    /// unhandled rejection.
    pub fn raise_fault(&self, message: impl Into<String>) {
        // ---
        let fault = ProviderFault::new(message);
        if self.fault_tx.send(fault).is_err() {
            tracing::debug!("sim: fault raised with no subscribers");
        }
    }

    // ---

    /// Queue the answer for the next unscripted `reconnect()` call.
    pub fn script_reconnect(&self, outcome: ReconnectOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Make subsequent `disconnect()` calls reject (`Some`) or succeed (`None`).
    pub fn fail_disconnect(&self, message: Option<String>) {
        *self.disconnect_error.lock().unwrap() = message;
    }

    pub fn reconnect_calls(&self) -> usize {
        self.reconnect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    // ---

    fn next_outcome(&self) -> ReconnectOutcome {
        // ---
        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return outcome;
        }

        let failed = self.config.failure_probability > 0.0
            && self.rng.lock().unwrap().gen::<f64>() < self.config.failure_probability;
        if failed {
            return ReconnectOutcome::Reject("sim: reconnect rejected".into());
        }

        match &self.config.restore_address {
            Some(address) => ReconnectOutcome::Restore(Address::new(address.clone())),
            None => ReconnectOutcome::Silent,
        }
    }
}

// ---

#[async_trait]
impl ConnectionProvider for SimProvider {
    // ---
    fn snapshot(&self) -> ConnectionSnapshot {
        self.status_rx.borrow().clone()
    }

    fn status_rx(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.status_rx.clone()
    }

    async fn disconnect(&self) -> Result<()> {
        // ---
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.disconnect_error.lock().unwrap().clone() {
            return Err(TetherError::Provider(message));
        }

        self.emit(ConnectionSnapshot::disconnected());
        Ok(())
    }

    async fn reconnect(&self) -> Result<()> {
        // ---
        let call = self.reconnect_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self.next_outcome();
        tracing::debug!(call, ?outcome, "sim: reconnect");

        let announce = self.config.announce_transitions && outcome != ReconnectOutcome::Silent;
        if announce {
            self.set_status(RawStatus::Reconnecting);
        }

        tokio::time::sleep(self.config.reconnect_latency).await;

        match outcome {
            ReconnectOutcome::Restore(address) => {
                self.emit(ConnectionSnapshot::connected(address, self.config.chain_id));
                Ok(())
            }
            ReconnectOutcome::Reject(message) => {
                if announce {
                    self.set_status(RawStatus::Disconnected);
                }
                Err(TetherError::Provider(message))
            }
            ReconnectOutcome::Silent => Ok(()),
        }
    }
}

// ---

impl FaultSource for SimProvider {
    // ---
    fn subscribe_faults(&self) -> broadcast::Receiver<ProviderFault> {
        self.fault_tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
