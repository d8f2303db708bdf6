//! [`RecoveryEngine`] detects corrupted session state and drives the
//! provider back to a clean, reconnectable state.
//!
//! # Episode
//!
//! ```text
//! Idle ─► ErrorDetected ─► Disconnecting ─► PurgingStorage
//!                                               │
//!              ┌────────────────────────────────┘
//!              ▼
//!         CoolingDown ─► Reconnecting ─┬─► Recovered
//!              ▲                       │
//!              └──── attempt < max ◄───┴─► Exhausted (attempt == max)
//! ```
//!
//! Episodes run inline on the engine task, so at most one is ever in
//! flight and no second reconnect can be issued while one is outstanding.
//! Faults and commands that arrive meanwhile queue up behind it.
//!
//! # Deduplication
//!
//! The message text of a handled fault is its signature. Identical faults
//! that queued up while its episode ran are dropped when it ends. A
//! recovered episode clears the signature, so the same error raised later
//! starts a fresh episode. An episode that gives up keeps it: the same
//! signature is ignored from then on, and a distinct session error,
//! [`RecoveryHandle::force_reconnect`], [`RecoveryHandle::clear_session`]
//! or a confirmed connection lifts the exhaustion.
//!
//! # Sweep
//!
//! The engine also owns the stale-session sweep: once at start, then every
//! `sweep_interval`.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

// ---

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

// ---

use tether_domain::{
    // ---
    ConnectionProviderPtr,
    ConnectionSnapshot,
    FaultSourcePtr,
    Notification,
    NotificationSinkPtr,
    ProviderFault,
    Result,
    SessionNamespace,
    SessionStorePtr,
    TetherError,
};

// ---

use super::{classify, is_session_error, sweep_store_now, EngineConfig, FaultClass};

// ---

/// Floor for the sweep period; `tokio::time::interval` rejects zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

const MSG_RECOVERING: &str = "Recovering wallet connection...";
const MSG_RECOVERED: &str = "Wallet connection recovered";
const MSG_EXHAUSTED: &str = "Unable to reconnect wallet. Please reconnect your wallet manually.";

// ---------------------------------------------------------------------------
// RecoveryPhase / RecoveryStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryPhase {
    // ---
    #[default]
    Idle,
    ErrorDetected,
    Disconnecting,
    PurgingStorage,
    CoolingDown,
    Reconnecting,
    Recovered,
    Exhausted,
}

// ---

impl RecoveryPhase {
    // ---
    /// `true` while an episode is in flight.
    pub fn is_recovering(self) -> bool {
        matches!(
            self,
            RecoveryPhase::ErrorDetected
                | RecoveryPhase::Disconnecting
                | RecoveryPhase::PurgingStorage
                | RecoveryPhase::CoolingDown
                | RecoveryPhase::Reconnecting
        )
    }
}

// ---

/// Read model published on every phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoveryStatus {
    // ---
    pub phase: RecoveryPhase,

    /// Failed reconnects in the current episode.
    pub attempts: u32,
}

// ---

/// How an episode (or a forced reconnect) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Recovered,
    Exhausted,
}

// ---------------------------------------------------------------------------
// RecoveryCmd
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum RecoveryCmd {
    // ---
    ClearSession {
        reply: oneshot::Sender<usize>,
    },

    ForceReconnect {
        reply: oneshot::Sender<RecoveryOutcome>,
    },

    /// Run an episode for a failure the caller observed directly.
    /// Replies `None` when the failure was suppressed.
    Recover {
        reason: String,
        reply: oneshot::Sender<Option<RecoveryOutcome>>,
    },
}

// ---------------------------------------------------------------------------
// AttemptCounter
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct AttemptCounter {
    // ---
    count: u32,

    /// Signature of the last admitted failure.
    last_signature: Option<String>,

    /// End of the suppression window for `last_signature`.
    /// `None` while its episode is still running.
    signature_clear_at: Option<Instant>,

    exhausted: bool,
}

// ---

impl AttemptCounter {
    // ---
    /// Decide whether a failure with `signature` starts an episode.
    fn admit(&mut self, signature: &str, now: Instant) -> bool {
        // ---
        let same = self.last_signature.as_deref() == Some(signature);

        if self.exhausted {
            if same {
                return false;
            }
            self.reset();
        } else if same && self.signature_clear_at.map_or(true, |t| now < t) {
            return false;
        }

        self.last_signature = Some(signature.to_string());
        self.signature_clear_at = None;
        true
    }

    /// Zero the budget and lift exhaustion. The suppression window stays.
    fn reset(&mut self) {
        self.count = 0;
        self.exhausted = false;
    }

    /// Forget the last signature so the same failure is admitted again.
    fn clear_signature(&mut self) {
        self.last_signature = None;
        self.signature_clear_at = None;
    }
}

// ---------------------------------------------------------------------------
// RecoveryEngine
// ---------------------------------------------------------------------------

pub struct RecoveryEngine {
    // ---
    provider: ConnectionProviderPtr,
    store: SessionStorePtr,
    namespace: SessionNamespace,
    sink: NotificationSinkPtr,
    config: EngineConfig,

    counter: AttemptCounter,

    fault_rx: broadcast::Receiver<ProviderFault>,
    /// Distinct faults pulled off `fault_rx` while dropping duplicates.
    backlog: VecDeque<ProviderFault>,
    status_rx: watch::Receiver<ConnectionSnapshot>,
    cmd_rx: mpsc::Receiver<RecoveryCmd>,
    status_tx: watch::Sender<RecoveryStatus>,
}

// ---

impl RecoveryEngine {
    // ---

    /// Build the engine and its handle. Faults raised from here on are
    /// buffered until [`RecoveryEngine::run`] starts.
    pub fn new(
        provider: ConnectionProviderPtr,
        faults: FaultSourcePtr,
        store: SessionStorePtr,
        namespace: SessionNamespace,
        sink: NotificationSinkPtr,
        config: EngineConfig,
    ) -> (Self, RecoveryHandle) {
        // ---
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (status_tx, status_rx) = watch::channel(RecoveryStatus::default());

        let handle = RecoveryHandle {
            cmd_tx,
            status_rx,
            config: config.clone(),
        };

        let engine = Self {
            fault_rx: faults.subscribe_faults(),
            backlog: VecDeque::new(),
            status_rx: provider.status_rx(),
            provider,
            store,
            namespace,
            sink,
            config,
            counter: AttemptCounter::default(),
            cmd_rx,
            status_tx,
        };

        (engine, handle)
    }

    // ---

    /// Drive the engine until the provider's fault or status channel
    /// closes. Spawn with `tokio::spawn`.
    pub async fn run(mut self) {
        // ---
        let period = self.config.sweep_interval.max(MIN_SWEEP_INTERVAL);
        let mut sweep = tokio::time::interval(period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            while let Some(fault) = self.backlog.pop_front() {
                self.on_fault(fault).await;
            }

            tokio::select! {
                fault = self.fault_rx.recv() => match fault {
                    Ok(fault) => self.on_fault(fault).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "fault receiver lagged — faults dropped");
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("fault channel closed — recovery engine exiting");
                        break;
                    }
                },

                changed = self.status_rx.changed() => {
                    if changed.is_err() {
                        tracing::info!("status channel closed — recovery engine exiting");
                        break;
                    }
                    let confirmed = self.status_rx.borrow_and_update().is_confirmed();
                    if confirmed {
                        self.on_confirmed();
                    }
                }

                Some(cmd) = self.cmd_rx.recv() => self.on_command(cmd).await,

                _ = sweep.tick() => {
                    sweep_store_now(self.store.as_ref(), &self.namespace);
                }
            }
        }
    }

    // ---

    async fn on_fault(&mut self, fault: ProviderFault) {
        // ---
        match classify(&fault.message) {
            FaultClass::Unclassified => {
                tracing::debug!(message = %fault.message, "provider fault not session related — ignored");
            }
            FaultClass::SessionCorruption => {
                self.try_episode(&fault.message).await;
            }
        }
    }

    // ---

    fn on_confirmed(&mut self) {
        // ---
        self.counter.clear_signature();
        if self.counter.count == 0 && !self.counter.exhausted {
            return;
        }
        tracing::info!(
            attempts = self.counter.count,
            exhausted = self.counter.exhausted,
            "connection confirmed — recovery counter reset",
        );
        let was_exhausted = self.counter.exhausted;
        self.counter.reset();
        if was_exhausted {
            self.set_phase(RecoveryPhase::Idle);
        } else {
            self.publish();
        }
    }

    // ---

    async fn on_command(&mut self, cmd: RecoveryCmd) {
        // ---
        match cmd {
            RecoveryCmd::ClearSession { reply } => {
                let removed = self.clear_session().await;
                let _ = reply.send(removed);
            }
            RecoveryCmd::ForceReconnect { reply } => {
                let outcome = self.force_reconnect().await;
                let _ = reply.send(outcome);
            }
            RecoveryCmd::Recover { reason, reply } => {
                let outcome = self.try_episode(&reason).await;
                let _ = reply.send(outcome);
            }
        }
    }

    // ---

    /// Run an episode for `signature` unless it is suppressed.
    async fn try_episode(&mut self, signature: &str) -> Option<RecoveryOutcome> {
        // ---
        if !self.counter.admit(signature, Instant::now()) {
            tracing::debug!(
                signature,
                exhausted = self.counter.exhausted,
                "duplicate session error suppressed",
            );
            return None;
        }

        let outcome = self.episode(signature).await;
        self.drop_queued_duplicates(signature);
        if self.counter.last_signature.is_some() {
            self.counter.signature_clear_at = Some(Instant::now() + self.config.signature_ttl);
        }
        Some(outcome)
    }

    // ---

    /// Drain faults raised while an episode ran. Copies of `signature` are
    /// dropped; anything else is kept for the run loop.
    fn drop_queued_duplicates(&mut self, signature: &str) {
        // ---
        let mut dropped = 0usize;
        loop {
            match self.fault_rx.try_recv() {
                Ok(fault) if fault.message == signature => dropped += 1,
                Ok(fault) => self.backlog.push_back(fault),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "fault receiver lagged — faults dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        if dropped > 0 {
            tracing::debug!(signature, dropped, "queued duplicates of handled fault dropped");
        }
    }

    // ---

    async fn episode(&mut self, reason: &str) -> RecoveryOutcome {
        // ---
        let episode = Uuid::new_v4();
        self.set_phase(RecoveryPhase::ErrorDetected);
        tracing::warn!(%episode, reason, "session corruption detected — recovering");
        self.sink.notify(Notification::Info(MSG_RECOVERING.into()));

        self.disconnect_if_connected(episode).await;
        self.purge(episode);
        self.reconnect_until_settled(episode, true).await
    }

    // ---

    async fn force_reconnect(&mut self) -> RecoveryOutcome {
        // ---
        let episode = Uuid::new_v4();
        tracing::info!(%episode, "forced reconnect requested");
        self.counter.reset();
        self.reconnect_until_settled(episode, false).await
    }

    // ---

    async fn clear_session(&mut self) -> usize {
        // ---
        let episode = Uuid::new_v4();
        tracing::info!(%episode, "manual session clear requested");

        self.disconnect_if_connected(episode).await;
        let removed = self.purge(episode);

        self.counter.reset();
        self.set_phase(RecoveryPhase::Idle);
        self.sink.notify(Notification::SessionCleared { removed });
        removed
    }

    // ---

    async fn disconnect_if_connected(&mut self, episode: Uuid) {
        // ---
        if !self.provider.snapshot().is_connected() {
            return;
        }

        self.set_phase(RecoveryPhase::Disconnecting);
        if let Err(e) = self.provider.disconnect().await {
            tracing::warn!(%episode, "disconnect failed, continuing: {e}");
        }
    }

    // ---

    /// Remove every namespaced key. Returns the number actually removed.
    fn purge(&mut self, episode: Uuid) -> usize {
        // ---
        self.set_phase(RecoveryPhase::PurgingStorage);

        let mut removed = 0;
        for key in self.namespace.keys_in(self.store.as_ref()) {
            match self.store.remove(&key) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(%episode, %key, "purge: remove failed: {e}"),
            }
        }

        tracing::info!(%episode, removed, "session storage purged");
        removed
    }

    // ---

    /// Reconnect until success or the attempt budget is spent.
    async fn reconnect_until_settled(&mut self, episode: Uuid, cool_first: bool) -> RecoveryOutcome {
        // ---
        let mut cool = cool_first;

        loop {
            if cool {
                self.set_phase(RecoveryPhase::CoolingDown);
                tokio::time::sleep(self.config.cooldown).await;
            }
            cool = true;

            self.set_phase(RecoveryPhase::Reconnecting);
            match self.provider.reconnect().await {
                Ok(()) => {
                    tracing::info!(%episode, "session recovered");
                    self.counter.reset();
                    self.counter.clear_signature();
                    self.set_phase(RecoveryPhase::Recovered);
                    self.sink.notify(Notification::Success(MSG_RECOVERED.into()));
                    return RecoveryOutcome::Recovered;
                }
                Err(e) => {
                    self.counter.count += 1;
                    tracing::warn!(
                        %episode,
                        attempt = self.counter.count,
                        max_attempts = self.config.max_attempts,
                        "recovery reconnect failed: {e}",
                    );
                }
            }

            if self.counter.count >= self.config.max_attempts {
                self.counter.exhausted = true;
                tracing::error!(%episode, attempts = self.counter.count, "recovery exhausted");
                self.set_phase(RecoveryPhase::Exhausted);
                self.sink.notify(Notification::Error(MSG_EXHAUSTED.into()));
                return RecoveryOutcome::Exhausted;
            }
        }
    }

    // ---

    fn set_phase(&self, phase: RecoveryPhase) {
        // ---
        let attempts = self.counter.count;
        self.status_tx.send_replace(RecoveryStatus { phase, attempts });
    }

    /// Republish the current phase with a fresh attempt count.
    fn publish(&self) {
        let phase = self.status_tx.borrow().phase;
        self.set_phase(phase);
    }
}

// ---------------------------------------------------------------------------
// RecoveryHandle
// ---------------------------------------------------------------------------

/// Cheap-clone handle to a running [`RecoveryEngine`].
#[derive(Clone)]
pub struct RecoveryHandle {
    // ---
    cmd_tx: mpsc::Sender<RecoveryCmd>,
    status_rx: watch::Receiver<RecoveryStatus>,
    config: EngineConfig,
}

// ---

impl RecoveryHandle {
    // ---

    /// Current phase and attempt count.
    pub fn status(&self) -> RecoveryStatus {
        *self.status_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RecoveryStatus> {
        self.status_rx.clone()
    }

    // ---

    /// Disconnect (if connected) and purge the session namespace,
    /// independent of any detected error. Returns the number of entries
    /// removed.
    pub async fn clear_session(&self) -> Result<usize> {
        // ---
        let (reply, rx) = oneshot::channel();
        self.send(RecoveryCmd::ClearSession { reply }).await?;
        rx.await.map_err(|_| TetherError::EngineStopped)
    }

    /// Zero the attempt budget and reconnect immediately, even when
    /// exhausted.
    pub async fn force_reconnect(&self) -> Result<RecoveryOutcome> {
        // ---
        let (reply, rx) = oneshot::channel();
        self.send(RecoveryCmd::ForceReconnect { reply }).await?;
        rx.await.map_err(|_| TetherError::EngineStopped)
    }

    /// Run a recovery episode for a failure observed outside the fault
    /// channel. `Ok(None)` means it was suppressed as a duplicate.
    pub async fn recover(&self, reason: impl Into<String>) -> Result<Option<RecoveryOutcome>> {
        // ---
        let (reply, rx) = oneshot::channel();
        self.send(RecoveryCmd::Recover {
            reason: reason.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| TetherError::EngineStopped)
    }

    // ---

    /// Run `op` under the operation timeout. A session error or a timeout
    /// triggers recovery, a pause, and a retry, up to `operation_retries`
    /// times. Any other error is returned unchanged.
    pub async fn with_session_recovery<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // ---
        let timeout = self.config.operation_timeout;
        let mut retries_left = self.config.operation_retries;

        loop {
            let err = match tokio::time::timeout(timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if is_session_error(&e.message()) => e,
                Ok(Err(e)) => return Err(e),
                Err(_) => TetherError::Timeout(timeout),
            };

            if retries_left == 0 {
                return Err(err);
            }
            retries_left -= 1;

            tracing::warn!(retries_left, "operation failed, recovering before retry: {err}");
            self.recover(err.message()).await?;
            tokio::time::sleep(self.config.operation_retry_delay).await;
        }
    }

    // ---

    async fn send(&self, cmd: RecoveryCmd) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| TetherError::EngineStopped)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tether_domain::ConnectionProvider;
    use tether_sim::{MemoryStore, ReconnectOutcome, RecordingSink, SimConfig, SimProvider};

    use super::*;

    // ---

    struct Rig {
        sim: Arc<SimProvider>,
        store: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
        handle: RecoveryHandle,
    }

    fn rig(config: SimConfig) -> Rig {
        rig_with(config, EngineConfig::default())
    }

    fn rig_with(config: SimConfig, engine_config: EngineConfig) -> Rig {
        // ---
        let sim = Arc::new(SimProvider::new(config));
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::new());
        let (engine, handle) = RecoveryEngine::new(
            sim.clone(),
            sim.clone(),
            store.clone(),
            SessionNamespace::default(),
            sink.clone(),
            engine_config,
        );
        tokio::spawn(engine.run());
        Rig {
            sim,
            store,
            sink,
            handle,
        }
    }

    /// A connected session with the usual provider keys plus one
    /// unrelated app key.
    fn seed_session(rig: &Rig, address: &str) {
        // ---
        rig.sim.connect(address);
        rig.store.persist_connection(address, "walletConnect");
        rig.store.insert("wc@2:client:0.3//session", r#"[{"topic":"abc123"}]"#);
        rig.store.insert("wc@2:core:0.3//keychain", r#"{"abc123":"deadbeef"}"#);
        rig.store.insert("WALLETCONNECT_DEEPLINK_CHOICE", r#""metamask""#);
        rig.store.insert("theme", "dark");
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // ---

    #[test]
    fn counter_suppresses_duplicates_inside_window() {
        // ---
        let start = Instant::now();
        let mut counter = AttemptCounter::default();

        assert!(counter.admit("no matching key", start));
        assert!(!counter.admit("no matching key", start), "in-flight duplicate");

        counter.signature_clear_at = Some(start + Duration::from_secs(5));
        assert!(!counter.admit("no matching key", start + Duration::from_secs(4)));
        assert!(counter.admit("no matching key", start + Duration::from_secs(6)));
    }

    #[test]
    fn exhausted_counter_waits_for_a_distinct_error() {
        // ---
        let start = Instant::now();
        let mut counter = AttemptCounter {
            count: 3,
            last_signature: Some("session not found".into()),
            signature_clear_at: Some(start),
            exhausted: true,
        };

        let later = start + Duration::from_secs(60);
        assert!(!counter.admit("session not found", later));
        assert!(counter.admit("pairing expired", later));
        assert_eq!(counter.count, 0);
        assert!(!counter.exhausted);
    }

    // ---

    #[tokio::test(start_paused = true)]
    async fn corruption_while_connected_purges_and_reconnects() {
        // ---
        let rig = rig(SimConfig::restoring("0xDEF"));
        seed_session(&rig, "0xDEF");
        settle().await;

        rig.sim.raise_fault("No matching key for topic abc123");
        settle().await;

        assert_eq!(rig.sim.disconnect_calls(), 1);
        assert!(!rig.store.contains("wagmi.store"));
        assert!(!rig.store.contains("wc@2:client:0.3//session"));
        assert!(!rig.store.contains("wc@2:core:0.3//keychain"));
        assert!(!rig.store.contains("WALLETCONNECT_DEEPLINK_CHOICE"));
        assert!(rig.store.contains("theme"));
        assert_eq!(rig.handle.status().phase, RecoveryPhase::CoolingDown);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rig.sim.reconnect_calls(), 0, "reconnect before cooldown");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(rig.sim.reconnect_calls(), 1);
        assert_eq!(
            rig.handle.status(),
            RecoveryStatus {
                phase: RecoveryPhase::Recovered,
                attempts: 0,
            }
        );
        assert_eq!(
            rig.sink.notifications(),
            vec![
                Notification::Info(MSG_RECOVERING.into()),
                Notification::Success(MSG_RECOVERED.into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn identical_errors_run_one_episode() {
        // ---
        let rig = rig(SimConfig::restoring("0xDEF"));
        seed_session(&rig, "0xDEF");
        settle().await;

        rig.sim.raise_fault("No matching key for topic abc123");
        rig.sim.raise_fault("No matching key for topic abc123");
        rig.sim.raise_fault("No matching key for topic abc123");
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(rig.sim.disconnect_calls(), 1);
        assert_eq!(rig.sim.reconnect_calls(), 1);
        assert_eq!(rig.sink.successes(), 1);
        assert_eq!(rig.handle.status().phase, RecoveryPhase::Recovered);
    }

    #[tokio::test(start_paused = true)]
    async fn same_error_after_recovery_starts_new_episode() {
        // ---
        let rig = rig(SimConfig::restoring("0xDEF"));
        seed_session(&rig, "0xDEF");
        settle().await;

        rig.sim.raise_fault("No matching key for topic abc123");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rig.sim.reconnect_calls(), 1);
        assert!(rig.sim.snapshot().is_confirmed());

        // Well inside signature_ttl, but the first episode recovered.
        rig.sim.raise_fault("No matching key for topic abc123");
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(rig.sim.disconnect_calls(), 2);
        assert_eq!(rig.sim.reconnect_calls(), 2);
        assert_eq!(rig.sink.successes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_error_queued_during_episode_still_runs() {
        // ---
        let rig = rig(SimConfig::restoring("0xDEF"));
        seed_session(&rig, "0xDEF");
        settle().await;

        rig.sim.raise_fault("No matching key for topic abc123");
        rig.sim.raise_fault("No matching key for topic abc123");
        rig.sim.raise_fault("Pairing expired");
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(rig.sim.reconnect_calls(), 2);
        assert_eq!(rig.sink.successes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unclassified_faults_are_only_logged() {
        // ---
        let rig = rig(SimConfig::restoring("0xDEF"));
        seed_session(&rig, "0xDEF");
        settle().await;

        rig.sim.raise_fault("User rejected the request.");
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(rig.sim.disconnect_calls(), 0);
        assert_eq!(rig.sim.reconnect_calls(), 0);
        assert!(rig.store.contains("wagmi.store"));
        assert!(rig.sink.notifications().is_empty());
        assert_eq!(rig.handle.status().phase, RecoveryPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_retries_then_exhausted() {
        // ---
        let rig = rig(SimConfig::unresponsive());
        for _ in 0..3 {
            rig.sim
                .script_reconnect(ReconnectOutcome::Reject("relay unreachable".into()));
        }
        settle().await;

        rig.sim.raise_fault("Session not found");
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(rig.sim.reconnect_calls(), 3);
        assert_eq!(rig.sink.errors(), 1);
        assert_eq!(
            rig.handle.status(),
            RecoveryStatus {
                phase: RecoveryPhase::Exhausted,
                attempts: 3,
            }
        );

        // Same error, long after the suppression window: still exhausted.
        tokio::time::sleep(Duration::from_secs(10)).await;
        rig.sim.raise_fault("Session not found");
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(rig.sim.reconnect_calls(), 3);

        // A distinct error opens a fresh episode. Script is drained, so the
        // unresponsive default answers Ok.
        rig.sim.raise_fault("Pairing expired");
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(rig.sim.reconnect_calls(), 4);
        assert_eq!(rig.handle.status().phase, RecoveryPhase::Recovered);
        assert_eq!(rig.sink.errors(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn force_reconnect_lifts_exhaustion() {
        // ---
        let rig = rig(SimConfig::restoring("0xABC"));
        for _ in 0..3 {
            rig.sim
                .script_reconnect(ReconnectOutcome::Reject("relay unreachable".into()));
        }
        settle().await;

        rig.sim.raise_fault("invalid session");
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(rig.handle.status().phase, RecoveryPhase::Exhausted);

        let outcome = rig.handle.force_reconnect().await.unwrap();
        assert_eq!(outcome, RecoveryOutcome::Recovered);
        assert_eq!(rig.sim.reconnect_calls(), 4);
        assert_eq!(rig.handle.status().attempts, 0);
        assert!(rig.sim.snapshot().is_confirmed());
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_connection_resets_exhaustion() {
        // ---
        let rig = rig(SimConfig::unresponsive());
        for _ in 0..3 {
            rig.sim
                .script_reconnect(ReconnectOutcome::Reject("relay unreachable".into()));
        }
        settle().await;

        rig.sim.raise_fault("session not found");
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(rig.handle.status().phase, RecoveryPhase::Exhausted);

        // User reconnects by hand.
        rig.sim.connect("0xABC");
        settle().await;
        assert_eq!(
            rig.handle.status(),
            RecoveryStatus {
                phase: RecoveryPhase::Idle,
                attempts: 0,
            }
        );

        // The confirmation also forgot the old signature.
        rig.sim.raise_fault("session not found");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(rig.sim.reconnect_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_failure_does_not_stop_recovery() {
        // ---
        let rig = rig(SimConfig::restoring("0xDEF"));
        seed_session(&rig, "0xDEF");
        rig.sim.fail_disconnect(Some("relay gone".into()));
        settle().await;

        rig.sim.raise_fault("no pair found");
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(rig.sim.disconnect_calls(), 1);
        assert!(!rig.store.contains("wagmi.store"));
        assert_eq!(rig.sim.reconnect_calls(), 1);
        assert_eq!(rig.sink.successes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_session_reports_removed_count() {
        // ---
        let rig = rig(SimConfig::unresponsive());
        seed_session(&rig, "0xDEF");
        settle().await;

        let removed = rig.handle.clear_session().await.unwrap();

        assert_eq!(removed, 4);
        assert_eq!(rig.sim.disconnect_calls(), 1);
        assert_eq!(rig.sim.reconnect_calls(), 0);
        assert_eq!(rig.store.len(), 1);
        assert_eq!(
            rig.sink.notifications(),
            vec![Notification::SessionCleared { removed: 4 }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn startup_sweep_removes_corrupted_entries() {
        // ---
        let rig = rig(SimConfig::unresponsive());
        rig.store.insert("wc@2:core:0.3//messages", "{oops");
        rig.store.insert("wc@2:core:0.3//pairing", r#"{"expiry":1}"#);
        rig.store.persist_connection("0xABC", "walletConnect");
        settle().await;

        assert!(!rig.store.contains("wc@2:core:0.3//messages"));
        assert!(!rig.store.contains("wc@2:core:0.3//pairing"));
        assert!(rig.store.contains("wagmi.store"));
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_sweep_removes_entries_that_go_bad() {
        // ---
        let rig = rig(SimConfig::unresponsive());
        rig.store.persist_connection("0xABC", "walletConnect");
        settle().await;

        rig.store.insert("wc@2:core:0.3//messages", "{oops");
        rig.store.insert("wc@2:core:0.3//pairing", r#"{"expiry":1}"#);

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(rig.store.contains("wc@2:core:0.3//messages"));
        assert!(rig.store.contains("wc@2:core:0.3//pairing"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!rig.store.contains("wc@2:core:0.3//messages"));
        assert!(!rig.store.contains("wc@2:core:0.3//pairing"));
        assert!(rig.store.contains("wagmi.store"));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_sweep_interval_is_clamped() {
        // ---
        let config = EngineConfig {
            sweep_interval: Duration::ZERO,
            ..EngineConfig::default()
        };
        let rig = rig_with(SimConfig::unresponsive(), config);
        settle().await;

        rig.store.insert("wc@2:core:0.3//messages", "{oops");
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(!rig.store.contains("wc@2:core:0.3//messages"));
        assert_eq!(rig.handle.status().phase, RecoveryPhase::Idle);
    }

    // ---

    #[tokio::test(start_paused = true)]
    async fn wrapped_operation_retries_after_recovery() {
        // ---
        let rig = rig(SimConfig::restoring("0xDEF"));
        seed_session(&rig, "0xDEF");
        settle().await;

        let calls = Arc::new(AtomicUsize::new(0));
        let result = rig
            .handle
            .with_session_recovery(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(TetherError::Provider(
                            "Missing or invalid. Session topic doesn't exist".into(),
                        ))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(rig.sim.reconnect_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wrapped_operation_passes_other_errors_through() {
        // ---
        let rig = rig(SimConfig::restoring("0xDEF"));
        settle().await;

        let calls = Arc::new(AtomicUsize::new(0));
        let result: Result<()> = rig
            .handle
            .with_session_recovery(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TetherError::Provider("execution reverted".into()))
                }
            })
            .await;

        assert_eq!(result.unwrap_err().message(), "execution reverted");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rig.sim.reconnect_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wrapped_operation_times_out() {
        // ---
        let rig = rig(SimConfig::restoring("0xDEF"));
        settle().await;

        let result: Result<()> = rig
            .handle
            .with_session_recovery(|| async {
                tokio::time::sleep(Duration::from_secs(120)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(TetherError::Timeout(_))));
        assert_eq!(rig.sim.reconnect_calls(), 1, "one recovery between attempts");
    }
}
