//! [`StabilityEngine`] smooths the raw provider status into an
//! [`EffectiveConnectionState`] that does not flicker during session
//! restoration.
//!
//! # Evaluation
//!
//! Every provider status change runs one evaluation cycle. A cycle reads the
//! persisted record exactly once and derives everything from that single
//! snapshot:
//!
//! ```text
//! Connected / Connecting / Reconnecting ──► effectively connected
//!                                           grace period cancelled
//! Disconnected + persisted record       ──► grace period (12 s)
//!                                           one reconnect trigger at +500 ms
//! Disconnected, nothing persisted       ──► disconnected
//! ```
//!
//! # Grace period
//!
//! A disconnection episode owns two [`ScheduledTask`]s: the reconnect
//! trigger and the expiry. Both are cancelled synchronously when the raw
//! status becomes connected or transitioning. On expiry the record is read
//! once more and, if the session is still persisted but not restored, one
//! last reconnect is attempted (subject to the same single-shot guard)
//! before the state drops to disconnected. The expired episode is not
//! restarted until the raw status leaves `Disconnected`.
//!
//! # Reconnect guard
//!
//! `reconnect_attempted` allows one engine-issued reconnect per episode.
//! It clears on `Connected`, and on a transition the provider entered on
//! its own. A `Reconnecting` echo of the engine's own in-flight call leaves
//! it set, so a provider that announces and then rejects the reconnect
//! does not get re-triggered every cycle.

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

// ---

use tether_domain::{
    // ---
    Address,
    ConnectionProviderPtr,
    ConnectionSnapshot,
    EffectiveConnectionState,
    PersistedSessionRecord,
    SessionNamespace,
    SessionStorePtr,
};

// ---

use super::{read_persisted_record, EngineConfig, ScheduledTask};

// ---------------------------------------------------------------------------
// EngineEvent
// ---------------------------------------------------------------------------

/// Internal events delivered back into the engine loop.
#[derive(Debug)]
enum EngineEvent {
    // ---
    /// The delayed reconnect trigger of grace episode `episode` fired.
    ReconnectDue { episode: u64 },

    /// Grace episode `episode` ran out.
    GraceExpired { episode: u64 },

    /// An engine-issued `reconnect()` call resolved.
    ReconnectSettled { ok: bool },
}

// ---------------------------------------------------------------------------
// GracePeriod
// ---------------------------------------------------------------------------

/// Timers and deadline of one active grace period.
#[derive(Debug)]
struct GracePeriod {
    // ---
    episode: u64,
    expires_at: Instant,
    trigger: ScheduledTask,
    expiry: ScheduledTask,
}

// ---

impl GracePeriod {
    // ---
    fn cancel(&mut self) {
        self.trigger.cancel();
        self.expiry.cancel();
    }
}

// ---

#[derive(Debug)]
enum GraceState {
    // ---
    /// No disconnection episode in progress.
    Idle,

    Active(GracePeriod),

    /// The episode ran its course; report the genuine state until the raw
    /// status leaves `Disconnected`.
    Expired,
}

// ---------------------------------------------------------------------------
// StabilityEngine
// ---------------------------------------------------------------------------

pub struct StabilityEngine {
    // ---
    provider: ConnectionProviderPtr,
    store: SessionStorePtr,
    namespace: SessionNamespace,
    config: EngineConfig,

    grace: GraceState,

    /// Single-shot guard for engine-issued reconnects.
    reconnect_attempted: bool,

    /// An engine-issued `reconnect()` has not resolved yet.
    reconnect_in_flight: bool,

    /// Last address the provider reported. Consulted only while
    /// transitioning or inside the grace period.
    last_known_address: Option<Address>,

    /// Most recent snapshot, used by timer events that arrive between
    /// status changes.
    snapshot: ConnectionSnapshot,

    /// Monotonic grace episode counter; stale timer events are dropped.
    episode: u64,

    event_tx: mpsc::UnboundedSender<EngineEvent>,
    event_rx: mpsc::UnboundedReceiver<EngineEvent>,
    state_tx: watch::Sender<EffectiveConnectionState>,
}

// ---

impl StabilityEngine {
    // ---

    pub fn new(
        provider: ConnectionProviderPtr,
        store: SessionStorePtr,
        namespace: SessionNamespace,
        config: EngineConfig,
    ) -> Self {
        // ---
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(EffectiveConnectionState::default());

        Self {
            provider,
            store,
            namespace,
            config,
            grace: GraceState::Idle,
            reconnect_attempted: false,
            reconnect_in_flight: false,
            last_known_address: None,
            snapshot: ConnectionSnapshot::disconnected(),
            episode: 0,
            event_tx,
            event_rx,
            state_tx,
        }
    }

    // ---

    /// Subscribe to published states. Only changes are published.
    pub fn subscribe(&self) -> watch::Receiver<EffectiveConnectionState> {
        self.state_tx.subscribe()
    }

    /// The last published state.
    pub fn current(&self) -> EffectiveConnectionState {
        self.state_tx.borrow().clone()
    }

    /// `true` while a grace period is running.
    pub fn in_grace_period(&self) -> bool {
        matches!(self.grace, GraceState::Active(_))
    }

    /// Deadline of the running grace period, if any.
    pub fn grace_expires_at(&self) -> Option<Instant> {
        match &self.grace {
            GraceState::Active(g) => Some(g.expires_at),
            _ => None,
        }
    }

    // ---

    /// Drive the engine. Runs until the provider's status channel closes;
    /// spawn with `tokio::spawn`.
    pub async fn run(mut self) {
        // ---
        let mut status_rx = self.provider.status_rx();
        let initial = status_rx.borrow_and_update().clone();
        self.evaluate(initial);

        loop {
            tokio::select! {
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        tracing::info!("status channel closed — stability engine exiting");
                        break;
                    }
                    let snapshot = status_rx.borrow_and_update().clone();
                    self.evaluate(snapshot);
                }
                Some(event) = self.event_rx.recv() => {
                    self.on_event(event);
                }
            }
        }

        if let GraceState::Active(grace) = &mut self.grace {
            grace.cancel();
        }
    }

    // ---

    /// Run one evaluation cycle for `snapshot` and publish the result.
    ///
    /// Reads the persisted record exactly once. Must be called from within
    /// a tokio runtime: it may arm the grace-period timers.
    pub fn evaluate(&mut self, snapshot: ConnectionSnapshot) -> EffectiveConnectionState {
        // ---
        let record = read_persisted_record(self.store.as_ref(), &self.namespace);

        if let Some(address) = snapshot.address.as_ref().filter(|a| !a.is_empty()) {
            self.last_known_address = Some(address.clone());
        }
        self.snapshot = snapshot;

        if self.snapshot.is_connected() || self.snapshot.is_transitioning() {
            self.end_grace("provider active");
            let echo = self.snapshot.is_transitioning() && self.reconnect_in_flight;
            if !echo {
                self.reconnect_attempted = false;
            }
        } else if record.has_persisted {
            if matches!(self.grace, GraceState::Idle) {
                self.start_grace();
            }
        } else {
            // Nothing to restore; a purge mid-episode ends the episode too.
            self.end_grace("no persisted session");
        }

        self.publish(&record)
    }

    // ---

    fn on_event(&mut self, event: EngineEvent) {
        // ---
        match event {
            EngineEvent::ReconnectDue { episode } => {
                if self.is_current_episode(episode) {
                    self.reconnect_due();
                } else {
                    tracing::debug!(episode, "stale reconnect trigger dropped");
                }
            }
            EngineEvent::GraceExpired { episode } => {
                if self.is_current_episode(episode) {
                    self.expire_grace();
                } else {
                    tracing::debug!(episode, "stale grace expiry dropped");
                }
            }
            EngineEvent::ReconnectSettled { ok } => {
                self.reconnect_in_flight = false;
                tracing::debug!(ok, "engine reconnect settled");
            }
        }
    }

    // ---

    fn is_current_episode(&self, episode: u64) -> bool {
        matches!(&self.grace, GraceState::Active(g) if g.episode == episode)
    }

    // ---

    fn start_grace(&mut self) {
        // ---
        self.episode += 1;
        let episode = self.episode;

        let trigger = ScheduledTask::schedule(
            self.config.reconnect_delay,
            self.event_tx.clone(),
            EngineEvent::ReconnectDue { episode },
        );
        let expiry = ScheduledTask::schedule(
            self.config.grace_period,
            self.event_tx.clone(),
            EngineEvent::GraceExpired { episode },
        );

        tracing::info!(
            episode,
            grace_ms = self.config.grace_period.as_millis() as u64,
            "disconnected with persisted session — grace period started",
        );

        self.grace = GraceState::Active(GracePeriod {
            episode,
            expires_at: Instant::now() + self.config.grace_period,
            trigger,
            expiry,
        });
    }

    // ---

    /// Return to `Idle`, cancelling any running timers.
    fn end_grace(&mut self, reason: &str) {
        // ---
        match std::mem::replace(&mut self.grace, GraceState::Idle) {
            GraceState::Active(mut grace) => {
                grace.cancel();
                tracing::info!(episode = grace.episode, reason, "grace period cancelled");
            }
            GraceState::Expired | GraceState::Idle => {}
        }
    }

    // ---

    fn expire_grace(&mut self) {
        // ---
        let record = read_persisted_record(self.store.as_ref(), &self.namespace);

        if record.has_persisted && !self.snapshot.is_connected() {
            tracing::info!("grace period expiring with persisted session still unrestored");
            self.trigger_reconnect("grace deadline");
        }

        if let GraceState::Active(grace) =
            std::mem::replace(&mut self.grace, GraceState::Expired)
        {
            tracing::info!(episode = grace.episode, "grace period expired — reporting disconnected");
        }

        self.publish(&record);
    }

    // ---

    /// The delayed trigger fired. The store may have been purged since the
    /// episode started without any status change, so check it again.
    fn reconnect_due(&mut self) {
        // ---
        let record = read_persisted_record(self.store.as_ref(), &self.namespace);
        if !record.has_persisted {
            tracing::info!("persisted session gone before reconnect trigger — skipped");
            return;
        }
        self.trigger_reconnect("grace period");
    }

    // ---

    /// Issue one reconnect if the guard allows it. Failures are logged and
    /// swallowed; corrupted sessions are the recovery engine's business.
    fn trigger_reconnect(&mut self, cause: &'static str) {
        // ---
        if self.reconnect_attempted || self.reconnect_in_flight {
            tracing::debug!(cause, "reconnect already attempted this episode — skipped");
            return;
        }
        if self.snapshot.is_connected() || self.snapshot.is_transitioning() {
            return;
        }

        self.reconnect_attempted = true;
        self.reconnect_in_flight = true;
        tracing::info!(cause, "triggering reconnect for persisted session");

        let provider = self.provider.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let ok = match provider.reconnect().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(cause, "reconnect trigger failed: {e}");
                    false
                }
            };
            let _ = event_tx.send(EngineEvent::ReconnectSettled { ok });
        });
    }

    // ---

    fn publish(&self, record: &PersistedSessionRecord) -> EffectiveConnectionState {
        // ---
        let state = compute_state(
            &self.snapshot,
            record,
            self.in_grace_period(),
            self.last_known_address.as_ref(),
        );

        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            tracing::debug!(
                connected = state.is_effectively_connected,
                transitioning = state.is_transitioning,
                raw = state.raw_is_connected,
                "effective state changed",
            );
            *current = state.clone();
            true
        });

        state
    }
}

// ---------------------------------------------------------------------------
// compute_state
// ---------------------------------------------------------------------------

/// Pure recompute of the effective state.
///
/// The address falls back to the last known and then the persisted
/// address only while transitioning or inside the grace period.
pub fn compute_state(
    snapshot: &ConnectionSnapshot,
    record: &PersistedSessionRecord,
    in_grace: bool,
    last_known_address: Option<&Address>,
) -> EffectiveConnectionState {
    // ---
    let raw_is_connected = snapshot.is_connected();
    let is_transitioning = snapshot.is_transitioning();
    let holding = is_transitioning || in_grace;

    let raw_address = snapshot.address.clone().filter(|a| !a.is_empty());
    let address = if raw_is_connected || is_transitioning {
        raw_address.or_else(|| fallback_address(holding, last_known_address, record))
    } else {
        fallback_address(holding, last_known_address, record)
    };

    EffectiveConnectionState {
        is_effectively_connected: raw_is_connected || holding,
        is_transitioning,
        address,
        raw_is_connected,
        had_previous_connection: record.has_persisted,
    }
}

fn fallback_address(
    holding: bool,
    last_known_address: Option<&Address>,
    record: &PersistedSessionRecord,
) -> Option<Address> {
    // ---
    if !holding {
        return None;
    }
    last_known_address
        .cloned()
        .or_else(|| record.last_address.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
