//! Stale-session sweep over the session namespace.
//!
//! Every namespaced entry is parsed as JSON. Unparseable entries are
//! deleted as corrupted; a top-level object whose numeric `expiry` lies in
//! the past is deleted as expired. Anything else is left alone. The sweep
//! never fails: removal errors are logged and the entry is retried on the
//! next pass.

use std::time::{SystemTime, UNIX_EPOCH};

// ---

use serde_json::Value;

// ---

use tether_domain::{SessionNamespace, SessionStore};

/// Expiry values below this are Unix seconds, at or above it milliseconds.
/// `1e11` ms is March 1973, `1e11` s is far beyond any session lifetime.
const SECONDS_CUTOFF: f64 = 1e11;

// ---------------------------------------------------------------------------
// SweepReport
// ---------------------------------------------------------------------------

/// Entries removed by one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    // ---
    pub expired: usize,
    pub corrupted: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.expired + self.corrupted
    }
}

// ---------------------------------------------------------------------------
// sweep_store
// ---------------------------------------------------------------------------

/// Sweep against the wall clock.
pub fn sweep_store_now(store: &dyn SessionStore, namespace: &SessionNamespace) -> SweepReport {
    // ---
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    sweep_store(store, namespace, now_ms)
}

// ---

/// Sweep with an explicit `now_ms` (Unix milliseconds).
pub fn sweep_store(
    store: &dyn SessionStore,
    namespace: &SessionNamespace,
    now_ms: u64,
) -> SweepReport {
    // ---
    let mut report = SweepReport::default();

    for key in namespace.keys_in(store) {
        // Removed concurrently since `keys()` ran.
        let Some(raw) = store.get(&key) else {
            continue;
        };

        let verdict = match serde_json::from_str::<Value>(&raw) {
            Err(_) => Verdict::Corrupted,
            Ok(value) if is_expired(&value, now_ms) => Verdict::Expired,
            Ok(_) => continue,
        };

        match store.remove(&key) {
            // Gone before we got to it; someone else removed it.
            Ok(false) => {}
            Ok(true) => {
                tracing::debug!(%key, ?verdict, "sweep: removed stale entry");
                match verdict {
                    Verdict::Expired => report.expired += 1,
                    Verdict::Corrupted => report.corrupted += 1,
                }
            }
            Err(e) => tracing::warn!(%key, "sweep: remove failed: {e}"),
        }
    }

    if report.total() > 0 {
        tracing::info!(
            expired = report.expired,
            corrupted = report.corrupted,
            "sweep removed stale session entries",
        );
    }
    report
}

// ---

#[derive(Debug, Clone, Copy)]
enum Verdict {
    Expired,
    Corrupted,
}

fn is_expired(value: &Value, now_ms: u64) -> bool {
    // ---
    let Some(expiry) = value.get("expiry").and_then(Value::as_f64) else {
        return false;
    };
    let expiry_ms = if expiry < SECONDS_CUTOFF {
        expiry * 1000.0
    } else {
        expiry
    };
    expiry_ms < now_ms as f64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
