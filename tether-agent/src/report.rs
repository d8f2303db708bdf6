//! One JSON line per observable event, printed on stdout.
//!
//! Logs go to the tracing subscriber; this is the machine-readable trace of
//! what a UI consumer would have seen.

use serde::Serialize;

// ---

use tether_domain::{EffectiveConnectionState, Notification};
use tether_engine::RecoveryStatus;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Report {
    // ---
    State {
        t_ms: u64,
        connected: bool,
        transitioning: bool,
        address: Option<String>,
        raw_connected: bool,
        had_previous: bool,
    },

    Recovery {
        t_ms: u64,
        phase: String,
        attempts: u32,
    },

    Notice {
        t_ms: u64,
        level: &'static str,
        message: String,
    },
}

// ---

impl Report {
    // ---
    pub fn state(t_ms: u64, state: &EffectiveConnectionState) -> Self {
        // ---
        Report::State {
            t_ms,
            connected: state.is_effectively_connected,
            transitioning: state.is_transitioning,
            address: state.address.as_ref().map(|a| a.to_string()),
            raw_connected: state.raw_is_connected,
            had_previous: state.had_previous_connection,
        }
    }

    pub fn recovery(t_ms: u64, status: &RecoveryStatus) -> Self {
        Report::Recovery {
            t_ms,
            phase: format!("{:?}", status.phase),
            attempts: status.attempts,
        }
    }

    pub fn notice(t_ms: u64, notification: &Notification) -> Self {
        // ---
        let (level, message) = match notification {
            Notification::Info(msg) => ("info", msg.clone()),
            Notification::Success(msg) => ("success", msg.clone()),
            Notification::Error(msg) => ("error", msg.clone()),
            Notification::SessionCleared { removed } => {
                ("success", format!("Cleared {removed} session entries. Please reconnect your wallet."))
            }
        };
        Report::Notice {
            t_ms,
            level,
            message,
        }
    }

    // ---

    /// Print as one JSON line.
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!("report serialization failed: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use tether_domain::Address;

    use super::*;

    #[test]
    fn state_line_shape() {
        // ---
        let state = EffectiveConnectionState {
            is_effectively_connected: true,
            is_transitioning: false,
            address: Some(Address::new("0xABC")),
            raw_is_connected: false,
            had_previous_connection: true,
        };

        let json = serde_json::to_value(Report::state(250, &state)).unwrap();
        assert_eq!(json["type"], "state");
        assert_eq!(json["t_ms"], 250);
        assert_eq!(json["connected"], true);
        assert_eq!(json["address"], "0xABC");
        assert_eq!(json["raw_connected"], false);
    }

    #[test]
    fn session_cleared_reads_as_success() {
        // ---
        let report = Report::notice(0, &Notification::SessionCleared { removed: 4 });
        match report {
            Report::Notice { level, message, .. } => {
                assert_eq!(level, "success");
                assert!(message.starts_with("Cleared 4 session"));
            }
            other => panic!("unexpected report {other:?}"),
        }
    }
}
