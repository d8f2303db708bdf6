//! Failure classification by message text.
//!
//! Providers surface failures as free text, so classification is a
//! case-insensitive substring match. Only the patterns below count as
//! session corruption; everything else is unclassified and must never
//! trigger a purge.

/// Message fragments that mean the persisted session reference is stale.
pub const SESSION_ERROR_PATTERNS: &[&str] = &[
    "no matching key",
    "session topic",
    "session not found",
    "invalid session",
    "pairing expired",
    "no pair found",
];

// ---------------------------------------------------------------------------
// FaultClass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    // ---
    /// Stale or expired session state; purge and reconnect.
    SessionCorruption,

    /// Anything else. Logged only.
    Unclassified,
}

// ---

pub fn classify(message: &str) -> FaultClass {
    // ---
    let lowered = message.to_lowercase();
    if SESSION_ERROR_PATTERNS.iter().any(|p| lowered.contains(p)) {
        FaultClass::SessionCorruption
    } else {
        FaultClass::Unclassified
    }
}

/// Shorthand for callers that only need a yes/no.
pub fn is_session_error(message: &str) -> bool {
    classify(message) == FaultClass::SessionCorruption
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn matches_known_patterns_case_insensitively() {
        // ---
        for msg in [
            "No matching key. session topic doesn't exist: abc123",
            "Missing or invalid. Session topic not found",
            "SESSION NOT FOUND",
            "Invalid session: expired",
            "Pairing expired before approval",
            "no pair found for topic",
        ] {
            assert_eq!(classify(msg), FaultClass::SessionCorruption, "{msg}");
        }
    }

    #[test]
    fn other_failures_are_unclassified() {
        // ---
        for msg in [
            "User rejected the request.",
            "fetch failed",
            "execution reverted",
            "",
        ] {
            assert_eq!(classify(msg), FaultClass::Unclassified, "{msg}");
            assert!(!is_session_error(msg));
        }
    }
}
