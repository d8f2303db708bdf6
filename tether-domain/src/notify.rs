use std::sync::Arc;

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// User-facing message emitted by the recovery engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    // ---
    /// Progress, e.g. "Recovering wallet connection...".
    Info(String),

    /// A reconnect succeeded.
    Success(String),

    /// Recovery gave up; the user must reconnect manually.
    Error(String),

    /// A manual clear finished. `removed` counts purged store entries.
    SessionCleared { removed: usize },
}

// ---------------------------------------------------------------------------
// NotificationSink
// ---------------------------------------------------------------------------

/// Fire-and-forget notification target. No delivery guarantee.
pub trait NotificationSink: Send + Sync {
    // ---
    fn notify(&self, notification: Notification);
}

// ---

/// Convenience alias for a shared [`NotificationSink`].
pub type NotificationSinkPtr = Arc<dyn NotificationSink>;
