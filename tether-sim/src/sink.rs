use std::sync::Mutex;

use tether_domain::{Notification, NotificationSink};

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// [`NotificationSink`] that keeps every notification for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    // ---
    seen: Mutex<Vec<Notification>>,
}

// ---

impl RecordingSink {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }

    pub fn errors(&self) -> usize {
        // ---
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|n| matches!(n, Notification::Error(_)))
            .count()
    }

    pub fn successes(&self) -> usize {
        // ---
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|n| matches!(n, Notification::Success(_)))
            .count()
    }

    pub fn clear(&self) {
        self.seen.lock().unwrap().clear();
    }
}

// ---

impl NotificationSink for RecordingSink {
    // ---
    fn notify(&self, notification: Notification) {
        tracing::debug!(?notification, "sink: recorded");
        self.seen.lock().unwrap().push(notification);
    }
}
