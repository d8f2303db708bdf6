//! [`ScheduledTask`] is a cancellable one-shot timer that delivers an event
//! into its owner's channel.
//!
//! The owner keeps the handle and calls [`ScheduledTask::cancel`] when the
//! condition the timer was armed for goes away. Dropping the handle also
//! cancels it.
//!
//! Cancellation races with delivery: a timer that fired just before
//! `cancel` may already have queued its event. Owners tag events with an
//! episode number and discard any that no longer match.

use std::time::Duration;

// ---

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// ScheduledTask
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ScheduledTask {
    // ---
    handle: Option<JoinHandle<()>>,
}

// ---

impl ScheduledTask {
    // ---
    /// Deliver `event` on `tx` after `delay`.
    pub fn schedule<T>(delay: Duration, tx: mpsc::UnboundedSender<T>, event: T) -> Self
    where
        T: Send + 'static,
    {
        // ---
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Owner gone: nothing left to notify.
            let _ = tx.send(event);
        });

        Self {
            handle: Some(handle),
        }
    }

    // ---

    /// Stop the timer. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// `true` until the timer fires or is cancelled.
    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

// ---

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        // ---
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = ScheduledTask::schedule(Duration::from_millis(500), tx, 7u32);
        assert!(task.is_pending());

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(rx.try_recv().is_err(), "fired early");

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.try_recv().ok(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_task_never_fires() {
        // ---
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut task = ScheduledTask::schedule(Duration::from_millis(500), tx, ());
        task.cancel();
        task.cancel();
        assert!(!task.is_pending());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        // ---
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(ScheduledTask::schedule(Duration::from_millis(10), tx, ()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }
}
