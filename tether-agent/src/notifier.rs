//! [`NotifyAgent`] is the actor that delivers engine notifications to the user.
//!
//! The engines call [`NotificationSink::notify`] synchronously from inside
//! their own tasks. [`NotifyTx`] turns that into a channel send so a slow
//! consumer never stalls an engine; the agent task drains the channel,
//! logs each notification and prints it as a [`Report`] line.
//!
//! Delivery is fire-and-forget. Once the agent has exited, notifications
//! are dropped with a log line.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

// ---

use tether_domain::{Notification, NotificationSink};

// ---

use super::Report;

// ---------------------------------------------------------------------------
// NotifyTx
// ---------------------------------------------------------------------------

/// Cheap-clone sender handle, handed to the engines as their sink.
#[derive(Clone)]
pub struct NotifyTx {
    // ---
    tx: mpsc::UnboundedSender<Notification>,
}

// ---

impl NotificationSink for NotifyTx {
    // ---
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::info!("NotifyAgent channel closed — dropping notification");
        }
    }
}

// ---------------------------------------------------------------------------
// NotifyAgent
// ---------------------------------------------------------------------------

pub struct NotifyAgent {
    // ---
    rx: mpsc::UnboundedReceiver<Notification>,
    started: Instant,
}

// ---

impl NotifyAgent {
    // ---
    /// Spawn the agent task. It exits, returning how many notifications it
    /// delivered, once every [`NotifyTx`] clone is dropped.
    pub fn spawn(started: Instant) -> (NotifyTx, JoinHandle<usize>) {
        // ---
        let (tx, rx) = mpsc::unbounded_channel();
        let agent = NotifyAgent { rx, started };
        let handle = tokio::spawn(agent.run());
        (NotifyTx { tx }, handle)
    }

    // ---

    async fn run(mut self) -> usize {
        // ---
        let mut delivered = 0;

        while let Some(notification) = self.rx.recv().await {
            match &notification {
                Notification::Error(msg) => tracing::error!(%msg, "notify"),
                Notification::SessionCleared { removed } => tracing::info!(removed, "notify: session cleared"),
                Notification::Info(msg) | Notification::Success(msg) => tracing::info!(%msg, "notify"),
            }
            let t_ms = self.started.elapsed().as_millis() as u64;
            Report::notice(t_ms, &notification).emit();
            delivered += 1;
        }

        tracing::debug!(delivered, "notify channel closed — agent exiting");
        delivered
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test]
    async fn delivers_until_all_senders_drop() {
        // ---
        let (tx, handle) = NotifyAgent::spawn(Instant::now());
        let clone = tx.clone();

        tx.notify(Notification::Info("Recovering wallet connection...".into()));
        clone.notify(Notification::SessionCleared { removed: 2 });
        drop(tx);
        drop(clone);

        assert_eq!(handle.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn notify_after_exit_is_dropped_quietly() {
        // ---
        let (tx, handle) = NotifyAgent::spawn(Instant::now());
        handle.abort();
        let _ = handle.await;

        tx.notify(Notification::Error("Please reconnect your wallet".into()));
    }
}
