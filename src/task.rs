//! Cooperative cancellation for monitor loops.
//!
//! Each monitor runs as a tokio task and owns a [`StopToken`]; the
//! [`Supervisor`](crate::supervisor::Supervisor) keeps the matching
//! [`StopSignal`]. Stopping is cooperative only: the token is observed at
//! suspension points, never by forcible abort. The cancellable
//! [`StopToken::sleep`] replaces manual one-second sleep chunking — any idle
//! wait ends as soon as the signal fires.

use std::time::Duration;
use tokio::sync::watch;

/// Owner side of a stop request. Cloneable; signalling is idempotent and
/// safe to issue while loop bodies are mid-iteration.
#[derive(Clone)]
pub struct StopSignal {
    tx: watch::Sender<bool>,
}

impl StopSignal {
    /// Create a signal and a first token observing it.
    pub fn new() -> (Self, StopToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, StopToken { rx })
    }

    /// Request all observing tasks to stop. Idempotent.
    pub fn stop(&self) {
        // send_replace never fails; the signal owns at least this sender.
        self.tx.send_replace(true);
    }

    /// A fresh token for another task.
    pub fn token(&self) -> StopToken {
        StopToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Task side of a stop request.
#[derive(Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop has been requested. Also resolves if the signal
    /// owner is gone, so an orphaned loop cannot run forever.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `duration`, waking early on a stop request.
    ///
    /// Returns `true` if the full duration elapsed, `false` if the sleep was
    /// cut short by cancellation.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_stopped() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancelled() => false,
        }
    }
}
