//! Cooperative shutdown shared by a node's background tasks.
//!
//! The signal is a `watch` channel holding `true` once shutdown starts.
//! Loops check it between iterations; an in-flight peer request is left to
//! finish or hit its own timeout.

use tokio::sync::watch;

pub type ShutdownSignal = watch::Receiver<bool>;

/// Creates the trigger/signal pair. Send `true` (or drop the sender) to stop
/// every task holding a clone of the receiver.
pub fn channel() -> (watch::Sender<bool>, ShutdownSignal) {
    watch::channel(false)
}

/// Resolves once shutdown was requested or the trigger was dropped.
pub async fn requested(signal: &mut ShutdownSignal) {
    while !*signal.borrow_and_update() {
        if signal.changed().await.is_err() {
            return;
        }
    }
}
