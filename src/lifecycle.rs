//! Process-wide shutdown signaling.

use tokio::sync::broadcast;

/// A cloneable shutdown handle.
///
/// One signal propagates to every subscriber: the receive loop stops
/// consuming frames and disconnects cleanly, the sink workers drain the
/// queue up to their grace period.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal shutdown to all subscribers. Safe to call more than once.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
