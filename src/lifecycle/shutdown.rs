//! Stop signal shared by the portal and the upload loop.

use tokio::sync::broadcast;

/// Fan-out stop signal.
///
/// Every loop holds its own receiver; a trigger with no receivers left is
/// silently dropped.
#[derive(Debug, Clone)]
pub struct Shutdown {
    notify: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self { notify }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notify.subscribe()
    }

    /// Ask every subscribed loop to stop.
    pub fn trigger(&self) {
        let listeners = self.notify.send(()).unwrap_or(0);
        tracing::debug!(listeners, "Stop requested");
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
