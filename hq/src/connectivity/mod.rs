//! Connectivity monitoring
//!
//! A monitor publishes a single boolean: is a network path to the webhook
//! believed to be available. Subscribers see the current value first and
//! then one value per change. Dropping the last subscription stops any
//! background probing.

mod fixed;
mod probe;

use tokio::sync::watch;
use tracing::debug;

pub use fixed::StaticMonitor;
pub use probe::ProbeMonitor;

/// Source of the live "deliverable" signal
pub trait ConnectivityMonitor: Send + Sync {
    /// Start observing the signal
    fn subscribe(&self) -> Subscription;
}

/// A live view of the connectivity signal
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: watch::Receiver<bool>,
    primed: bool,
}

impl Subscription {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx, primed: false }
    }

    /// Sample the current value without waiting
    pub fn current(&self) -> bool {
        *self.rx.borrow()
    }

    /// Next value of the signal
    ///
    /// The first call returns immediately with the current state. Later
    /// calls wait for a change. Returns None once the monitor is gone.
    pub async fn next(&mut self) -> Option<bool> {
        if !self.primed {
            self.primed = true;
            return Some(*self.rx.borrow_and_update());
        }

        if self.rx.changed().await.is_err() {
            debug!("Subscription::next: monitor closed");
            return None;
        }
        Some(*self.rx.borrow_and_update())
    }

    /// A second handle observing the same signal
    ///
    /// Used by the delivery worker to sample connectivity between sends.
    pub fn watcher(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}
