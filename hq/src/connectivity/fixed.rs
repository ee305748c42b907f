//! Manually driven connectivity monitor

use tokio::sync::watch;
use tracing::debug;

use super::{ConnectivityMonitor, Subscription};

/// Monitor whose state is set explicitly
///
/// Backs `--assume-online` and drives connectivity in tests.
pub struct StaticMonitor {
    tx: watch::Sender<bool>,
}

impl StaticMonitor {
    pub fn new(online: bool) -> Self {
        debug!(online, "StaticMonitor::new: called");
        let (tx, _) = watch::channel(online);
        Self { tx }
    }

    /// Monitor that always reports a usable network
    pub fn online() -> Self {
        Self::new(true)
    }

    /// Monitor that reports no network until told otherwise
    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Change the state; subscribers are notified only on transitions
    pub fn set(&self, online: bool) {
        debug!(online, "StaticMonitor::set: called");
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl ConnectivityMonitor for StaticMonitor {
    fn subscribe(&self) -> Subscription {
        Subscription::new(self.tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let monitor = StaticMonitor::offline();
        let mut a = monitor.subscribe();
        let mut b = monitor.subscribe();

        assert_eq!(a.next().await, Some(false));
        assert_eq!(b.next().await, Some(false));

        monitor.set(true);
        assert_eq!(a.next().await, Some(true));
        assert_eq!(b.next().await, Some(true));
    }

    #[tokio::test]
    async fn test_set_same_value_does_not_notify() {
        let monitor = StaticMonitor::online();
        let mut sub = monitor.subscribe();
        assert_eq!(sub.next().await, Some(true));

        monitor.set(true);
        let pending = tokio::time::timeout(std::time::Duration::from_millis(50), sub.next()).await;
        assert!(pending.is_err(), "no emission expected for an unchanged state");
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let monitor = StaticMonitor::online();
        let sub = monitor.subscribe();
        assert_eq!(monitor.subscriber_count(), 1);
        drop(sub);
        assert_eq!(monitor.subscriber_count(), 0);
    }
}
