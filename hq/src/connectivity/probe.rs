//! TCP reachability probe
//!
//! Connectivity is "deliverable" when a TCP connection to the probe address
//! can be opened within the timeout. The probe task runs only while someone
//! is subscribed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info};

use super::{ConnectivityMonitor, Subscription};
use crate::config::ConnectivityConfig;

struct ProbeShared {
    tx: watch::Sender<bool>,
    /// True while a probe task is alive; guards spawn/exit races
    running: Mutex<bool>,
    addr: String,
    interval: Duration,
    timeout: Duration,
}

impl ProbeShared {
    fn publish(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, addr = %self.addr, "Connectivity changed");
        }
    }
}

/// Monitor that polls a TCP endpoint
pub struct ProbeMonitor {
    shared: Arc<ProbeShared>,
}

impl ProbeMonitor {
    /// Create a monitor and seed it with one synchronous probe
    pub async fn start(addr: impl Into<String>, interval: Duration, timeout: Duration) -> Self {
        let addr = addr.into();
        debug!(%addr, ?interval, ?timeout, "ProbeMonitor::start: called");
        let initial = probe_once(&addr, timeout).await;
        let (tx, _) = watch::channel(initial);
        info!(%addr, online = initial, "Connectivity probe initialised");

        Self {
            shared: Arc::new(ProbeShared {
                tx,
                running: Mutex::new(false),
                addr,
                interval,
                timeout,
            }),
        }
    }

    /// Create a monitor from the connectivity section of the config
    pub async fn from_config(config: &ConnectivityConfig) -> Self {
        Self::start(config.probe_addr.clone(), config.poll_interval(), config.probe_timeout()).await
    }

    /// Probe right now and publish the result
    pub async fn probe_now(&self) -> bool {
        let online = probe_once(&self.shared.addr, self.shared.timeout).await;
        self.shared.publish(online);
        online
    }

    /// Whether the background probe task is alive
    pub fn is_probing(&self) -> bool {
        *self.shared.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ConnectivityMonitor for ProbeMonitor {
    /// Subscribe, starting the probe task if nobody else is listening
    ///
    /// Must be called from within a tokio runtime.
    fn subscribe(&self) -> Subscription {
        let mut running = self.shared.running.lock().unwrap_or_else(|e| e.into_inner());
        let rx = self.shared.tx.subscribe();
        if !*running {
            debug!(addr = %self.shared.addr, "ProbeMonitor::subscribe: starting probe task");
            *running = true;
            tokio::spawn(probe_loop(Arc::clone(&self.shared)));
        }
        Subscription::new(rx)
    }
}

async fn probe_loop(shared: Arc<ProbeShared>) {
    debug!(addr = %shared.addr, "probe_loop: started");
    loop {
        tokio::select! {
            _ = shared.tx.closed() => {
                let mut running = shared.running.lock().unwrap_or_else(|e| e.into_inner());
                if shared.tx.receiver_count() == 0 {
                    *running = false;
                    break;
                }
                // Someone re-subscribed between the wakeup and the lock
            }
            _ = tokio::time::sleep(shared.interval) => {
                let online = probe_once(&shared.addr, shared.timeout).await;
                shared.publish(online);
            }
        }
    }
    debug!(addr = %shared.addr, "probe_loop: last subscriber gone, stopped");
}

/// One reachability check
async fn probe_once(addr: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(%addr, error = %e, "probe_once: connect failed");
            false
        }
        Err(_) => {
            debug!(%addr, ?timeout, "probe_once: connect timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const FAST: Duration = Duration::from_millis(20);
    const TIMEOUT: Duration = Duration::from_millis(500);

    async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn test_reachable_listener_is_online() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let monitor = ProbeMonitor::start(addr, FAST, TIMEOUT).await;
        let mut sub = monitor.subscribe();
        assert_eq!(sub.next().await, Some(true));
    }

    #[tokio::test]
    async fn test_closed_port_is_offline() {
        let monitor = ProbeMonitor::start(closed_port().await, FAST, TIMEOUT).await;
        let sub = monitor.subscribe();
        assert!(!sub.current());
    }

    #[tokio::test]
    async fn test_transition_is_published() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let monitor = ProbeMonitor::start(addr, FAST, TIMEOUT).await;
        let mut sub = monitor.subscribe();
        assert_eq!(sub.next().await, Some(true));

        drop(listener);
        let next = tokio::time::timeout(Duration::from_secs(5), sub.next()).await.unwrap();
        assert_eq!(next, Some(false));
    }

    #[tokio::test]
    async fn test_probe_task_stops_after_last_unsubscribe() {
        let monitor = ProbeMonitor::start(closed_port().await, FAST, TIMEOUT).await;
        let a = monitor.subscribe();
        let b = monitor.subscribe();
        assert!(monitor.is_probing());

        drop(a);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(monitor.is_probing(), "one subscriber is still listening");

        drop(b);
        for _ in 0..100 {
            if !monitor.is_probing() {
                break;
            }
            tokio::time::sleep(FAST).await;
        }
        assert!(!monitor.is_probing());

        // Subscribing again restarts probing
        let _c = monitor.subscribe();
        assert!(monitor.is_probing());
    }
}
