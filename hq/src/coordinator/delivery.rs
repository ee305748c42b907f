//! Delivery worker
//!
//! One worker runs at a time. It walks a snapshot of the queue taken when
//! it was started and talks back to the coordinator for every state change,
//! so the coordinator stays the only writer of the store.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::classify::{FailureClass, classify};
use super::messages::{CoordRequest, LoopExit, LoopReport};
use crate::domain::QueuedMessage;
use crate::sender::{MessageSender, SendOutcome};

/// Everything a worker needs for one pass over the queue
pub(crate) struct DeliveryJob {
    pub endpoint: String,
    pub messages: Vec<QueuedMessage>,
    pub sender: Arc<dyn MessageSender>,
    pub connectivity: watch::Receiver<bool>,
}

/// Reports `Aborted` if the worker ends without calling `finish`
struct FinishGuard {
    tx: Option<mpsc::Sender<CoordRequest>>,
    delivered: usize,
}

impl FinishGuard {
    fn new(tx: mpsc::Sender<CoordRequest>) -> Self {
        Self {
            tx: Some(tx),
            delivered: 0,
        }
    }

    async fn finish(mut self, exit: LoopExit) {
        let report = LoopReport {
            exit,
            delivered: self.delivered,
        };
        if let Some(tx) = self.tx.take()
            && tx.send(CoordRequest::DeliveryFinished { report }).await.is_err()
        {
            debug!("FinishGuard::finish: coordinator gone");
        }
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };

        warn!("Delivery worker ended unexpectedly");
        let report = LoopReport {
            exit: LoopExit::Aborted,
            delivered: self.delivered,
        };
        if let Err(mpsc::error::TrySendError::Full(request)) = tx.try_send(CoordRequest::DeliveryFinished { report }) {
            tokio::spawn(async move {
                let _ = tx.send(request).await;
            });
        }
    }
}

/// Run one delivery pass and report back
pub(crate) async fn run(job: DeliveryJob, tx: mpsc::Sender<CoordRequest>) {
    debug!(endpoint = %job.endpoint, count = job.messages.len(), "delivery::run: called");
    let mut guard = FinishGuard::new(tx.clone());
    let exit = deliver_all(&job, &tx, &mut guard.delivered).await;
    info!(?exit, delivered = guard.delivered, "Delivery loop finished");
    guard.finish(exit).await;
}

async fn deliver_all(job: &DeliveryJob, tx: &mpsc::Sender<CoordRequest>, delivered: &mut usize) -> LoopExit {
    for message in &job.messages {
        if !*job.connectivity.borrow() {
            debug!("deliver_all: connectivity lost");
            return LoopExit::ConnectivityLost;
        }

        match still_queued(tx, &message.id).await {
            Some(true) => {}
            Some(false) => {
                debug!(id = %message.id, "deliver_all: cancelled before send, skipping");
                continue;
            }
            None => return LoopExit::Aborted,
        }

        match job.sender.send(&job.endpoint, &message.content).await {
            SendOutcome::Delivered => {
                debug!(id = %message.id, "deliver_all: delivered");
                match confirm_delivered(tx, &message.id).await {
                    Some(Ok(())) => *delivered += 1,
                    Some(Err(message)) => return LoopExit::Surfaced { message },
                    None => return LoopExit::Aborted,
                }
            }
            SendOutcome::Failed(failure) => {
                debug!(id = %message.id, %failure, "deliver_all: send failed");
                return match classify(&failure) {
                    FailureClass::Transient => LoopExit::Transient {
                        detail: failure.detail,
                    },
                    FailureClass::Surfaced(message) => LoopExit::Surfaced { message },
                };
            }
        }
    }

    LoopExit::Exhausted
}

/// None when the coordinator is gone
async fn still_queued(tx: &mpsc::Sender<CoordRequest>, id: &str) -> Option<bool> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(CoordRequest::StillQueued {
        id: id.to_string(),
        reply_tx,
    })
    .await
    .ok()?;
    reply_rx.await.ok()
}

/// Ask the coordinator to drop a delivered message from the store
async fn confirm_delivered(tx: &mpsc::Sender<CoordRequest>, id: &str) -> Option<Result<(), String>> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(CoordRequest::Delivered {
        id: id.to_string(),
        reply_tx,
    })
    .await
    .ok()?;
    let result = reply_rx.await.ok()?;
    Some(result.map_err(|e| format!("Message sent but could not be removed from the queue: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::FailureKind;
    use crate::sender::mock::MockSender;

    fn job(sender: Arc<MockSender>, online: watch::Receiver<bool>, contents: &[&str]) -> DeliveryJob {
        DeliveryJob {
            endpoint: "https://example.com/hook".to_string(),
            messages: contents
                .iter()
                .enumerate()
                .map(|(i, c)| QueuedMessage::with_id(format!("m{}", i), *c))
                .collect(),
            sender,
            connectivity: online,
        }
    }

    /// Stand-in coordinator: answers worker requests, returns the final report
    async fn fake_coordinator(mut rx: mpsc::Receiver<CoordRequest>, cancelled: Vec<String>) -> (Vec<String>, LoopReport) {
        let mut removed = Vec::new();
        while let Some(request) = rx.recv().await {
            match request {
                CoordRequest::StillQueued { id, reply_tx } => {
                    let _ = reply_tx.send(!cancelled.contains(&id) && !removed.contains(&id));
                }
                CoordRequest::Delivered { id, reply_tx } => {
                    removed.push(id);
                    let _ = reply_tx.send(Ok(()));
                }
                CoordRequest::DeliveryFinished { report } => return (removed, report),
                other => panic!("unexpected request: {:?}", other),
            }
        }
        panic!("worker never finished");
    }

    #[tokio::test]
    async fn test_delivers_in_order_and_exhausts() {
        let sender = Arc::new(MockSender::always_delivers());
        let (_online_tx, online) = watch::channel(true);
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(run(job(sender.clone(), online, &["a", "b", "c"]), tx));
        let (removed, report) = fake_coordinator(rx, vec![]).await;

        assert_eq!(sender.sent_contents(), vec!["a", "b", "c"]);
        assert_eq!(removed, vec!["m0", "m1", "m2"]);
        assert_eq!(report.exit, LoopExit::Exhausted);
        assert_eq!(report.delivered, 3);
    }

    #[tokio::test]
    async fn test_skips_cancelled_message() {
        let sender = Arc::new(MockSender::always_delivers());
        let (_online_tx, online) = watch::channel(true);
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(run(job(sender.clone(), online, &["a", "b"]), tx));
        let (removed, report) = fake_coordinator(rx, vec!["m0".to_string()]).await;

        assert_eq!(sender.sent_contents(), vec!["b"]);
        assert_eq!(removed, vec!["m1"]);
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn test_stops_on_transient_failure() {
        let sender = Arc::new(MockSender::new(vec![
            SendOutcome::Delivered,
            SendOutcome::failed(FailureKind::Connect, "tcp connect error: Connection refused (os error 111)"),
        ]));
        let (_online_tx, online) = watch::channel(true);
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(run(job(sender.clone(), online, &["a", "b", "c"]), tx));
        let (removed, report) = fake_coordinator(rx, vec![]).await;

        assert_eq!(sender.call_count(), 2);
        assert_eq!(removed, vec!["m0"]);
        assert!(matches!(report.exit, LoopExit::Transient { .. }));
    }

    #[tokio::test]
    async fn test_stops_on_surfaced_failure() {
        let sender = Arc::new(MockSender::new(vec![SendOutcome::failed(
            FailureKind::Status(404),
            "Failed to send message: 404 Not Found",
        )]));
        let (_online_tx, online) = watch::channel(true);
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(run(job(sender.clone(), online, &["a", "b"]), tx));
        let (removed, report) = fake_coordinator(rx, vec![]).await;

        assert_eq!(sender.call_count(), 1);
        assert!(removed.is_empty());
        assert_eq!(
            report.exit,
            LoopExit::Surfaced {
                message: "Failed to send message: 404 Not Found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_stops_when_connectivity_drops() {
        let sender = Arc::new(MockSender::always_delivers());
        let (_online_tx, online) = watch::channel(false);
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(run(job(sender.clone(), online, &["a"]), tx));
        let (_, report) = fake_coordinator(rx, vec![]).await;

        assert_eq!(sender.call_count(), 0);
        assert_eq!(report.exit, LoopExit::ConnectivityLost);
    }

    #[tokio::test]
    async fn test_store_failure_on_removal_is_surfaced() {
        let sender = Arc::new(MockSender::always_delivers());
        let (_online_tx, online) = watch::channel(true);
        let (tx, mut rx) = mpsc::channel(8);

        tokio::spawn(run(job(sender.clone(), online, &["a", "b"]), tx));

        let report = loop {
            match rx.recv().await.unwrap() {
                CoordRequest::StillQueued { reply_tx, .. } => {
                    let _ = reply_tx.send(true);
                }
                CoordRequest::Delivered { reply_tx, .. } => {
                    let err = crate::store::StoreError::Io(std::io::Error::other("disk full"));
                    let _ = reply_tx.send(Err(err.into()));
                }
                CoordRequest::DeliveryFinished { report } => break report,
                other => panic!("unexpected request: {:?}", other),
            }
        };

        assert_eq!(sender.call_count(), 1);
        match report.exit {
            LoopExit::Surfaced { message } => assert!(message.contains("disk full")),
            other => panic!("expected surfaced exit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_guard_reports_abort_when_dropped() {
        let (tx, mut rx) = mpsc::channel(8);
        {
            let mut guard = FinishGuard::new(tx);
            guard.delivered = 2;
        }

        match rx.recv().await.unwrap() {
            CoordRequest::DeliveryFinished { report } => {
                assert_eq!(report.exit, LoopExit::Aborted);
                assert_eq!(report.delivered, 2);
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }
}
