//! Main Coordinator task implementation

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, sleep_until};
use tracing::{debug, error, info, warn};

use super::config::CoordinatorConfig;
use super::delivery::{self, DeliveryJob};
use super::messages::{CoordRequest, CoordResult, LoopExit, LoopReport};
use super::state::{CoordinatorState, Inputs, combine, should_start_delivery};
use crate::connectivity::Subscription;
use crate::domain::{QueuedMessage, usable_endpoint};
use crate::sender::MessageSender;
use crate::store::QueueStore;

/// The coordinator task
///
/// Owns the store, the connectivity subscription and the sending flag.
/// Every input is handled to completion before the next one, so state
/// transitions are serialized without locks.
pub(crate) struct CoordinatorTask {
    store: Box<dyn QueueStore>,
    sender: Arc<dyn MessageSender>,
    connectivity: Subscription,
    config: CoordinatorConfig,
    inputs: Inputs,
    consecutive_transient: u32,
    last_revision: u64,
    state_tx: watch::Sender<CoordinatorState>,
    /// Handed to delivery workers; weak so dropped handles end the actor
    worker_tx: mpsc::WeakSender<CoordRequest>,
}

impl CoordinatorTask {
    pub(crate) fn new(
        mut store: Box<dyn QueueStore>,
        connectivity: Subscription,
        sender: Arc<dyn MessageSender>,
        config: CoordinatorConfig,
        worker_tx: mpsc::WeakSender<CoordRequest>,
    ) -> CoordResult<(Self, watch::Receiver<CoordinatorState>)> {
        debug!(?config, "CoordinatorTask::new: called");
        let inputs = Inputs {
            messages: store.list()?,
            endpoint: store.endpoint()?,
            deliverable: connectivity.current(),
            ..Default::default()
        };
        let last_revision = store.revision()?;
        let (state_tx, state_rx) = watch::channel(combine(&inputs));

        let coordinator = Self {
            store,
            sender,
            connectivity,
            config,
            inputs,
            consecutive_transient: 0,
            last_revision,
            state_tx,
            worker_tx,
        };
        Ok((coordinator, state_rx))
    }

    /// Run the coordinator event loop
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<CoordRequest>) {
        info!(
            queued = self.inputs.messages.len(),
            deliverable = self.inputs.deliverable,
            "Coordinator started"
        );
        self.settle();

        let poll_enabled = self.config.store_poll_interval().is_some();
        let period = self.config.store_poll_interval().unwrap_or(Duration::from_secs(3600));
        let mut store_poll = tokio::time::interval_at(Instant::now() + period, period);
        store_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut monitor_open = true;

        loop {
            let retry_at = self.inputs.retry_at;

            tokio::select! {
                request = rx.recv() => {
                    let Some(request) = request else {
                        debug!("CoordinatorTask::run: all handles dropped");
                        break;
                    };
                    if !self.handle_request(request) {
                        break;
                    }
                }

                online = self.connectivity.next(), if monitor_open => {
                    match online {
                        Some(online) => self.on_connectivity(online),
                        None => {
                            warn!("Connectivity monitor closed, treating network as unavailable");
                            monitor_open = false;
                            self.on_connectivity(false);
                        }
                    }
                }

                _ = store_poll.tick(), if poll_enabled => {
                    self.poll_store();
                }

                _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    debug!("CoordinatorTask::run: retry backoff elapsed");
                    self.inputs.retry_at = None;
                    self.settle();
                }
            }
        }

        info!("Coordinator stopped");
    }

    /// Handle one request; false means stop
    fn handle_request(&mut self, request: CoordRequest) -> bool {
        match request {
            CoordRequest::AddMessage { content, reply_tx } => {
                let result = self.add_message(&content);
                self.settle();
                let _ = reply_tx.send(result);
            }

            CoordRequest::CancelMessage { id, reply_tx } => {
                debug!(%id, "Coordinator: cancel message");
                let result: CoordResult<()> = self.store.remove(&id).map_err(Into::into);
                self.reload_messages();
                self.settle();
                let _ = reply_tx.send(result);
            }

            CoordRequest::ClearMessages { reply_tx } => {
                let result: CoordResult<()> = self.store.clear().map_err(Into::into);
                self.reload_messages();
                self.settle();
                info!("Queue cleared");
                let _ = reply_tx.send(result);
            }

            CoordRequest::SetEndpoint { url, reply_tx } => {
                let result = self.set_endpoint(url);
                self.settle();
                let _ = reply_tx.send(result);
            }

            CoordRequest::ClearError { reply_tx } => {
                self.inputs.last_error = None;
                self.settle();
                let _ = reply_tx.send(());
            }

            CoordRequest::SetEditConfig { visible, reply_tx } => {
                self.inputs.show_edit_config = visible;
                self.settle();
                let _ = reply_tx.send(());
            }

            CoordRequest::StillQueued { id, reply_tx } => {
                if self.reload_messages() {
                    self.settle();
                }
                let queued = self.inputs.messages.iter().any(|m| m.id == id);
                let _ = reply_tx.send(queued);
            }

            CoordRequest::Delivered { id, reply_tx } => {
                let result: CoordResult<()> = self.store.remove(&id).map_err(Into::into);
                if result.is_ok() {
                    self.consecutive_transient = 0;
                    self.inputs.retry_at = None;
                }
                self.reload_messages();
                self.settle();
                let _ = reply_tx.send(result);
            }

            CoordRequest::DeliveryFinished { report } => {
                self.on_delivery_finished(report);
                self.settle();
            }

            CoordRequest::Shutdown { reply_tx } => {
                info!("Coordinator shutting down");
                let _ = reply_tx.send(());
                return false;
            }
        }
        true
    }

    fn add_message(&mut self, content: &str) -> CoordResult<Option<String>> {
        let Some(message) = QueuedMessage::new(content) else {
            debug!("CoordinatorTask::add_message: blank content ignored");
            return Ok(None);
        };

        self.store.append(&message)?;
        info!(id = %message.id, "Message queued");
        self.reload_messages();
        self.resume();
        Ok(Some(message.id))
    }

    fn set_endpoint(&mut self, url: String) -> CoordResult<()> {
        let url = url.trim();
        if url.is_empty() {
            return Ok(());
        }

        self.store.set_endpoint(url)?;
        info!(endpoint = %url, "Endpoint updated");
        self.inputs.endpoint = Some(url.to_string());
        self.inputs.show_edit_config = false;
        self.resume();
        Ok(())
    }

    fn on_connectivity(&mut self, online: bool) {
        let was_online = self.inputs.deliverable;
        self.inputs.deliverable = online;
        if online && !was_online {
            info!("Network available");
            self.resume();
        } else if !online && was_online {
            info!("Network lost");
        }
        self.settle();
    }

    fn on_delivery_finished(&mut self, report: LoopReport) {
        debug!(?report, "CoordinatorTask::on_delivery_finished: called");
        self.inputs.sending = false;

        match report.exit {
            LoopExit::Exhausted => {}
            LoopExit::ConnectivityLost => {
                self.inputs.deliverable = self.connectivity.current();
            }
            LoopExit::Transient { detail } => {
                self.consecutive_transient += 1;
                match self.config.transient_backoff(self.consecutive_transient) {
                    Some(delay) => {
                        info!(%detail, ?delay, attempt = self.consecutive_transient, "Network failure, retrying later");
                        self.inputs.retry_at = Some(Instant::now() + delay);
                    }
                    None => {
                        info!(%detail, "Network failure, waiting for connectivity change");
                        self.inputs.halted = true;
                    }
                }
            }
            LoopExit::Surfaced { message } => {
                warn!(%message, "Delivery failed");
                self.inputs.last_error = Some(message);
                self.inputs.halted = true;
            }
            LoopExit::Aborted => {
                error!("Delivery stopped unexpectedly");
                self.inputs.last_error = Some("Delivery stopped unexpectedly".to_string());
                self.inputs.halted = true;
            }
        }

        self.reload_messages();
    }

    /// Pick up writes made by other processes sharing the store
    fn poll_store(&mut self) {
        let revision = match self.store.revision() {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to read store revision: {}", e);
                return;
            }
        };
        if revision == self.last_revision {
            return;
        }

        debug!(revision, "CoordinatorTask::poll_store: external change");
        self.last_revision = revision;
        self.reload_messages();
        match self.store.endpoint() {
            Ok(endpoint) => self.inputs.endpoint = endpoint,
            Err(e) => warn!("Failed to reload endpoint: {}", e),
        }
        self.resume();
        self.settle();
    }

    /// Refresh the message list from the store; true if it changed
    fn reload_messages(&mut self) -> bool {
        match self.store.list() {
            Ok(messages) if messages != self.inputs.messages => {
                self.inputs.messages = messages;
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!("Failed to read queue: {}", e);
                false
            }
        }
    }

    /// A qualifying input changed: lift any halt and skip remaining backoff
    fn resume(&mut self) {
        self.inputs.halted = false;
        self.inputs.retry_at = None;
    }

    /// Evaluate the trigger, then publish one snapshot
    fn settle(&mut self) {
        self.maybe_start_delivery();
        self.publish();
    }

    /// The only place a delivery worker is started
    fn maybe_start_delivery(&mut self) {
        if !should_start_delivery(&self.inputs, Instant::now()) {
            return;
        }
        let Some(endpoint) = usable_endpoint(self.inputs.endpoint.as_deref()).map(str::to_string) else {
            return;
        };
        let Some(tx) = self.worker_tx.upgrade() else {
            return;
        };

        info!(count = self.inputs.messages.len(), "Starting delivery");
        self.inputs.sending = true;
        self.inputs.last_error = None;
        self.inputs.retry_at = None;

        let job = DeliveryJob {
            endpoint,
            messages: self.inputs.messages.clone(),
            sender: self.sender.clone(),
            connectivity: self.connectivity.watcher(),
        };
        tokio::spawn(delivery::run(job, tx));
    }

    fn publish(&self) {
        let next = combine(&self.inputs);
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
