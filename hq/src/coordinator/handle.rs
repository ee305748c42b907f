//! Coordinator - client interface to the delivery coordinator task

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use super::config::CoordinatorConfig;
use super::core::CoordinatorTask;
use super::messages::{CoordRequest, CoordResult, CoordinatorError};
use super::state::CoordinatorState;
use crate::connectivity::ConnectivityMonitor;
use crate::sender::MessageSender;
use crate::store::QueueStore;

/// Handle to a running coordinator
///
/// Cloneable. The coordinator task stops when `shutdown` is called or when
/// the last handle is dropped; its connectivity subscription goes with it.
#[derive(Clone)]
pub struct Coordinator {
    tx: mpsc::Sender<CoordRequest>,
    state_rx: watch::Receiver<CoordinatorState>,
}

impl Coordinator {
    /// Load the store, subscribe to connectivity and start the task
    ///
    /// Must be called from within a tokio runtime. If the store already
    /// holds messages and the network is usable, delivery starts right away.
    pub fn spawn(
        store: impl QueueStore + 'static,
        monitor: &dyn ConnectivityMonitor,
        sender: Arc<dyn MessageSender>,
        config: CoordinatorConfig,
    ) -> CoordResult<Self> {
        debug!("Coordinator::spawn: called");
        let (tx, rx) = mpsc::channel(config.channel_buffer.max(1));
        let (task, state_rx) = CoordinatorTask::new(Box::new(store), monitor.subscribe(), sender, config, tx.downgrade())?;

        tokio::spawn(task.run(rx));
        info!("Coordinator spawned");

        Ok(Self { tx, state_rx })
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> CoordRequest) -> CoordResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Queue a message and try to deliver it
    ///
    /// Returns the new message id, or None when `content` is blank.
    pub async fn add_message(&self, content: &str) -> CoordResult<Option<String>> {
        debug!(content_len = content.len(), "Coordinator::add_message: called");
        if content.trim().is_empty() {
            debug!("Coordinator::add_message: blank content, ignoring");
            return Ok(None);
        }
        let content = content.to_string();
        self.request(|reply_tx| CoordRequest::AddMessage { content, reply_tx })
            .await?
    }

    /// Remove a queued message; unknown ids are a no-op
    pub async fn cancel_message(&self, id: &str) -> CoordResult<()> {
        debug!(%id, "Coordinator::cancel_message: called");
        let id = id.to_string();
        self.request(|reply_tx| CoordRequest::CancelMessage { id, reply_tx })
            .await?
    }

    /// Remove every queued message
    pub async fn clear_messages(&self) -> CoordResult<()> {
        debug!("Coordinator::clear_messages: called");
        self.request(|reply_tx| CoordRequest::ClearMessages { reply_tx }).await?
    }

    /// Persist a new endpoint and re-evaluate delivery
    ///
    /// The url is trimmed. Blank input is ignored.
    pub async fn set_endpoint(&self, url: &str) -> CoordResult<()> {
        debug!(%url, "Coordinator::set_endpoint: called");
        let url = url.trim();
        if url.is_empty() {
            debug!("Coordinator::set_endpoint: blank url, ignoring");
            return Ok(());
        }
        let url = url.to_string();
        self.request(|reply_tx| CoordRequest::SetEndpoint { url, reply_tx })
            .await?
    }

    /// Dismiss the surfaced error
    pub async fn clear_error(&self) -> CoordResult<()> {
        debug!("Coordinator::clear_error: called");
        self.request(|reply_tx| CoordRequest::ClearError { reply_tx }).await
    }

    pub async fn show_edit_config(&self) -> CoordResult<()> {
        self.request(|reply_tx| CoordRequest::SetEditConfig {
            visible: true,
            reply_tx,
        })
        .await
    }

    pub async fn hide_edit_config(&self) -> CoordResult<()> {
        self.request(|reply_tx| CoordRequest::SetEditConfig {
            visible: false,
            reply_tx,
        })
        .await
    }

    /// The most recently published state
    pub fn snapshot(&self) -> CoordinatorState {
        self.state_rx.borrow().clone()
    }

    /// Receiver that sees one value per state change
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        let mut rx = self.state_rx.clone();
        rx.mark_unchanged();
        rx
    }

    /// Wait until the published state satisfies `predicate`
    pub async fn wait_for(&self, mut predicate: impl FnMut(&CoordinatorState) -> bool) -> CoordResult<CoordinatorState> {
        let mut rx = self.state_rx.clone();
        let state = rx
            .wait_for(|state| predicate(state))
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;
        Ok(state.clone())
    }

    /// Wait until no delivery loop is running
    pub async fn settled(&self) -> CoordResult<CoordinatorState> {
        self.wait_for(|state| !state.sending).await
    }

    /// Stop the coordinator task
    pub async fn shutdown(&self) -> CoordResult<()> {
        debug!("Coordinator::shutdown: called");
        self.request(|reply_tx| CoordRequest::Shutdown { reply_tx }).await
    }
}
