//! Message types for the Coordinator

use thiserror::Error;
use tokio::sync::oneshot;

use crate::store::StoreError;

/// Errors returned by coordinator operations
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Coordinator channel closed")]
    ChannelClosed,
}

/// Result alias for coordinator operations
pub type CoordResult<T> = Result<T, CoordinatorError>;

/// Why a delivery loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// Every message in the snapshot was delivered or skipped
    Exhausted,
    /// Connectivity went away between sends
    ConnectivityLost,
    /// A connectivity-class failure; retried later without an error
    Transient { detail: String },
    /// A failure the user should see
    Surfaced { message: String },
    /// The worker ended without reporting (panic or coordinator gone)
    Aborted,
}

/// Summary a delivery worker reports when it ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopReport {
    pub exit: LoopExit,
    pub delivered: usize,
}

/// Internal requests to the Coordinator task
#[derive(Debug)]
pub enum CoordRequest {
    /// Enqueue a message; replies with the new id, None if content was blank
    AddMessage {
        content: String,
        reply_tx: oneshot::Sender<CoordResult<Option<String>>>,
    },

    /// Remove a queued message by id
    CancelMessage {
        id: String,
        reply_tx: oneshot::Sender<CoordResult<()>>,
    },

    /// Remove every queued message
    ClearMessages {
        reply_tx: oneshot::Sender<CoordResult<()>>,
    },

    /// Store a new endpoint (already trimmed, never blank)
    SetEndpoint {
        url: String,
        reply_tx: oneshot::Sender<CoordResult<()>>,
    },

    /// Dismiss the surfaced error
    ClearError { reply_tx: oneshot::Sender<()> },

    /// Show or hide the endpoint editor
    SetEditConfig {
        visible: bool,
        reply_tx: oneshot::Sender<()>,
    },

    /// Worker asks whether a message is still queued before sending it
    StillQueued {
        id: String,
        reply_tx: oneshot::Sender<bool>,
    },

    /// Worker reports a confirmed delivery
    Delivered {
        id: String,
        reply_tx: oneshot::Sender<CoordResult<()>>,
    },

    /// Worker has stopped
    DeliveryFinished { report: LoopReport },

    /// Shutdown the coordinator
    Shutdown { reply_tx: oneshot::Sender<()> },
}
