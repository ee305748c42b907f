//! Derived coordinator state
//!
//! Everything observers see is computed here by pure functions over the
//! coordinator's current inputs. The actor calls `combine` once per handled
//! input, which is what makes emissions glitch-free.

use serde::Serialize;
use tokio::time::Instant;

use crate::domain::{QueuedMessage, usable_endpoint};

/// Overall queue status, four mutually exclusive variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// A delivery loop is running
    Sending,
    /// Network usable and nothing is waiting
    OnlineReady,
    /// Nothing queued and no network
    Empty,
    /// Messages are waiting for the network
    OfflineWithQueue,
}

impl Status {
    pub fn derive(sending: bool, has_messages: bool, deliverable: bool) -> Self {
        match (sending, has_messages, deliverable) {
            (true, _, _) => Self::Sending,
            (false, false, true) => Self::OnlineReady,
            (false, false, false) => Self::Empty,
            (false, true, false) => Self::OfflineWithQueue,
            // Loop should already be running; shows as ready until it does
            (false, true, true) => Self::OnlineReady,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::OnlineReady => "online",
            Self::Empty => "empty",
            Self::OfflineWithQueue => "offline (queued)",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Snapshot published to every observer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorState {
    pub messages: Vec<QueuedMessage>,
    pub deliverable: bool,
    pub sending: bool,
    pub endpoint: Option<String>,
    pub last_error: Option<String>,
    pub show_edit_config: bool,
}

impl CoordinatorState {
    pub fn status(&self) -> Status {
        Status::derive(self.sending, !self.messages.is_empty(), self.deliverable)
    }

    pub fn endpoint_configured(&self) -> bool {
        usable_endpoint(self.endpoint.as_deref()).is_some()
    }
}

/// The coordinator's live inputs
///
/// `halted` and `retry_at` gate the delivery trigger but are not part of
/// the published state.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub messages: Vec<QueuedMessage>,
    pub deliverable: bool,
    pub sending: bool,
    pub endpoint: Option<String>,
    pub last_error: Option<String>,
    pub show_edit_config: bool,
    /// The last loop stopped on a failure; wait for a qualifying change
    pub halted: bool,
    /// Earliest moment a retry after transient failures may start
    pub retry_at: Option<Instant>,
}

/// Combine the current inputs into the published snapshot
pub fn combine(inputs: &Inputs) -> CoordinatorState {
    CoordinatorState {
        messages: inputs.messages.clone(),
        deliverable: inputs.deliverable,
        sending: inputs.sending,
        endpoint: inputs.endpoint.clone(),
        last_error: inputs.last_error.clone(),
        show_edit_config: inputs.show_edit_config,
    }
}

/// Delivery trigger condition
///
/// Endpoint configured, something queued, network usable, no loop running,
/// not halted, and any retry backoff has elapsed.
pub fn should_start_delivery(inputs: &Inputs, now: Instant) -> bool {
    usable_endpoint(inputs.endpoint.as_deref()).is_some()
        && !inputs.messages.is_empty()
        && inputs.deliverable
        && !inputs.sending
        && !inputs.halted
        && inputs.retry_at.is_none_or(|at| now >= at)
}
