//! hookqueue - offline-tolerant webhook message queue
//!
//! Messages are persisted first and delivered to a single webhook endpoint
//! whenever the network allows, oldest first, one at a time. Connectivity
//! failures are retried quietly; anything else halts delivery and is shown
//! to the user.
//!
//! # Modules
//!
//! - [`domain`] - Queued message record and id lookup
//! - [`store`] - Durable queue and endpoint storage
//! - [`connectivity`] - Network availability signal
//! - [`sender`] - One-shot webhook delivery
//! - [`coordinator`] - Delivery loop and derived state
//! - [`view`] - Presentation snapshot
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod domain;
pub mod sender;
pub mod store;
pub mod view;

// Re-export commonly used types
pub use config::Config;
pub use connectivity::{ConnectivityMonitor, ProbeMonitor, StaticMonitor, Subscription};
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorState, Status};
pub use domain::QueuedMessage;
pub use sender::{FailureKind, MessageSender, SendFailure, SendOutcome, WebhookSender};
pub use store::{QueueStore, SqliteStore, StoreError};
pub use view::ViewState;
