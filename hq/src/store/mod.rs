//! Durable message queue storage
//!
//! The store is a dumb key-value persistence layer: an ordered list of
//! pending messages and the configured endpoint. It has no delivery logic.
//! The coordinator owns exactly one store and is its only writer within a
//! process.

mod sqlite;

use thiserror::Error;

use crate::domain::QueuedMessage;

pub use sqlite::SqliteStore;

/// Logical slot holding the JSON array of queued messages
pub const QUEUED_MESSAGES_KEY: &str = "queued_messages";

/// Logical slot holding the webhook URL
pub const WEBHOOK_URL_KEY: &str = "webhook_url";

/// Errors from store operations
///
/// Corrupt queue data is not an error: it reads back as an empty queue.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to prepare store location: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable ordered queue plus the endpoint slot
///
/// Every mutation is durable by the time it returns, and `list()` always
/// reflects every mutation that returned before it.
pub trait QueueStore: Send {
    /// Append a message at the tail
    fn append(&mut self, message: &QueuedMessage) -> StoreResult<()>;

    /// Remove a message by id; unknown ids are a no-op
    fn remove(&mut self, id: &str) -> StoreResult<()>;

    /// Remove every queued message
    fn clear(&mut self) -> StoreResult<()>;

    /// Queued messages in insertion order
    fn list(&mut self) -> StoreResult<Vec<QueuedMessage>>;

    /// The configured endpoint, if any
    fn endpoint(&mut self) -> StoreResult<Option<String>>;

    /// Replace the configured endpoint
    fn set_endpoint(&mut self, url: &str) -> StoreResult<()>;

    /// Changes whenever another writer commits to the same storage
    ///
    /// Stores that cannot be shared between processes keep the default.
    fn revision(&mut self) -> StoreResult<u64> {
        Ok(0)
    }
}
