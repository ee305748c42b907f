//! QueuedMessage - a single pending webhook message

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A message waiting for delivery
///
/// Immutable once created. It leaves the queue only after a confirmed
/// delivery or an explicit cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    /// Unique, time-ordered identifier (UUIDv7)
    pub id: String,

    /// Message text, never blank
    pub content: String,

    /// When the message was queued (Unix milliseconds)
    pub timestamp: i64,
}

impl QueuedMessage {
    /// Create a message from user input
    ///
    /// Returns None for blank content; surrounding whitespace is trimmed.
    pub fn new(content: &str) -> Option<Self> {
        debug!(content_len = content.len(), "QueuedMessage::new: called");
        let content = content.trim();
        if content.is_empty() {
            debug!("QueuedMessage::new: blank content, rejecting");
            return None;
        }

        Some(Self {
            id: Uuid::now_v7().to_string(),
            content: content.to_string(),
            timestamp: now_ms(),
        })
    }

    /// Create a message with a fixed id (restores and tests)
    pub fn with_id(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            timestamp: now_ms(),
        }
    }

    /// Short id for display (first 8 chars)
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// First 8 characters of an id, cut on a char boundary
pub fn short_id(id: &str) -> &str {
    let end = id.char_indices().nth(8).map(|(i, _)| i).unwrap_or(id.len());
    &id[..end]
}
