//! Domain types for hookqueue
//!
//! QueuedMessage is the only persisted record; the endpoint is a plain
//! optional string next to it in the store.

mod id;
mod message;

pub use id::IdResolver;
pub use message::{QueuedMessage, now_ms, short_id};

/// Returns the endpoint if it is present and not blank
pub fn usable_endpoint(endpoint: Option<&str>) -> Option<&str> {
    endpoint.map(str::trim).filter(|url| !url.is_empty())
}
