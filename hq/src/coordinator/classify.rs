//! Delivery failure classification
//!
//! Connectivity-class failures are retried silently; the status already
//! shows the queue is offline. Everything else goes to the error slot.

use crate::sender::SendFailure;

/// Substrings (lowercase) that mark a failure as caused by the network
pub const TRANSIENT_SIGNATURES: &[&str] = &[
    "unable to resolve host",
    "no address associated with hostname",
    "network is unreachable",
    "connection refused",
    // glibc / Rust resolver spellings of a failed host lookup
    "failed to lookup address information",
    "name or service not known",
    "temporary failure in name resolution",
];

/// Fallback text when a failure carries no detail
const GENERIC_FAILURE: &str = "Failed to send message";

/// What the delivery loop should do with a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureClass {
    /// Stop quietly and retry later
    Transient,
    /// Stop and show this message
    Surfaced(String),
}

/// Case-insensitive match against the connectivity signatures
pub fn is_transient(detail: &str) -> bool {
    let detail = detail.to_lowercase();
    TRANSIENT_SIGNATURES.iter().any(|sig| detail.contains(sig))
}

pub fn classify(failure: &SendFailure) -> FailureClass {
    if is_transient(&failure.detail) {
        return FailureClass::Transient;
    }

    let message = failure.detail.trim();
    if message.is_empty() {
        FailureClass::Surfaced(GENERIC_FAILURE.to_string())
    } else {
        FailureClass::Surfaced(message.to_string())
    }
}
