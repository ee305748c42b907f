//! Message delivery transport
//!
//! A sender performs exactly one delivery attempt per call and never touches
//! the queue. Retrying is the coordinator's business.

mod webhook;

use std::fmt;

use async_trait::async_trait;

pub use webhook::WebhookSender;

/// Broad category of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The endpoint URL could not be used at all
    InvalidEndpoint,
    /// No connection could be established
    Connect,
    /// The attempt did not finish in time
    Timeout,
    /// The endpoint answered with a non-2xx status
    Status(u16),
    /// Any other transport or protocol error
    Request,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEndpoint => write!(f, "invalid-endpoint"),
            Self::Connect => write!(f, "connect"),
            Self::Timeout => write!(f, "timeout"),
            Self::Status(code) => write!(f, "status-{}", code),
            Self::Request => write!(f, "request"),
        }
    }
}

/// Why an attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub kind: FailureKind,
    /// Human-readable detail, including any OS error text
    pub detail: String,
}

impl SendFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for SendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.detail, self.kind)
    }
}

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Failed(SendFailure),
}

impl SendOutcome {
    pub fn failed(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failed(SendFailure::new(kind, detail))
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Stateless delivery transport
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Attempt to deliver `content` to `endpoint` once
    async fn send(&self, endpoint: &str, content: &str) -> SendOutcome;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        let failure = SendFailure::new(FailureKind::Status(404), "Failed to send message: 404 Not Found");
        assert_eq!(failure.to_string(), "Failed to send message: 404 Not Found (status-404)");
    }

    #[test]
    fn test_outcome_helpers() {
        assert!(SendOutcome::Delivered.is_delivered());
        assert!(!SendOutcome::failed(FailureKind::Connect, "Connection refused").is_delivered());
    }
}
