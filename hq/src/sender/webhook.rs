//! HTTP webhook sender
//!
//! POSTs `{"content": "..."}` to the endpoint. Any 2xx is a delivery; every
//! other outcome is a failure whose detail carries the status code or the
//! full transport error chain.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, warn};

use super::{FailureKind, MessageSender, SendOutcome};
use crate::config::SenderConfig;

/// JSON body of a webhook delivery
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// MessageSender backed by reqwest
pub struct WebhookSender {
    http: Client,
}

impl WebhookSender {
    /// Create a sender with the given per-request timeout
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        debug!(?timeout, %user_agent, "WebhookSender::new: called");
        let http = Client::builder().timeout(timeout).user_agent(user_agent).build()?;
        Ok(Self { http })
    }

    /// Create a sender from the sender section of the config
    pub fn from_config(config: &SenderConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.timeout(), &config.user_agent)
    }
}

/// Flatten an error and its sources into one line
///
/// reqwest hides the OS message ("Connection refused", resolver errors)
/// several levels down the source chain.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        source = inner.source();
    }
    parts.join(": ")
}

fn classify_transport_error(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() {
        FailureKind::Connect
    } else if err.is_builder() {
        FailureKind::InvalidEndpoint
    } else {
        FailureKind::Request
    }
}

#[async_trait]
impl MessageSender for WebhookSender {
    async fn send(&self, endpoint: &str, content: &str) -> SendOutcome {
        debug!(%endpoint, content_len = content.len(), "WebhookSender::send: called");

        let url = match Url::parse(endpoint) {
            Ok(url) => url,
            Err(e) => {
                debug!(error = %e, "WebhookSender::send: invalid endpoint");
                return SendOutcome::failed(FailureKind::InvalidEndpoint, format!("Invalid webhook URL: {}", e));
            }
        };

        let response = match self.http.post(url).json(&WebhookPayload { content }).send().await {
            Ok(r) => r,
            Err(e) => {
                let kind = classify_transport_error(&e);
                let detail = error_chain(&e);
                debug!(%kind, %detail, "WebhookSender::send: request failed");
                return SendOutcome::failed(kind, detail);
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!(%status, "WebhookSender::send: delivered");
            return SendOutcome::Delivered;
        }

        warn!(%status, "Webhook rejected message");
        SendOutcome::failed(
            FailureKind::Status(status.as_u16()),
            format!("Failed to send message: {}", status),
        )
    }
}
