//! Notification sinks
//!
//! Delivery is fire-and-forget: a failed post is logged and the launcher
//! carries on.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Destination for human-readable status lines
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn say(&self, message: &str);
}

/// Posts each message to a chat webhook
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

/// Webhook body. Mentions are disabled so relayed chat cannot ping anyone.
pub fn webhook_payload(message: &str) -> Value {
    json!({
        "content": message,
        "allowed_mentions": { "parse": [] },
    })
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn say(&self, message: &str) {
        let result = self
            .http
            .post(&self.url)
            .json(&webhook_payload(message))
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(response) => debug!(status = %response.status(), "Notification delivered"),
            Err(e) => warn!(error = %e, message = %message, "Failed to deliver notification"),
        }
    }
}

/// Writes messages to the log when no webhook is configured
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn say(&self, message: &str) {
        info!(target: "notify", message = %message, "Notification");
    }
}
