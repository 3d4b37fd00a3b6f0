//! Webhook delivery: alerts are fanned out concurrently to every
//! configured destination and failures are collected, never retried.

use futures_util::future::join_all;
use reqwest::{Client, StatusCode};
use serde_json::json;

/// Destination kind, which determines the JSON envelope a webhook expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Slack,
    Discord,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Slack => write!(f, "Slack"),
            Channel::Discord => write!(f, "Discord"),
        }
    }
}

/// Webhook URLs for one alert category. An empty string means the
/// destination is not configured and is skipped during delivery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Webhooks {
    pub slack: String,
    pub discord: String,
}

impl Webhooks {
    pub fn new(slack: String, discord: String) -> Self {
        Self { slack, discord }
    }
}

/// A single alert bound for one webhook group. Immutable once built and
/// consumed exactly once by the notifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub webhooks: Webhooks,
    pub message: String,
}

impl Alert {
    pub fn new(webhooks: Webhooks, message: String) -> Self {
        Self { webhooks, message }
    }
}

/// Delivery failure for one destination. Webhook URLs are credentials and
/// never appear in these errors.
#[derive(Debug, Clone)]
pub enum NotifyError {
    Request(Channel, String),
    Status(Channel, u16),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Request(channel, reason) => {
                write!(f, "error posting message to {}: {}", channel, reason)
            }
            NotifyError::Status(channel, code) => {
                write!(f, "{} returned non-success HTTP status: {}", channel, code)
            }
        }
    }
}

impl std::error::Error for NotifyError {}

/// Posts alerts to their configured webhooks, one concurrent task per
/// destination, and reports per-destination failures to the caller.
pub struct Notifier {
    client: Client,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Delivers one alert to every configured destination. Each delivery
    /// runs on its own task; all tasks are joined before returning. One
    /// destination failing never blocks or cancels the others, and there
    /// is no retry.
    pub async fn notify(&self, alert: &Alert) -> Vec<NotifyError> {
        let mut channels = Vec::new();
        let mut handles = Vec::new();

        if !alert.webhooks.slack.is_empty() {
            channels.push(Channel::Slack);
            handles.push(tokio::spawn(post(
                self.client.clone(),
                Channel::Slack,
                alert.webhooks.slack.clone(),
                json!({ "text": alert.message }),
            )));
        }
        if !alert.webhooks.discord.is_empty() {
            channels.push(Channel::Discord);
            handles.push(tokio::spawn(post(
                self.client.clone(),
                Channel::Discord,
                alert.webhooks.discord.clone(),
                json!({ "content": alert.message }),
            )));
        }

        let mut errors = Vec::new();
        for (channel, joined) in channels.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(e) => errors.push(NotifyError::Request(
                    channel,
                    format!("delivery task failed: {}", e),
                )),
            }
        }
        errors
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

async fn post(
    client: Client,
    channel: Channel,
    url: String,
    payload: serde_json::Value,
) -> Result<(), NotifyError> {
    let response = client
        .post(&url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| NotifyError::Request(channel, e.without_url().to_string()))?;

    // Some chat providers return No Content on success.
    match response.status() {
        StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
        status => Err(NotifyError::Status(channel, status.as_u16())),
    }
}
