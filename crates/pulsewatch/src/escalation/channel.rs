//! Notification channel seams and their logging implementations.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ChannelError;

/// Sends an SMS to a phone number
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Channel name
    fn name(&self) -> &str;

    /// Send `message` to `to`; returns the provider message id
    async fn send(&self, to: &str, message: &str) -> Result<String, ChannelError>;
}

/// Publishes an alert to a topic fanned out to subscribers
#[async_trait]
pub trait PubSubPublisher: Send + Sync {
    /// Channel name
    fn name(&self) -> &str;

    /// Publish `message` with `subject` on `topic`; returns the provider message id
    async fn publish(&self, topic: &str, subject: &str, message: &str) -> Result<String, ChannelError>;
}

/// Produces a short natural-language health summary
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Channel name
    fn name(&self) -> &str;

    /// Summarize the data embedded in `prompt`
    async fn summarize(&self, prompt: &str) -> Result<String, ChannelError>;
}

/// SMS sender that only logs the message
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    fn name(&self) -> &str {
        "log-sms"
    }

    async fn send(&self, to: &str, message: &str) -> Result<String, ChannelError> {
        if to.trim().is_empty() {
            return Err(ChannelError::InvalidRecipient(to.to_string()));
        }
        let message_id = Uuid::new_v4().to_string();
        tracing::info!(to, message_id = %message_id, body = message, "SMS sent");
        Ok(message_id)
    }
}

/// Pub/sub publisher that only logs the message
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPubSubPublisher;

#[async_trait]
impl PubSubPublisher for LogPubSubPublisher {
    fn name(&self) -> &str {
        "log-pubsub"
    }

    async fn publish(&self, topic: &str, subject: &str, message: &str) -> Result<String, ChannelError> {
        let message_id = Uuid::new_v4().to_string();
        tracing::info!(topic, subject, message_id = %message_id, body = message, "Alert published");
        Ok(message_id)
    }
}

/// Offline summarizer.
///
/// Echoes the data lines of the prompt (those of the form `Key: value`)
/// as a one-line summary, without calling a model.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateSummarizer;

#[async_trait]
impl Summarizer for TemplateSummarizer {
    fn name(&self) -> &str {
        "template"
    }

    async fn summarize(&self, prompt: &str) -> Result<String, ChannelError> {
        let facts: Vec<&str> = prompt
            .lines()
            .map(str::trim)
            .filter(|line| line.split_once(": ").is_some())
            .collect();
        if facts.is_empty() {
            return Err(ChannelError::Rejected("prompt carries no data".to_string()));
        }
        Ok(format!("Offline summary. {}.", facts.join("; ")))
    }
}
