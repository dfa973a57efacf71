//! Operator notifications for pipeline events. Channels are configured
//! purely from environment variables; an unconfigured channel is a silent
//! no-op so local runs need no setup.

pub mod discord;
pub mod email;
pub mod slack;

use anyhow::Result;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    BatchFailed,
    BatchCompleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BatchFailed => "batch failed",
            EventKind::BatchCompleted => "batch completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub detail: String,
    pub ts: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, ev: &NotificationEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fan-out over every configured channel. Delivery is best-effort: a failing
/// webhook must never take the pipeline down, so errors are logged and
/// swallowed here.
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn from_env() -> Self {
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();
        if std::env::var("SLACK_WEBHOOK_URL").is_ok() {
            channels.push(Box::new(slack::SlackNotifier::from_env()));
        }
        if std::env::var("DISCORD_WEBHOOK_URL").is_ok() {
            channels.push(Box::new(discord::DiscordNotifier::from_env()));
        }
        if std::env::var("SMTP_HOST").is_ok() {
            match email::EmailNotifier::from_env() {
                Ok(n) => channels.push(Box::new(n)),
                Err(e) => tracing::warn!("email notifier disabled: {e:#}"),
            }
        }
        Self { channels }
    }

    /// A mux with no channels; used in tests and minimal deployments.
    pub fn disabled() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub async fn notify(&self, ev: &NotificationEvent) {
        for ch in &self.channels {
            if let Err(e) = ch.send(ev).await {
                tracing::warn!(channel = ch.name(), "notification failed: {e:#}");
            }
        }
    }
}
