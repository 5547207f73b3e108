pub mod discord;
pub mod email;
pub mod telegram;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::antiflutter::AlertEvent;

/// What a channel delivers: a short subject line plus the full text.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub topic: Option<String>,
    pub subject: String,
    pub body: String,
    pub ts: DateTime<Utc>,
}

impl Notification {
    pub fn from_alert(ev: &AlertEvent) -> Self {
        Self {
            topic: Some(ev.topic.clone()),
            subject: format!("{} sentiment alert ({:.0}%)", ev.topic, ev.ratio * 100.0),
            body: ev.message(),
            ts: ev.at,
        }
    }

    pub fn text(message: impl Into<String>) -> Self {
        let body = message.into();
        Self {
            topic: None,
            subject: "Sentiment monitor".to_string(),
            body,
            ts: Utc::now(),
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, n: &Notification) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Outcome of fanning a notification out to every channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// At least one channel accepted the notification.
    Delivered,
    /// Every channel failed (or none is configured); one entry per channel.
    DeliveryFailed(Vec<String>),
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// Logs the notification; always succeeds.
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier;

#[async_trait::async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, n: &Notification) -> Result<()> {
        tracing::info!(target: "notify", topic = ?n.topic, "NOTIFICATION: {}", n.body);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[derive(Clone, Default)]
pub struct NotifierMux {
    channels: Vec<Arc<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: Arc<dyn Notifier>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn push(&mut self, channel: Arc<dyn Notifier>) {
        self.channels.push(channel);
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Send through every channel in order. One failing channel does not stop
    /// the others.
    pub async fn notify(&self, n: &Notification) -> Delivery {
        if self.channels.is_empty() {
            return Delivery::DeliveryFailed(vec!["no notification channel configured".into()]);
        }

        let mut delivered = false;
        let mut failures = Vec::new();
        for ch in &self.channels {
            match ch.send(n).await {
                Ok(()) => delivered = true,
                Err(e) => {
                    tracing::warn!(
                        target: "notify",
                        channel = ch.name(),
                        error = %format!("{e:#}"),
                        "delivery failed"
                    );
                    failures.push(format!("{}: {e:#}", ch.name()));
                }
            }
        }

        if delivered {
            Delivery::Delivered
        } else {
            Delivery::DeliveryFailed(failures)
        }
    }
}
