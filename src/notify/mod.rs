// src/notify/mod.rs
pub mod discord;
pub mod email;
pub mod memory;
pub mod slack;

use std::sync::Arc;

use anyhow::Result;
use metrics::counter;

use crate::digest::Digest;

pub use discord::DiscordNotifier;
pub use email::EmailSender;
pub use memory::MemoryNotifier;
pub use slack::SlackNotifier;

/// A single lead-time alarm for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmMessage {
    pub title: String,
    pub event_name: String,
    pub currency: String,
    pub region: String,
    pub time: String,
    pub lead_minutes: i64,
}

impl AlarmMessage {
    pub fn body(&self) -> String {
        format!(
            "**Event:** {}\n**Currency:** {}\n**Region:** {}\n**Starts:** {} (in {} min)",
            self.event_name, self.currency, self.region, self.time, self.lead_minutes
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Digest(Digest),
    Alarm(AlarmMessage),
}

impl Notification {
    pub fn title(&self) -> &str {
        match self {
            Notification::Digest(d) => &d.title,
            Notification::Alarm(a) => &a.title,
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::Digest(d) => d.body(),
            Notification::Alarm(a) => a.body(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Digest(_) => "digest",
            Notification::Alarm(_) => "alarm",
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, n: &Notification) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fans a notification out to every configured channel. Delivery is fire-and-forget:
/// failures are logged and counted, never returned.
#[derive(Clone, Default)]
pub struct NotifierMux {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    /// Discord / Slack / email, each enabled only when its env is present.
    pub fn from_env() -> Self {
        let mut sinks: Vec<Arc<dyn Notifier>> = Vec::new();
        if let Ok(url) = std::env::var("DISCORD_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                sinks.push(Arc::new(DiscordNotifier::new(url)));
            }
        }
        if let Ok(url) = std::env::var("SLACK_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                sinks.push(Arc::new(SlackNotifier::new(url)));
            }
        }
        match EmailSender::from_env() {
            Ok(Some(email)) => sinks.push(Arc::new(email)),
            Ok(None) => {}
            Err(e) => tracing::warn!(target: "notify", error = ?e, "email disabled"),
        }
        Self { sinks }
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Returns how many channels accepted the notification.
    pub async fn notify(&self, n: &Notification) -> usize {
        if self.sinks.is_empty() {
            tracing::info!(
                target: "notify",
                kind = n.kind(),
                title = n.title(),
                body = %n.body(),
                "no channels configured; logging only"
            );
            return 0;
        }

        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.send(n).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        target: "notify",
                        channel = sink.name(),
                        kind = n.kind(),
                        error = ?e,
                        "delivery failed"
                    );
                    counter!("notify_failures_total", "channel" => sink.name()).increment(1);
                }
            }
        }
        delivered
    }
}
