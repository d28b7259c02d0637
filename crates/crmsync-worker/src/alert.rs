//! Failure escalation to an operator chat channel.
//!
//! Queue redelivery retries failed messages, so alerting on every failure
//! would be noisy. The [`AlertRouter`] only escalates on the final delivery
//! (receive count equal to the configured maximum) unless no maximum is
//! configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::batch::DeliveryContext;
use crate::envelope::Envelope;
use crate::error::BoxError;

/// Default channel name.
pub const DEFAULT_ALERT_CHANNEL: &str = "#alert-integration";

/// Default bound on alert delivery.
pub const DEFAULT_ALERT_TIMEOUT: Duration = Duration::from_secs(10);

/// One alert message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub channel: String,
    pub username: String,
    pub lines: Vec<String>,
}

impl Alert {
    /// Text body, one line per entry.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Chat transport. Best-effort.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), BoxError>;
}

/// Decides whether a failure is escalated and delivers the alert.
#[derive(Clone)]
pub struct AlertRouter {
    enabled: bool,
    channel_name: String,
    max_receives: Option<u32>,
    channel: Option<Arc<dyn AlertChannel>>,
    timeout: Duration,
}

impl AlertRouter {
    /// A router that never sends anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            channel_name: DEFAULT_ALERT_CHANNEL.to_string(),
            max_receives: None,
            channel: None,
            timeout: DEFAULT_ALERT_TIMEOUT,
        }
    }

    /// An enabled router delivering through `channel`.
    pub fn new(channel: Arc<dyn AlertChannel>) -> Self {
        Self {
            enabled: true,
            channel: Some(channel),
            ..Self::disabled()
        }
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = name.into();
        self
    }

    #[must_use]
    pub fn with_max_receives(mut self, max: Option<u32>) -> Self {
        self.max_receives = max;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns true when alerting is switched on and a channel is wired.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.channel.is_some()
    }

    /// Whether a failure of `message` on this delivery should be escalated.
    ///
    /// Without a configured maximum every failure alerts. Otherwise only the
    /// delivery whose receive count equals the maximum alerts. A missing or
    /// unparsable count alerts.
    pub fn should_alert(&self, message: &Envelope, delivery: &DeliveryContext) -> bool {
        let Some(max) = self.max_receives else {
            return true;
        };

        let raw = delivery.approximate_receive_count.as_deref().map(str::trim);
        match raw.map(str::parse::<u32>) {
            Some(Ok(count)) => count == max,
            Some(Err(e)) => {
                warn!(
                    message_id = %message.message_id,
                    receive_count = raw.unwrap_or_default(),
                    error = %e,
                    "Unparsable receive count, alerting"
                );
                true
            }
            None => {
                warn!(
                    message_id = %message.message_id,
                    "Missing receive count, alerting"
                );
                true
            }
        }
    }

    /// Escalate a failed message if this delivery qualifies.
    pub async fn notify_failure(
        &self,
        handler: &str,
        message: &Envelope,
        delivery: &DeliveryContext,
        error: &(dyn std::error::Error + Send + Sync),
    ) {
        if !self.is_active() || !self.should_alert(message, delivery) {
            return;
        }

        let body = serde_json::to_string_pretty(message)
            .unwrap_or_else(|_| message.message_id.to_string());

        let mut lines = vec![
            format!("Failed to process message. Error: {error}"),
            format!("```{body}```"),
        ];
        let mut source = error.source();
        while let Some(cause) = source {
            lines.push(format!("Caused by: {cause}"));
            source = cause.source();
        }

        self.send(handler, lines).await;
    }

    /// Send an alert regardless of receive count.
    pub async fn notify(&self, handler: &str, lines: Vec<String>) {
        if !self.is_active() {
            return;
        }
        self.send(handler, lines).await;
    }

    async fn send(&self, handler: &str, lines: Vec<String>) {
        let Some(channel) = &self.channel else {
            return;
        };

        let alert = Alert {
            channel: self.channel_name.clone(),
            username: format!("MessageHandler:{handler}"),
            lines,
        };

        match tokio::time::timeout(self.timeout, channel.send(&alert)).await {
            Ok(Ok(())) => debug!(channel = %alert.channel, "Alert sent"),
            Ok(Err(e)) => warn!(channel = %alert.channel, error = %e, "Failed to send alert"),
            Err(_) => warn!(
                channel = %alert.channel,
                timeout_ms = self.timeout.as_millis() as u64,
                "Alert delivery timed out"
            ),
        }
    }
}
