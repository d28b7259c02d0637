//! Business handlers and the topic registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::error::{BoxError, WorkerError, WorkerResult};

/// Why a handler chose not to process a message.
///
/// Ignored messages are expected business conditions (integration not set
/// up, credential cannot be refreshed). They count as handled and are not
/// redelivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreReason {
    pub title: String,
    pub detail: Option<String>,
}

impl IgnoreReason {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.title, detail),
            None => f.write_str(&self.title),
        }
    }
}

/// Result of a successful handler invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// Processed; the follow-ups are published to the outbound bus.
    Completed(Vec<Envelope>),
    /// Skipped for an expected reason.
    Ignored(IgnoreReason),
}

impl HandlerOutcome {
    /// Completed with no follow-ups.
    #[must_use]
    pub fn done() -> Self {
        Self::Completed(Vec::new())
    }

    pub fn ignored(title: impl Into<String>) -> Self {
        Self::Ignored(IgnoreReason::new(title))
    }
}

/// Correlation data attached to a single handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    pub trace_id: String,
    pub message_id: Uuid,
    pub handler: String,
    pub lock_key: Option<String>,
}

/// Business logic for one topic.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handler name used in logs and alerts.
    fn name(&self) -> &str;

    /// Process one message.
    async fn handle(
        &self,
        message: &Envelope,
        ctx: &CorrelationContext,
    ) -> Result<HandlerOutcome, BoxError>;
}

/// Topic to handler lookup.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`, replacing any previous registration.
    pub fn register(&mut self, topic: impl Into<String>, handler: Arc<dyn MessageHandler>) {
        self.handlers.insert(topic.into(), handler);
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with(mut self, topic: impl Into<String>, handler: Arc<dyn MessageHandler>) -> Self {
        self.register(topic, handler);
        self
    }

    /// Look up the handler for `topic`.
    pub fn resolve(&self, topic: &str) -> WorkerResult<Arc<dyn MessageHandler>> {
        self.handlers
            .get(topic)
            .cloned()
            .ok_or_else(|| WorkerError::UnknownTopic {
                topic: topic.to_string(),
            })
    }

    /// Registered topics, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("topics", &self.topics())
            .finish()
    }
}
