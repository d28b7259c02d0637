//! Outbound message bus.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::envelope::Envelope;
use crate::error::BoxError;

/// Destination for follow-up messages. Delivery is at-least-once.
#[async_trait]
pub trait OutboundBus: Send + Sync {
    async fn publish(&self, messages: &[Envelope]) -> Result<(), BoxError>;
}

/// Bus that keeps published messages in memory.
#[derive(Debug, Default)]
pub struct InMemoryBus {
    published: Mutex<Vec<Envelope>>,
}

impl InMemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in publish order.
    pub async fn published(&self) -> Vec<Envelope> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl OutboundBus for InMemoryBus {
    async fn publish(&self, messages: &[Envelope]) -> Result<(), BoxError> {
        self.published.lock().await.extend_from_slice(messages);
        Ok(())
    }
}
