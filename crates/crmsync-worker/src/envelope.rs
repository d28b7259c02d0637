//! Message envelope carried on the inbound queue and the outbound bus.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{WorkerError, WorkerResult};

/// A typed message body bound to a topic.
///
/// Implementors decide which business correlation serializes their work by
/// returning a lock key; `None` means the message can run without a lease.
pub trait Message: Serialize + DeserializeOwned + Send + Sync {
    /// Topic the message is published to and consumed from.
    const TOPIC: &'static str;

    /// Correlation key used to serialize conflicting work.
    fn lock_key(&self) -> Option<String> {
        None
    }
}

/// Envelope wrapping every unit of work.
///
/// Immutable once received. The same shape is used for follow-up messages
/// published by handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Unique identifier for this message instance.
    pub message_id: Uuid,

    /// Topic name, used to pick the handler and to namespace lock keys.
    pub topic: String,

    /// Correlation key; absent or blank means no locking is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_key: Option<String>,

    /// When the message was created.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// The message body.
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Create an envelope for a raw payload.
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            topic: topic.into(),
            lock_key: None,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Set the lock key.
    #[must_use]
    pub fn with_lock_key(mut self, key: impl Into<String>) -> Self {
        self.lock_key = Some(key.into());
        self
    }

    /// Wrap a typed message, deriving topic and lock key from it.
    pub fn wrap<M: Message>(message: &M) -> WorkerResult<Self> {
        let payload = serde_json::to_value(message).map_err(|e| WorkerError::Payload {
            topic: M::TOPIC.to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self {
            lock_key: message.lock_key(),
            ..Self::new(M::TOPIC, payload)
        })
    }

    /// Deserialize the payload into a typed message.
    pub fn decode<M: Message>(&self) -> WorkerResult<M> {
        serde_json::from_value(self.payload.clone()).map_err(|e| WorkerError::Payload {
            topic: self.topic.clone(),
            cause: e.to_string(),
        })
    }

    /// The effective lock key: trimmed, `None` when absent or blank.
    #[must_use]
    pub fn lock_key(&self) -> Option<&str> {
        self.lock_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Parse an envelope from JSON bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> WorkerResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| WorkerError::InvalidEnvelope {
            reason: e.to_string(),
        })
    }

    /// Validate that required fields are present.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.topic.trim().is_empty() {
            return Err(WorkerError::InvalidEnvelope {
                reason: format!("message {} has an empty topic", self.message_id),
            });
        }
        Ok(())
    }
}
