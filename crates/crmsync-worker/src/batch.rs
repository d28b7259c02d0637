//! Inbound batch parsing.
//!
//! A batch arrives as `{"Records": [{messageId, body, attributes}]}`. Each
//! body is a JSON [`Envelope`]; the attributes carry delivery metadata such
//! as `ApproximateReceiveCount`.

use std::collections::HashMap;

use serde::Deserialize;

use crate::envelope::Envelope;
use crate::error::{WorkerError, WorkerResult};

/// Attribute holding how many times the queue has delivered a record.
pub const APPROXIMATE_RECEIVE_COUNT: &str = "ApproximateReceiveCount";

/// Raw inbound batch as delivered by the queue trigger.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<InboundRecord>,
}

/// A single queue record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRecord {
    #[serde(default)]
    pub message_id: String,
    pub body: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// Delivery metadata for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryContext {
    /// Trace id of the invocation that received the batch.
    pub trace_id: String,
    /// Queue-level record id.
    pub record_id: String,
    /// Raw `ApproximateReceiveCount` attribute, if present.
    pub approximate_receive_count: Option<String>,
}

/// A parsed message together with its delivery metadata.
#[derive(Debug, Clone)]
pub struct DeliveredMessage {
    pub envelope: Envelope,
    pub delivery: DeliveryContext,
}

impl DeliveredMessage {
    /// Build a delivered message with no queue metadata.
    #[must_use]
    pub fn new(envelope: Envelope) -> Self {
        Self {
            envelope,
            delivery: DeliveryContext::default(),
        }
    }
}

impl InboundBatch {
    /// Parse a batch from raw JSON.
    pub fn from_slice(bytes: &[u8]) -> WorkerResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| WorkerError::InvalidBatch {
            reason: e.to_string(),
        })
    }

    /// Number of records in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Convert the records into delivered messages.
    ///
    /// Fails if the batch is empty or any body is not a valid envelope.
    pub fn into_messages(self, trace_id: &str) -> WorkerResult<Vec<DeliveredMessage>> {
        if self.records.is_empty() {
            return Err(WorkerError::InvalidBatch {
                reason: "batch contains no records".to_string(),
            });
        }

        self.records
            .into_iter()
            .map(|record| {
                let envelope = serde_json::from_str::<Envelope>(&record.body).map_err(|e| {
                    WorkerError::InvalidBatch {
                        reason: format!("record {}: {e}", record.message_id),
                    }
                })?;
                envelope.validate()?;

                let mut attributes = record.attributes;
                Ok(DeliveredMessage {
                    envelope,
                    delivery: DeliveryContext {
                        trace_id: trace_id.to_string(),
                        record_id: record.message_id,
                        approximate_receive_count: attributes.remove(APPROXIMATE_RECEIVE_COUNT),
                    },
                })
            })
            .collect()
    }
}
