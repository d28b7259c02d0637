//! Error types for the crmsync-worker crate.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Boxed error used at collaborator boundaries (handlers, bus, alert channel).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias using `WorkerError`.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur while receiving, coordinating or processing messages.
#[derive(Debug, Error)]
pub enum WorkerError {
    // Configuration errors (permanent, no retry)
    /// Configuration value is invalid.
    #[error("Configuration invalid for {var}: {reason}")]
    ConfigInvalid { var: String, reason: String },

    // Inbound errors
    /// The inbound batch could not be parsed into messages.
    #[error("Invalid inbound batch: {reason}")]
    InvalidBatch { reason: String },

    /// A message envelope failed validation.
    #[error("Invalid message envelope: {reason}")]
    InvalidEnvelope { reason: String },

    /// Failed to serialize or deserialize a message payload.
    #[error("Failed to (de)serialize payload for topic {topic}: {cause}")]
    Payload { topic: String, cause: String },

    /// No handler is registered for the topic.
    #[error("No handler registered for topic {topic}")]
    UnknownTopic { topic: String },

    // Coordination errors (transient, redelivery retries later)
    /// The lease for a lock key could not be acquired within policy.
    #[error("Cannot obtain lock {key} (first attempt at {attempted_at})")]
    LockUnavailable {
        key: String,
        attempted_at: DateTime<Utc>,
    },

    /// The lock service itself failed.
    #[error("Lock service error for {key}: {cause}")]
    LockService { key: String, cause: String },

    // Processing errors
    /// The business handler failed.
    #[error("Handler {handler} failed for message {message_id}: {source}")]
    Handler {
        message_id: Uuid,
        handler: String,
        #[source]
        source: BoxError,
    },

    /// The business handler panicked.
    #[error("Handler {handler} panicked for message {message_id}")]
    HandlerPanicked { message_id: Uuid, handler: String },

    /// The task processing a message was cancelled before it finished.
    #[error("Handler {handler} was cancelled for message {message_id}")]
    TaskCancelled { message_id: Uuid, handler: String },

    /// Publishing follow-up messages failed.
    #[error("Failed to publish {count} follow-up message(s): {cause}")]
    PublishFailed { count: usize, cause: String },

    // Batch errors
    /// One or more messages of a batch failed.
    #[error("{} of {total} message(s) failed: {}", .failures.len(), MessageIds(.failures))]
    BatchFailed {
        total: usize,
        failures: Vec<MessageFailure>,
    },

    /// The batch did not finish before its deadline.
    #[error("Batch did not complete within {deadline:?}")]
    BatchDeadlineExceeded { deadline: Duration },
}

/// Coarse classification of a worker error, used for logging and by callers
/// deciding how a failure should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration; fixing it requires a deploy.
    Config,
    /// The lease was busy; redelivery will retry later.
    LockUnavailable,
    /// Anything else; redelivered and possibly alerted.
    Defect,
}

impl WorkerError {
    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigInvalid { .. } => ErrorKind::Config,
            Self::LockUnavailable { .. } => ErrorKind::LockUnavailable,
            _ => ErrorKind::Defect,
        }
    }

    /// Returns true if this is a busy lease rather than a processing defect.
    #[must_use]
    pub fn is_lock_unavailable(&self) -> bool {
        self.kind() == ErrorKind::LockUnavailable
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        self.kind() == ErrorKind::Config
    }

    /// Returns the failed message ids when this is an aggregate batch failure.
    #[must_use]
    pub fn failed_message_ids(&self) -> Vec<Uuid> {
        match self {
            Self::BatchFailed { failures, .. } => {
                failures.iter().map(|failure| failure.message_id).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// A single message's failure inside a batch.
#[derive(Debug)]
pub struct MessageFailure {
    pub message_id: Uuid,
    pub error: WorkerError,
}

struct MessageIds<'a>(&'a [MessageFailure]);

impl fmt::Display for MessageIds<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} ({})", failure.message_id, failure.error)?;
        }
        Ok(())
    }
}
