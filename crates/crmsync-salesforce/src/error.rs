//! Error types for the Salesforce sync handlers.

use crmsync_connector::ConnectorError;
use crmsync_worker::{HandlerOutcome, IgnoreReason, WorkerError};
use thiserror::Error;

/// Result type alias using `SyncError`.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors returned by internal storage services.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("not found")]
    NotFound,

    /// The service answered with an unexpected status.
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// The service could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur during a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Expected condition; the message is skipped.
    #[error("Ignored: {0}")]
    Ignored(IgnoreReason),

    /// An internal service call failed.
    #[error("{operation} failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// Remote CRM error.
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// Envelope or publish error.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// Publishing messages to the bus failed.
    #[error("Failed to publish {count} message(s): {cause}")]
    Publish { count: usize, cause: String },

    /// Configuration value is invalid.
    #[error("Configuration invalid for {var}: {reason}")]
    ConfigInvalid { var: String, reason: String },
}

impl SyncError {
    /// Wrap a storage failure with the operation that produced it.
    pub fn store(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { operation, source }
    }

    /// Create an ignored outcome.
    pub fn ignored(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Ignored(IgnoreReason::new(title).with_detail(detail))
    }

    /// Returns true if the message should be skipped rather than retried.
    #[must_use]
    pub fn is_ignorable(&self) -> bool {
        match self {
            Self::Ignored(_) => true,
            Self::Connector(e) => e.is_ignorable(),
            _ => false,
        }
    }

    /// Translate into a handler outcome: ignorable errors become
    /// [`HandlerOutcome::Ignored`], everything else stays an error.
    pub fn into_outcome(self) -> Result<HandlerOutcome, SyncError> {
        match self {
            Self::Ignored(reason) => Ok(HandlerOutcome::Ignored(reason)),
            Self::Connector(ConnectorError::CredentialRefreshFailed { subject }) => {
                Ok(HandlerOutcome::Ignored(
                    IgnoreReason::new("Refresh Token Failed.")
                        .with_detail(format!("Failed to refresh access token for party {subject}")),
                ))
            }
            other => Err(other),
        }
    }
}
