//! Error types for remote CRM access.

use thiserror::Error;

/// Result type alias using `ConnectorError`.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Error code the remote API returns when the access token has expired.
pub const SESSION_EXPIRED_CODE: &str = "INVALID_SESSION_ID";

/// Errors that can occur when talking to the remote CRM API.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The remote API answered with an error.
    #[error("Remote API error ({status}): {}{message}", code_prefix(.code))]
    Remote {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The access token expired and could not be refreshed.
    #[error("Credential refresh failed for {subject}")]
    CredentialRefreshFailed { subject: String },

    /// Retries and fallbacks are exhausted.
    #[error("Remote API unavailable ({}): {message}", status_text(.status))]
    RemoteUnavailable {
        status: Option<u16>,
        message: String,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response was well-formed JSON but not what we expected.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConnectorError {
    /// Create a remote error from a status and optional error code.
    pub fn remote(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Returns true if the remote rejected the access token as expired.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::Remote { code: Some(code), .. } if code == SESSION_EXPIRED_CODE)
    }

    /// Returns true if the caller should skip the work instead of failing.
    #[must_use]
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::CredentialRefreshFailed { .. })
    }

    /// Returns true if a later redelivery might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Remote { status, .. } => *status == 429 || *status >= 500,
            Self::RemoteUnavailable { .. } | Self::Http(_) => true,
            _ => false,
        }
    }

    /// HTTP status, when one is known.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            Self::RemoteUnavailable { status, .. } => *status,
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Convert a failed attempt into the exhausted form, keeping status and message.
    #[must_use]
    pub fn into_unavailable(self) -> Self {
        match self {
            Self::Remote {
                status,
                code,
                message,
            } => Self::RemoteUnavailable {
                status: Some(status),
                message: format!("{}{message}", code_prefix(&code)),
            },
            Self::RemoteUnavailable { .. } | Self::CredentialRefreshFailed { .. } => self,
            other => Self::RemoteUnavailable {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

fn code_prefix(code: &Option<String>) -> String {
    code.as_ref().map(|c| format!("{c}: ")).unwrap_or_default()
}

fn status_text(status: &Option<u16>) -> String {
    status.map_or_else(|| "no status".to_string(), |s| s.to_string())
}
