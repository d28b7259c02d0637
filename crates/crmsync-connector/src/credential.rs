//! Access credentials and their refresh collaborator.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

/// Default number of refresh attempts the token service may make.
pub const DEFAULT_REFRESH_MAX_RETRIES: u32 = 5;

/// Default wait between refresh attempts.
pub const DEFAULT_REFRESH_RETRY_WAIT: Duration = Duration::from_secs(5);

/// Access token plus the API endpoint it was issued for.
///
/// Owned by one traversal; refresh replaces the token in place.
pub struct Credential {
    api_endpoint: String,
    access_token: SecretString,
}

impl Credential {
    pub fn new(api_endpoint: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            api_endpoint: api_endpoint.into().trim_end_matches('/').to_string(),
            access_token: SecretString::from(access_token.into()),
        }
    }

    /// Base URL of the remote instance, without trailing slash.
    #[must_use]
    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Swap in a freshly issued token.
    pub fn replace_access_token(&mut self, token: SecretString) {
        self.access_token = token;
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_endpoint", &self.api_endpoint)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// What to refresh and how patiently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    /// Whose credential to refresh (e.g. the party id).
    pub subject: String,
    pub max_retries: u32,
    pub retry_wait: Duration,
}

/// Token refresh backend.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Returns a new access token, or `None` if the refresh failed.
    async fn refresh(&self, request: &RefreshRequest) -> Option<SecretString>;
}
