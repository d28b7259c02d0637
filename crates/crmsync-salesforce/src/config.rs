//! Salesforce sync configuration.

use std::env;
use std::time::Duration;

use crmsync_connector::{RefreshPolicy, DEFAULT_API_VERSION};

use crate::error::{SyncError, SyncResult};

/// Default look-back applied to the previous sync start for delta syncs.
pub const DEFAULT_DELTA_OVERLAP_HOURS: i64 = 24;

/// Runtime configuration of the sync handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesforceSyncConfig {
    /// Always read every contact, ignoring the previous sync start.
    pub force_full_sync: bool,
    /// Subtracted from the previous sync start for delta reads.
    pub delta_overlap: chrono::Duration,
    /// How patiently the token service refreshes an expired token.
    pub refresh_policy: RefreshPolicy,
    /// Salesforce REST API version.
    pub api_version: String,
}

impl Default for SalesforceSyncConfig {
    fn default() -> Self {
        Self {
            force_full_sync: false,
            delta_overlap: chrono::Duration::hours(DEFAULT_DELTA_OVERLAP_HOURS),
            refresh_policy: RefreshPolicy::default(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

impl SalesforceSyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `SALESFORCE_FORCE_FULL_SYNC`: true/false (default: false)
    /// - `SYNC_DELTA_OVERLAP_HOURS`: delta look-back (default: 24)
    /// - `TOKEN_REFRESH_MAX_RETRIES`: (default: 5)
    /// - `TOKEN_REFRESH_RETRY_SECONDS`: (default: 5)
    /// - `SALESFORCE_API_VERSION`: (default: "v58.0")
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(value) = get("SALESFORCE_FORCE_FULL_SYNC") {
            config.force_full_sync = match value.to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => return Err(invalid("SALESFORCE_FORCE_FULL_SYNC", "expected a boolean")),
            };
        }

        if let Some(value) = get("SYNC_DELTA_OVERLAP_HOURS") {
            let hours: i64 = parse("SYNC_DELTA_OVERLAP_HOURS", &value)?;
            if hours < 0 {
                return Err(invalid("SYNC_DELTA_OVERLAP_HOURS", "must not be negative"));
            }
            config.delta_overlap = chrono::Duration::hours(hours);
        }

        if let Some(value) = get("TOKEN_REFRESH_MAX_RETRIES") {
            config.refresh_policy.max_retries = parse("TOKEN_REFRESH_MAX_RETRIES", &value)?;
        }

        if let Some(value) = get("TOKEN_REFRESH_RETRY_SECONDS") {
            config.refresh_policy.retry_wait =
                Duration::from_secs(parse("TOKEN_REFRESH_RETRY_SECONDS", &value)?);
        }

        if let Some(value) = get("SALESFORCE_API_VERSION") {
            if !value.starts_with('v') {
                return Err(invalid("SALESFORCE_API_VERSION", "expected a version like v58.0"));
            }
            config.api_version = value;
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(var: &str, value: &str) -> SyncResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| invalid(var, &e.to_string()))
}

fn invalid(var: &str, reason: &str) -> SyncError {
    SyncError::ConfigInvalid {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}
