//! Worker configuration management.

use std::env;
use std::time::Duration;

use crate::alert::{DEFAULT_ALERT_CHANNEL, DEFAULT_ALERT_TIMEOUT};
use crate::error::{WorkerError, WorkerResult};
use crate::lease::{WaitPolicy, DEFAULT_LEASE_EXPIRY};

/// Runtime configuration of the message worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Lease expiry.
    pub lock_expiry: Duration,
    /// Patient-mode wait policy; `None` means fail fast on a busy lease.
    pub lock_wait: Option<WaitPolicy>,
    /// Maximum receive count configured on the queue.
    pub max_receive_count: Option<u32>,
    /// Whether failures are escalated to chat.
    pub alert_enabled: bool,
    /// Chat channel for alerts.
    pub alert_channel: String,
    /// Bound on alert delivery.
    pub alert_timeout: Duration,
    /// Bound on a whole batch.
    pub batch_deadline: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            lock_expiry: DEFAULT_LEASE_EXPIRY,
            lock_wait: None,
            max_receive_count: None,
            alert_enabled: false,
            alert_channel: DEFAULT_ALERT_CHANNEL.to_string(),
            alert_timeout: DEFAULT_ALERT_TIMEOUT,
            batch_deadline: None,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `LOCK_EXPIRY_SECONDS`: lease expiry (default: 5)
    /// - `LOCK_WAIT_SECONDS` and `LOCK_RETRY_SECONDS`: enable patient mode
    ///   when both are set
    /// - `MESSAGE_MAX_RETRY_COUNT`: queue max receive count
    /// - `ALERT_ENABLED`: true/false (default: false)
    /// - `ALERT_CHANNEL`: chat channel (default: "#alert-integration")
    /// - `ALERT_TIMEOUT_SECONDS`: alert delivery bound (default: 10)
    /// - `BATCH_DEADLINE_SECONDS`: bound on a whole batch
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut builder = Self::builder();

        if let Some(value) = get("LOCK_EXPIRY_SECONDS") {
            builder = builder.lock_expiry(parse_seconds("LOCK_EXPIRY_SECONDS", &value)?);
        }

        let wait = get("LOCK_WAIT_SECONDS")
            .map(|v| parse_seconds("LOCK_WAIT_SECONDS", &v))
            .transpose()?;
        let retry = get("LOCK_RETRY_SECONDS")
            .map(|v| parse_seconds("LOCK_RETRY_SECONDS", &v))
            .transpose()?;
        if let (Some(wait), Some(retry)) = (wait, retry) {
            builder = builder.lock_wait(wait, retry);
        }

        if let Some(value) = get("MESSAGE_MAX_RETRY_COUNT") {
            let max = value
                .parse::<u32>()
                .map_err(|e| WorkerError::ConfigInvalid {
                    var: "MESSAGE_MAX_RETRY_COUNT".to_string(),
                    reason: e.to_string(),
                })?;
            builder = builder.max_receive_count(max);
        }

        if let Some(value) = get("ALERT_ENABLED") {
            builder = builder.alert_enabled(parse_bool("ALERT_ENABLED", &value)?);
        }

        if let Some(value) = get("ALERT_CHANNEL") {
            builder = builder.alert_channel(value);
        }

        if let Some(value) = get("ALERT_TIMEOUT_SECONDS") {
            builder = builder.alert_timeout(parse_seconds("ALERT_TIMEOUT_SECONDS", &value)?);
        }

        if let Some(value) = get("BATCH_DEADLINE_SECONDS") {
            builder = builder.batch_deadline(parse_seconds("BATCH_DEADLINE_SECONDS", &value)?);
        }

        builder.build()
    }

    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::new()
    }
}

/// Builder for `WorkerConfig`.
#[derive(Debug, Default)]
pub struct WorkerConfigBuilder {
    lock_expiry: Option<Duration>,
    lock_wait: Option<WaitPolicy>,
    max_receive_count: Option<u32>,
    alert_enabled: Option<bool>,
    alert_channel: Option<String>,
    alert_timeout: Option<Duration>,
    batch_deadline: Option<Duration>,
}

impl WorkerConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lock_expiry(mut self, expiry: Duration) -> Self {
        self.lock_expiry = Some(expiry);
        self
    }

    /// Enable patient mode.
    #[must_use]
    pub fn lock_wait(mut self, wait: Duration, retry: Duration) -> Self {
        self.lock_wait = Some(WaitPolicy { wait, retry });
        self
    }

    #[must_use]
    pub fn max_receive_count(mut self, max: u32) -> Self {
        self.max_receive_count = Some(max);
        self
    }

    #[must_use]
    pub fn alert_enabled(mut self, enabled: bool) -> Self {
        self.alert_enabled = Some(enabled);
        self
    }

    pub fn alert_channel(mut self, channel: impl Into<String>) -> Self {
        self.alert_channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn alert_timeout(mut self, timeout: Duration) -> Self {
        self.alert_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn batch_deadline(mut self, deadline: Duration) -> Self {
        self.batch_deadline = Some(deadline);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> WorkerResult<WorkerConfig> {
        let defaults = WorkerConfig::default();

        let lock_expiry = self.lock_expiry.unwrap_or(defaults.lock_expiry);
        if lock_expiry.is_zero() {
            return Err(WorkerError::ConfigInvalid {
                var: "lock_expiry".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if let Some(policy) = &self.lock_wait {
            if policy.retry.is_zero() {
                return Err(WorkerError::ConfigInvalid {
                    var: "lock_retry".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.max_receive_count == Some(0) {
            return Err(WorkerError::ConfigInvalid {
                var: "max_receive_count".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(WorkerConfig {
            lock_expiry,
            lock_wait: self.lock_wait,
            max_receive_count: self.max_receive_count,
            alert_enabled: self.alert_enabled.unwrap_or(defaults.alert_enabled),
            alert_channel: self.alert_channel.unwrap_or(defaults.alert_channel),
            alert_timeout: self.alert_timeout.unwrap_or(defaults.alert_timeout),
            batch_deadline: self.batch_deadline,
        })
    }
}

fn parse_seconds(var: &str, value: &str) -> WorkerResult<Duration> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| WorkerError::ConfigInvalid {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool(var: &str, value: &str) -> WorkerResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(WorkerError::ConfigInvalid {
            var: var.to_string(),
            reason: format!("expected a boolean, got {value}"),
        }),
    }
}
