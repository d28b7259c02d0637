//! Keyed lease coordination.
//!
//! Work items sharing a correlation key must never run concurrently across
//! workers. Before running such work the [`LeaseCoordinator`] takes a
//! time-bounded lease from an external [`LockService`], renews it at half
//! its expiry while the work runs, and releases it on every exit path.
//! Release on cancellation is handled by [`LeaseGuard`]'s `Drop`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{BoxError, WorkerError, WorkerResult};

/// Default lease expiry.
pub const DEFAULT_LEASE_EXPIRY: Duration = Duration::from_secs(5);

/// Smallest pause between acquisition attempts in patient mode.
const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Smallest pause between lease renewals.
const MIN_RENEW_INTERVAL: Duration = Duration::from_millis(10);

/// A held lease on a normalized key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// Normalized lock key.
    pub key: String,
    /// Ownership token; only the holder of this token may release.
    pub token: Uuid,
    /// When the lease was granted.
    pub acquired_at: DateTime<Utc>,
    /// How long the lock service keeps the lease without a release.
    pub expiry: Duration,
}

impl Lease {
    /// Create a lease granted now.
    #[must_use]
    pub fn new(key: impl Into<String>, expiry: Duration) -> Self {
        Self {
            key: key.into(),
            token: Uuid::new_v4(),
            acquired_at: Utc::now(),
            expiry,
        }
    }
}

/// External lock service.
///
/// `try_acquire` makes a single attempt and returns `None` when the key is
/// held by someone else. Waiting is the coordinator's job.
#[async_trait]
pub trait LockService: Send + Sync {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<Lease>, BoxError>;

    /// Push the expiry of a held lease to `ttl` from now. Returns `false`
    /// when the lease is no longer held by this token.
    async fn extend(&self, lease: &Lease, ttl: Duration) -> Result<bool, BoxError>;

    async fn release(&self, lease: &Lease) -> Result<(), BoxError>;
}

/// Bounded wait for a busy lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Total time to keep trying.
    pub wait: Duration,
    /// Pause between attempts.
    pub retry: Duration,
}

/// Normalize a lock key into the shared lock namespace.
#[must_use]
pub fn lock_key(topic: &str, key: &str) -> String {
    format!("topic:{topic}-{key}").to_lowercase()
}

/// Runs units of work under a keyed lease.
#[derive(Clone)]
pub struct LeaseCoordinator {
    service: Arc<dyn LockService>,
    expiry: Duration,
    wait: Option<WaitPolicy>,
}

impl LeaseCoordinator {
    /// Create a coordinator in immediate mode with the default expiry.
    pub fn new(service: Arc<dyn LockService>) -> Self {
        Self {
            service,
            expiry: DEFAULT_LEASE_EXPIRY,
            wait: None,
        }
    }

    /// Set the lease expiry.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    /// Enable patient mode.
    #[must_use]
    pub fn with_wait_policy(mut self, policy: Option<WaitPolicy>) -> Self {
        self.wait = policy;
        self
    }

    /// Run `work` while holding the lease for `key`.
    ///
    /// A blank or absent key runs `work` directly. Otherwise the lease is
    /// acquired first (failing with [`WorkerError::LockUnavailable`] when it
    /// stays busy), renewed while `work` runs, and released afterwards
    /// whether `work` succeeds, fails or is cancelled.
    pub async fn run_exclusive<F, Fut, T>(
        &self,
        topic: &str,
        key: Option<&str>,
        work: F,
    ) -> WorkerResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = WorkerResult<T>>,
    {
        let Some(key) = key.map(str::trim).filter(|key| !key.is_empty()) else {
            return work().await;
        };

        let key = lock_key(topic, key);
        let lease = self.acquire(&key).await?;
        debug!(lock_key = %key, token = %lease.token, "Lease acquired");

        let mut guard = LeaseGuard::new(Arc::clone(&self.service), lease.clone());
        let result = self.hold(&lease, work()).await;
        guard.release().await;

        result
    }

    /// Drive `work` to completion, extending `lease` every half expiry.
    async fn hold<Fut, T>(&self, lease: &Lease, work: Fut) -> WorkerResult<T>
    where
        Fut: Future<Output = WorkerResult<T>>,
    {
        let period = (self.expiry / 2).max(MIN_RENEW_INTERVAL);
        let mut renewals = interval_at(Instant::now() + period, period);
        renewals.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(work);
        loop {
            tokio::select! {
                result = &mut work => return result,
                _ = renewals.tick() => self.renew(lease).await,
            }
        }
    }

    async fn renew(&self, lease: &Lease) {
        match self.service.extend(lease, self.expiry).await {
            Ok(true) => debug!(lock_key = %lease.key, "Lease renewed"),
            Ok(false) => warn!(
                lock_key = %lease.key,
                "Lease lost while work is running"
            ),
            Err(e) => warn!(
                lock_key = %lease.key,
                error = %e,
                "Failed to renew lease"
            ),
        }
    }

    async fn acquire(&self, key: &str) -> WorkerResult<Lease> {
        let attempted_at = Utc::now();
        let started = Instant::now();

        if let Some(lease) = self.try_acquire(key).await? {
            return Ok(lease);
        }

        if let Some(policy) = self.wait {
            let deadline = started + policy.wait;
            let retry = policy.retry.max(MIN_RETRY_INTERVAL);

            loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }

                sleep(retry.min(deadline - now)).await;

                if let Some(lease) = self.try_acquire(key).await? {
                    debug!(
                        lock_key = %key,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Lease acquired after waiting"
                    );
                    return Ok(lease);
                }
            }
        }

        Err(WorkerError::LockUnavailable {
            key: key.to_string(),
            attempted_at,
        })
    }

    async fn try_acquire(&self, key: &str) -> WorkerResult<Option<Lease>> {
        self.service
            .try_acquire(key, self.expiry)
            .await
            .map_err(|e| WorkerError::LockService {
                key: key.to_string(),
                cause: e.to_string(),
            })
    }
}

/// Scoped ownership of an acquired lease.
///
/// Call [`LeaseGuard::release`] on the normal path. If the guard is dropped
/// while still holding the lease (the owning task was cancelled), the
/// release is spawned onto the current runtime.
pub struct LeaseGuard {
    service: Arc<dyn LockService>,
    lease: Option<Lease>,
}

impl LeaseGuard {
    fn new(service: Arc<dyn LockService>, lease: Lease) -> Self {
        Self {
            service,
            lease: Some(lease),
        }
    }

    /// Release the lease. Failures are logged; the lease then lapses at
    /// expiry. The lease stays in the guard until the release returns, so
    /// a task aborted mid-release still releases from `Drop`.
    pub async fn release(&mut self) {
        if let Some(lease) = self.lease.as_ref() {
            release_lease(self.service.as_ref(), lease).await;
            self.lease = None;
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let service = Arc::clone(&self.service);
                handle.spawn(async move {
                    release_lease(service.as_ref(), &lease).await;
                });
            }
            Err(_) => {
                warn!(
                    lock_key = %lease.key,
                    "No runtime to release lease, it will lapse at expiry"
                );
            }
        }
    }
}

async fn release_lease(service: &dyn LockService, lease: &Lease) {
    match service.release(lease).await {
        Ok(()) => debug!(lock_key = %lease.key, "Lease released"),
        Err(e) => warn!(
            lock_key = %lease.key,
            error = %e,
            "Failed to release lease, it will lapse at expiry"
        ),
    }
}

/// Lock service backed by process memory.
///
/// Gives mutual exclusion between tasks of one process. Used for local runs
/// and tests; deployments plug in a shared lock server.
#[derive(Debug, Default)]
pub struct InProcessLockService {
    held: Mutex<HashMap<String, (Uuid, Instant)>>,
}

impl InProcessLockService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `key` is currently held and not expired.
    pub async fn is_held(&self, key: &str) -> bool {
        let held = self.held.lock().await;
        held.get(key)
            .is_some_and(|(_, expires_at)| *expires_at > Instant::now())
    }
}

#[async_trait]
impl LockService for InProcessLockService {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<Lease>, BoxError> {
        let mut held = self.held.lock().await;
        let now = Instant::now();

        if let Some((_, expires_at)) = held.get(key) {
            if *expires_at > now {
                return Ok(None);
            }
        }

        let lease = Lease::new(key, ttl);
        held.insert(key.to_string(), (lease.token, now + ttl));
        Ok(Some(lease))
    }

    async fn extend(&self, lease: &Lease, ttl: Duration) -> Result<bool, BoxError> {
        let mut held = self.held.lock().await;
        let now = Instant::now();

        match held.get_mut(&lease.key) {
            Some((token, expires_at)) if *token == lease.token && *expires_at > now => {
                *expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, lease: &Lease) -> Result<(), BoxError> {
        let mut held = self.held.lock().await;
        if held.get(&lease.key).is_some_and(|(token, _)| *token == lease.token) {
            held.remove(&lease.key);
        }
        Ok(())
    }
}
