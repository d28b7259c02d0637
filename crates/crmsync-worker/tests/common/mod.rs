//! Common test utilities for crmsync-worker integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use crmsync_worker::{
    Alert, AlertChannel, BoxError, CorrelationContext, DeliveredMessage, Envelope,
    HandlerOutcome, InProcessLockService, Lease, LockService, MessageHandler, OutboundBus,
};
use serde_json::json;

pub const TOPIC: &str = "test-syncer";

/// Build a message whose payload tells [`ScriptedHandler`] what to do.
pub fn scripted(action: &str, lock_key: &str) -> DeliveredMessage {
    let envelope = Envelope::new(TOPIC, json!({ "action": action })).with_lock_key(lock_key);
    DeliveredMessage::new(envelope)
}

/// Raw inbound batch JSON for the given envelopes.
pub fn batch_json(envelopes: &[(Envelope, Option<&str>)]) -> Vec<u8> {
    let records: Vec<_> = envelopes
        .iter()
        .enumerate()
        .map(|(i, (envelope, count))| {
            let mut attributes = serde_json::Map::new();
            if let Some(count) = count {
                attributes.insert("ApproximateReceiveCount".to_string(), json!(count));
            }
            json!({
                "messageId": format!("rec-{i}"),
                "body": serde_json::to_string(envelope).unwrap(),
                "attributes": attributes,
            })
        })
        .collect();
    serde_json::to_vec(&json!({ "Records": records })).unwrap()
}

/// Handler driven by the message payload.
///
/// Actions: `ok`, `follow-up`, `ignore`, `fail`, `panic`, `sleep` (ten
/// seconds), `slow` (fifty milliseconds). Tracks how many invocations are
/// running at once.
#[derive(Default)]
pub struct ScriptedHandler {
    pub completed: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageHandler for ScriptedHandler {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn handle(
        &self,
        message: &Envelope,
        ctx: &CorrelationContext,
    ) -> Result<HandlerOutcome, BoxError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let _active = ActiveGuard(&self.active);

        let action = message.payload["action"].as_str().unwrap_or("ok").to_string();
        let outcome = match action.as_str() {
            "ok" => HandlerOutcome::done(),
            "follow-up" => HandlerOutcome::Completed(vec![Envelope::new(
                "follow-up-topic",
                json!({ "parent": ctx.message_id }),
            )]),
            "ignore" => HandlerOutcome::ignored("Not set up yet"),
            "fail" => return Err("remote exploded".into()),
            "panic" => panic!("handler bug"),
            "sleep" => {
                tokio::time::sleep(Duration::from_secs(10)).await;
                HandlerOutcome::done()
            }
            "slow" => {
                tokio::time::sleep(Duration::from_millis(50)).await;
                HandlerOutcome::done()
            }
            other => return Err(format!("unknown action {other}").into()),
        };

        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(outcome)
    }
}

/// Lock service that counts calls on top of the in-process service.
#[derive(Default)]
pub struct RecordingLockService {
    pub inner: InProcessLockService,
    acquired: AtomicUsize,
    extended: AtomicUsize,
    released: AtomicUsize,
    keys: Mutex<Vec<String>>,
}

impl RecordingLockService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn extended(&self) -> usize {
        self.extended.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl LockService for RecordingLockService {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<Lease>, BoxError> {
        let lease = self.inner.try_acquire(key, ttl).await?;
        if lease.is_some() {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            self.keys.lock().unwrap().push(key.to_string());
        }
        Ok(lease)
    }

    async fn extend(&self, lease: &Lease, ttl: Duration) -> Result<bool, BoxError> {
        self.extended.fetch_add(1, Ordering::SeqCst);
        self.inner.extend(lease, ttl).await
    }

    async fn release(&self, lease: &Lease) -> Result<(), BoxError> {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release(lease).await
    }
}

/// Bus that always fails.
pub struct FailingBus;

#[async_trait]
impl OutboundBus for FailingBus {
    async fn publish(&self, _messages: &[Envelope]) -> Result<(), BoxError> {
        Err("broker unavailable".into())
    }
}

/// Alert channel that records what it was asked to send.
#[derive(Default)]
pub struct RecordingAlertChannel {
    sent: Mutex<Vec<Alert>>,
    hang: bool,
}

impl RecordingAlertChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A channel whose sends never complete.
    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            hang: true,
            ..Self::default()
        })
    }

    pub fn sent(&self) -> Vec<Alert> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertChannel for RecordingAlertChannel {
    async fn send(&self, alert: &Alert) -> Result<(), BoxError> {
        self.sent.lock().unwrap().push(alert.clone());
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}
