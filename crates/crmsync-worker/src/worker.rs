//! Worker facade: one entry point per queue trigger invocation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument};

use crate::alert::{AlertChannel, AlertRouter};
use crate::batch::InboundBatch;
use crate::bus::OutboundBus;
use crate::config::WorkerConfig;
use crate::dispatcher::{BatchDispatcher, BatchReport};
use crate::error::{WorkerError, WorkerResult};
use crate::handler::HandlerRegistry;
use crate::lease::{LeaseCoordinator, LockService};
use crate::processor::MessageProcessor;

/// Collaborator handles shared by every handler of a process.
///
/// Built once at startup and passed to [`Worker::new`].
#[derive(Clone)]
pub struct WorkerContext {
    pub lock_service: Arc<dyn LockService>,
    pub bus: Arc<dyn OutboundBus>,
    pub alert_channel: Option<Arc<dyn AlertChannel>>,
}

impl WorkerContext {
    pub fn new(lock_service: Arc<dyn LockService>, bus: Arc<dyn OutboundBus>) -> Self {
        Self {
            lock_service,
            bus,
            alert_channel: None,
        }
    }

    #[must_use]
    pub fn with_alert_channel(mut self, channel: Arc<dyn AlertChannel>) -> Self {
        self.alert_channel = Some(channel);
        self
    }
}

/// Consumes inbound batches for one topic.
pub struct Worker {
    topic: String,
    registry: HandlerRegistry,
    dispatcher: BatchDispatcher,
    alerts: Arc<AlertRouter>,
    batch_deadline: Option<Duration>,
}

impl Worker {
    pub fn new(
        config: &WorkerConfig,
        context: &WorkerContext,
        registry: HandlerRegistry,
        topic: impl Into<String>,
    ) -> Self {
        let coordinator = LeaseCoordinator::new(Arc::clone(&context.lock_service))
            .with_expiry(config.lock_expiry)
            .with_wait_policy(config.lock_wait);

        let mut router = match &context.alert_channel {
            Some(channel) => AlertRouter::new(Arc::clone(channel)),
            None => AlertRouter::disabled(),
        };
        router = router
            .with_enabled(config.alert_enabled)
            .with_channel_name(config.alert_channel.clone())
            .with_max_receives(config.max_receive_count)
            .with_timeout(config.alert_timeout);
        let alerts = Arc::new(router);

        let processor = MessageProcessor::new(
            coordinator,
            Arc::clone(&context.bus),
            Arc::clone(&alerts),
        );

        Self {
            topic: topic.into(),
            registry,
            dispatcher: BatchDispatcher::new(Arc::new(processor)),
            alerts,
            batch_deadline: config.batch_deadline,
        }
    }

    /// Topic this worker consumes.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Parse and process a raw batch payload.
    pub async fn handle_raw(&self, bytes: &[u8], trace_id: &str) -> WorkerResult<BatchReport> {
        match InboundBatch::from_slice(bytes) {
            Ok(batch) => self.handle_batch(batch, trace_id).await,
            Err(e) => {
                self.alert_parse_failure(&e).await;
                Err(e)
            }
        }
    }

    /// Process one inbound batch.
    ///
    /// Parse failures are alerted regardless of receive count. When a batch
    /// deadline is configured, in-flight messages are cancelled once it
    /// elapses; their leases are still released.
    #[instrument(skip_all, fields(topic = %self.topic, trace_id = %trace_id))]
    pub async fn handle_batch(
        &self,
        batch: InboundBatch,
        trace_id: &str,
    ) -> WorkerResult<BatchReport> {
        let handler = self.registry.resolve(&self.topic)?;

        let messages = match batch.into_messages(trace_id) {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "Failed to parse inbound batch");
                self.alert_parse_failure(&e).await;
                return Err(e);
            }
        };

        info!("Received {} messages", messages.len());

        let dispatch = self.dispatcher.process_batch(messages, handler);
        match self.batch_deadline {
            Some(deadline) => tokio::time::timeout(deadline, dispatch)
                .await
                .map_err(|_| {
                    error!(deadline_ms = deadline.as_millis() as u64, "Batch deadline exceeded");
                    WorkerError::BatchDeadlineExceeded { deadline }
                })?,
            None => dispatch.await,
        }
    }

    async fn alert_parse_failure(&self, error: &WorkerError) {
        let handler = self
            .registry
            .resolve(&self.topic)
            .map(|handler| handler.name().to_string())
            .unwrap_or_else(|_| self.topic.clone());

        self.alerts
            .notify(
                &handler,
                vec![format!("Failed to parse inbound batch. Error: {error}")],
            )
            .await;
    }
}
