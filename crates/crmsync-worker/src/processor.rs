//! Single-message processing: lease gate, handler, follow-up publish.

use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};

use crate::alert::AlertRouter;
use crate::batch::DeliveredMessage;
use crate::bus::OutboundBus;
use crate::envelope::Envelope;
use crate::error::{WorkerError, WorkerResult};
use crate::handler::{CorrelationContext, HandlerOutcome, IgnoreReason, MessageHandler};
use crate::lease::LeaseCoordinator;

/// What happened to a successfully handled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Handler completed; `published` follow-ups went to the bus.
    Completed { published: usize },
    /// Handler skipped the message.
    Ignored(IgnoreReason),
}

/// Runs one message through the lease gate and its handler.
#[derive(Clone)]
pub struct MessageProcessor {
    coordinator: LeaseCoordinator,
    bus: Arc<dyn OutboundBus>,
    alerts: Arc<AlertRouter>,
}

impl MessageProcessor {
    pub fn new(
        coordinator: LeaseCoordinator,
        bus: Arc<dyn OutboundBus>,
        alerts: Arc<AlertRouter>,
    ) -> Self {
        Self {
            coordinator,
            bus,
            alerts,
        }
    }

    /// Process one message.
    ///
    /// Ignored outcomes are logged as warnings and count as handled. Errors
    /// are logged, escalated when the alert router says so, and returned so
    /// the queue redelivers the message.
    pub async fn process(
        &self,
        message: &DeliveredMessage,
        handler: &dyn MessageHandler,
    ) -> WorkerResult<MessageOutcome> {
        let envelope = &message.envelope;
        let ctx = CorrelationContext {
            trace_id: message.delivery.trace_id.clone(),
            message_id: envelope.message_id,
            handler: handler.name().to_string(),
            lock_key: envelope.lock_key().map(str::to_string),
        };

        let span = info_span!(
            "process_message",
            trace_id = %ctx.trace_id,
            message_id = %ctx.message_id,
            topic = %envelope.topic,
            handler = %ctx.handler,
            lock_key = ctx.lock_key.as_deref().unwrap_or(""),
        );

        async {
            let result = self
                .coordinator
                .run_exclusive(&envelope.topic, envelope.lock_key(), || {
                    self.run_handler(envelope, handler, &ctx)
                })
                .await;

            match result {
                Ok(MessageOutcome::Completed { published }) => {
                    info!(published, "Message processed");
                    Ok(MessageOutcome::Completed { published })
                }
                Ok(MessageOutcome::Ignored(reason)) => {
                    warn!(
                        reason = %reason.title,
                        detail = reason.detail.as_deref().unwrap_or(""),
                        "Message ignored"
                    );
                    Ok(MessageOutcome::Ignored(reason))
                }
                Err(e) => {
                    if e.is_lock_unavailable() {
                        warn!(error = %e, "Lock busy, message will be redelivered");
                    } else {
                        error!(error = %e, "Failed to process message");
                    }
                    self.alerts
                        .notify_failure(&ctx.handler, envelope, &message.delivery, &e)
                        .await;
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_handler(
        &self,
        envelope: &Envelope,
        handler: &dyn MessageHandler,
        ctx: &CorrelationContext,
    ) -> WorkerResult<MessageOutcome> {
        let outcome = handler
            .handle(envelope, ctx)
            .await
            .map_err(|source| WorkerError::Handler {
                message_id: ctx.message_id,
                handler: ctx.handler.clone(),
                source,
            })?;

        match outcome {
            HandlerOutcome::Completed(follow_ups) => {
                if !follow_ups.is_empty() {
                    self.bus
                        .publish(&follow_ups)
                        .await
                        .map_err(|e| WorkerError::PublishFailed {
                            count: follow_ups.len(),
                            cause: e.to_string(),
                        })?;
                }
                Ok(MessageOutcome::Completed {
                    published: follow_ups.len(),
                })
            }
            HandlerOutcome::Ignored(reason) => Ok(MessageOutcome::Ignored(reason)),
        }
    }
}
