//! Concurrent fan-out of a batch over the message processor.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::batch::DeliveredMessage;
use crate::error::{MessageFailure, WorkerError, WorkerResult};
use crate::handler::MessageHandler;
use crate::processor::{MessageOutcome, MessageProcessor};

/// Summary of a fully successful batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: usize,
    pub ignored: usize,
    pub published: usize,
}

impl BatchReport {
    /// Total messages handled.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed + self.ignored
    }

    fn record(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::Completed { published } => {
                self.completed += 1;
                self.published += published;
            }
            MessageOutcome::Ignored(_) => self.ignored += 1,
        }
    }
}

/// Processes every message of a batch concurrently.
///
/// A failing message never cancels its siblings. Once all have finished,
/// any failures are returned as one [`WorkerError::BatchFailed`].
#[derive(Clone)]
pub struct BatchDispatcher {
    processor: Arc<MessageProcessor>,
}

impl BatchDispatcher {
    pub fn new(processor: Arc<MessageProcessor>) -> Self {
        Self { processor }
    }

    #[instrument(skip_all, fields(batch_size = messages.len(), handler = %handler.name()))]
    pub async fn process_batch(
        &self,
        messages: Vec<DeliveredMessage>,
        handler: Arc<dyn MessageHandler>,
    ) -> WorkerResult<BatchReport> {
        if messages.is_empty() {
            return Ok(BatchReport::default());
        }

        let total = messages.len();
        let message_ids: Vec<Uuid> = messages.iter().map(|m| m.envelope.message_id).collect();
        let mut join_set = JoinSet::new();

        for (index, message) in messages.into_iter().enumerate() {
            let processor = Arc::clone(&self.processor);
            let handler = Arc::clone(&handler);
            join_set.spawn(async move {
                let message_id = message.envelope.message_id;
                let result = AssertUnwindSafe(processor.process(&message, handler.as_ref()))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        error!(message_id = %message_id, "Handler panicked");
                        Err(WorkerError::HandlerPanicked {
                            message_id,
                            handler: handler.name().to_string(),
                        })
                    });
                (index, result)
            });
        }

        let mut report = BatchReport::default();
        let mut finished = vec![false; total];
        let mut failures: Vec<(usize, WorkerError)> = Vec::new();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    finished[index] = true;
                    match result {
                        Ok(outcome) => report.record(&outcome),
                        Err(e) => failures.push((index, e)),
                    }
                }
                Err(e) => error!(error = %e, "Batch task did not complete"),
            }
        }
        failures.extend(cancelled(&message_ids, &finished, handler.name()));

        if failures.is_empty() {
            info!(
                completed = report.completed,
                ignored = report.ignored,
                published = report.published,
                "Batch processed"
            );
            return Ok(report);
        }

        failures.sort_by_key(|(index, _)| *index);
        error!(
            failed = failures.len(),
            succeeded = report.total(),
            "Batch finished with failures"
        );

        Err(WorkerError::BatchFailed {
            total,
            failures: failures
                .into_iter()
                .map(|(index, error)| MessageFailure {
                    message_id: message_ids[index],
                    error,
                })
                .collect(),
        })
    }
}

/// Failures for the messages whose task never reported back.
fn cancelled(message_ids: &[Uuid], finished: &[bool], handler: &str) -> Vec<(usize, WorkerError)> {
    message_ids
        .iter()
        .zip(finished)
        .enumerate()
        .filter(|(_, (_, done))| !**done)
        .map(|(index, (message_id, _))| {
            (
                index,
                WorkerError::TaskCancelled {
                    message_id: *message_id,
                    handler: handler.to_string(),
                },
            )
        })
        .collect()
}
