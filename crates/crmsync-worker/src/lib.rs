//! # crmsync-worker
//!
//! Message-driven worker runtime for the CRM integration workers.
//!
//! Consumes batches of queued messages, serializes messages that share a
//! correlation key through a keyed lease, invokes the business handler for
//! the topic and publishes the follow-up messages it returns.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use crmsync_worker::{
//!     HandlerRegistry, InMemoryBus, InProcessLockService, Worker, WorkerConfig, WorkerContext,
//! };
//!
//! let config = WorkerConfig::from_env()?;
//! let context = WorkerContext::new(
//!     Arc::new(InProcessLockService::new()),
//!     Arc::new(InMemoryBus::new()),
//! );
//! let registry = HandlerRegistry::new().with("salesforce-contacts-syncer", Arc::new(handler));
//!
//! let worker = Worker::new(&config, &context, registry, "salesforce-contacts-syncer");
//! let report = worker.handle_raw(&payload, &trace_id).await?;
//! ```

pub mod alert;
pub mod batch;
pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod lease;
pub mod logging;
pub mod processor;
pub mod worker;

pub use alert::{Alert, AlertChannel, AlertRouter};
pub use batch::{DeliveredMessage, DeliveryContext, InboundBatch, InboundRecord};
pub use bus::{InMemoryBus, OutboundBus};
pub use config::{WorkerConfig, WorkerConfigBuilder};
pub use dispatcher::{BatchDispatcher, BatchReport};
pub use envelope::{Envelope, Message};
pub use error::{BoxError, ErrorKind, MessageFailure, WorkerError, WorkerResult};
pub use handler::{
    CorrelationContext, HandlerOutcome, HandlerRegistry, IgnoreReason, MessageHandler,
};
pub use lease::{InProcessLockService, Lease, LeaseCoordinator, LockService, WaitPolicy};
pub use processor::{MessageOutcome, MessageProcessor};
pub use worker::{Worker, WorkerContext};
