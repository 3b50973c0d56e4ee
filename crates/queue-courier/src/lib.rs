//! # Queue Courier
//!
//! Queue-backed producer/consumer engine over SQS-style lease queues and
//! Redis lists.
//!
//! This library provides:
//! - A long-polling consumer loop that acknowledges only after the handler succeeds
//! - A publisher with bounded retries and queue-type validation
//! - A list-backed producer/consumer queue with bounded concurrent dispatch
//! - Standard vs ordered (`.fifo`) queue policy
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Queue references, messages and publish requests
//! - [`policy`] - Queue kind classification and publish validation
//! - [`client`] - Service traits and message handlers
//! - [`consumer`] - [`QueueConsumerLoop`]
//! - [`publisher`] - [`QueuePublisher`]
//! - [`producer_consumer`] - [`ProducerConsumerQueue`]
//! - [`providers`] - SQS, Redis and in-memory backends
//! - [`config`] - Layered configuration
//! - [`shutdown`] - Cooperative shutdown signal
//!
//! ## Example
//!
//! ```no_run
//! use queue_courier::{
//!     providers::InMemoryQueueService, shutdown_channel, ConsumptionConfig, QueueConsumerLoop,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), queue_courier::QueueError> {
//! let service = Arc::new(InMemoryQueueService::new());
//! service.create_queue("orders")?;
//!
//! let consumer =
//!     QueueConsumerLoop::connect(service, "orders", ConsumptionConfig::default()).await?;
//! let (trigger, signal) = shutdown_channel();
//! let handle = consumer.spawn(
//!     |body: String| async move {
//!         println!("{}", body);
//!         Ok::<(), queue_courier::HandlerError>(())
//!     },
//!     signal,
//! );
//!
//! trigger.trigger();
//! let _ = handle.await;
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod client;
pub mod config;
pub mod consumer;
pub mod error;
pub mod message;
pub mod policy;
pub mod producer_consumer;
pub mod providers;
pub mod publisher;
pub mod shutdown;

// Re-export commonly used types at crate root for convenience
pub use client::{HandlerError, ListStore, MessageHandler, QueueService};
pub use config::{
    ConsumptionConfig, CourierConfig, ProducerConsumerConfig, PublishConfig, RedisConfig,
    SqsConfig,
};
pub use consumer::QueueConsumerLoop;
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use message::{
    AckToken, BatchEntry, BatchSendResult, MessageAttribute, MessageAttributes, MessageId,
    Payload, PublishRequest, QueueRef, ReceivedMessage, SendReceipt, SendResponse,
};
pub use policy::{DelayBounds, Queue, QueueKind};
pub use producer_consumer::ProducerConsumerQueue;
pub use publisher::QueuePublisher;
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
