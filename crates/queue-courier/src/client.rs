//! Capability traits consumed by the publisher and the consumer loops.
//!
//! Backing clients are constructed once by the host and injected as
//! `Arc<dyn QueueService>` / `Arc<dyn ListStore>`; nothing here holds
//! process-wide state.

use crate::config::ConsumptionConfig;
use crate::error::QueueError;
use crate::message::{
    AckToken, BatchEntry, BatchSendResult, QueueRef, ReceivedMessage, SendReceipt, SendRequest,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Attribute holding a queue's ARN
pub const QUEUE_ARN_ATTRIBUTE: &str = "QueueArn";

/// Operations of a lease-based queue service (SQS semantics)
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Long-poll for up to `config.max_messages` messages, each leased for
    /// the configured visibility timeout
    async fn receive(
        &self,
        queue: &QueueRef,
        config: &ConsumptionConfig,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Acknowledge a leased message
    async fn delete(&self, queue: &QueueRef, ack_token: &AckToken) -> Result<(), QueueError>;

    /// Send a single message
    async fn send(&self, queue: &QueueRef, request: &SendRequest)
        -> Result<SendReceipt, QueueError>;

    /// Send pre-built entries in one call
    async fn send_batch(
        &self,
        queue: &QueueRef,
        entries: &[BatchEntry],
    ) -> Result<BatchSendResult, QueueError>;

    /// Resolve a queue name to its URL
    async fn resolve_url(&self, name: &str) -> Result<QueueRef, QueueError>;

    /// Read queue attributes
    async fn get_attributes(
        &self,
        queue: &QueueRef,
        names: &[String],
    ) -> Result<HashMap<String, String>, QueueError>;

    /// Resolve a queue name and look up its ARN
    async fn queue_arn(&self, name: &str) -> Result<String, QueueError> {
        let queue = self.resolve_url(name).await?;
        let mut attributes = self
            .get_attributes(&queue, &[QUEUE_ARN_ATTRIBUTE.to_string()])
            .await?;

        attributes
            .remove(QUEUE_ARN_ATTRIBUTE)
            .ok_or_else(|| QueueError::ProviderError {
                provider: "QueueService".to_string(),
                code: "MissingAttribute".to_string(),
                message: format!("queue '{}' did not report {}", name, QUEUE_ARN_ATTRIBUTE),
            })
    }
}

/// Push / blocking-pop list store (Redis list semantics)
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Push a value onto the head of the list at `key`
    async fn push_left(&self, key: &str, value: &str) -> Result<(), QueueError>;

    /// Pop from the tail of the first non-empty list among `keys`, waiting
    /// indefinitely until one has a value. Returns `(key, value)`.
    async fn pop_right_blocking(&self, keys: &[String]) -> Result<(String, String), QueueError>;
}

// ============================================================================
// Handlers
// ============================================================================

/// Failure reported by a message handler
pub type HandlerError = anyhow::Error;

/// Boxed future returned by [`MessageHandler::handle`]
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// Caller-supplied processing for one message body.
///
/// Implemented for any `Fn(String) -> impl Future<Output = Result<(), HandlerError>>`
/// so plain async closures can be passed directly.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, body: String) -> HandlerFuture;
}

impl<F, Fut> MessageHandler for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn handle(&self, body: String) -> HandlerFuture {
        Box::pin(self(body))
    }
}

/// Best-effort text of a caught handler panic
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
}
