//! # Queue Consumer Loop
//!
//! Drains one queue with lease semantics: each message is handed to the
//! handler and deleted only after the handler succeeds. A failed or
//! panicking handler leaves the message leased; it becomes visible again
//! once its visibility timeout expires, which is the only retry mechanism.
//!
//! Messages of one poll are handled strictly in the order received, one at
//! a time. Nothing short of the shutdown signal ends the loop.

use crate::client::{panic_message, MessageHandler, QueueService};
use crate::config::ConsumptionConfig;
use crate::error::QueueError;
use crate::message::ReceivedMessage;
use crate::policy::Queue;
use crate::shutdown::ShutdownSignal;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;

/// What happened to one dispatched message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Handler succeeded and the message was deleted
    Acknowledged,
    /// Handler succeeded but the delete call failed
    AckFailed,
    /// Handler failed or panicked; the lease is left to expire
    Released,
}

/// Long-running poll / dispatch / acknowledge loop over one queue
pub struct QueueConsumerLoop {
    service: Arc<dyn QueueService>,
    queue: Queue,
    config: ConsumptionConfig,
}

impl QueueConsumerLoop {
    pub fn new(service: Arc<dyn QueueService>, queue: Queue, config: ConsumptionConfig) -> Self {
        Self {
            service,
            queue,
            config,
        }
    }

    /// Resolve the queue URL by name, then create the loop.
    ///
    /// # Errors
    ///
    /// Returns the lookup error unchanged; lookups are not retried.
    pub async fn connect(
        service: Arc<dyn QueueService>,
        queue_name: &str,
        config: ConsumptionConfig,
    ) -> Result<Self, QueueError> {
        let reference = service.resolve_url(queue_name).await.map_err(|e| {
            error!(queue = %queue_name, error = %e, "Problem connecting to queue");
            e
        })?;

        Ok(Self::new(service, Queue::new(reference), config))
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// One long poll, returning whatever leased messages arrived
    pub async fn receive_batch(&self) -> Result<Vec<ReceivedMessage>, QueueError> {
        self.service
            .receive(self.queue.reference(), &self.config)
            .await
    }

    /// Poll and dispatch until `shutdown` fires.
    ///
    /// The signal is checked before every poll and raced against the poll
    /// itself; a handler that is already running always completes.
    pub async fn subscribe_all<H: MessageHandler>(&self, handler: H, mut shutdown: ShutdownSignal) {
        info!(queue = %self.queue, kind = %self.queue.kind(), "Consumer loop started");

        loop {
            if shutdown.is_triggered() {
                break;
            }

            let polled = tokio::select! {
                _ = shutdown.triggered() => break,
                polled = self.receive_batch() => polled,
            };

            match polled {
                Ok(messages) => {
                    for message in messages {
                        self.dispatch(&handler, message).await;
                    }
                }
                Err(e) => {
                    error!(queue = %self.queue, error = %e, "Error receiving messages");
                    let backoff = self.config.poll_error_backoff();
                    if !backoff.is_zero() {
                        tokio::select! {
                            _ = shutdown.triggered() => break,
                            _ = tokio::time::sleep(backoff) => {}
                        }
                    }
                }
            }
        }

        info!(queue = %self.queue, "Consumer loop stopped");
    }

    /// Run [`subscribe_all`](Self::subscribe_all) as a background task
    pub fn spawn<H: MessageHandler>(self, handler: H, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move { self.subscribe_all(handler, shutdown).await })
    }

    pub(crate) async fn dispatch<H: MessageHandler>(
        &self,
        handler: &H,
        message: ReceivedMessage,
    ) -> Disposition {
        let outcome = AssertUnwindSafe(handler.handle(message.body))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(
                    queue = %self.queue,
                    message_id = %message.message_id,
                    error = %e,
                    "Error processing message"
                );
                return Disposition::Released;
            }
            Err(panic) => {
                error!(
                    queue = %self.queue,
                    message_id = %message.message_id,
                    panic = %panic_message(panic.as_ref()),
                    "Message handler panicked"
                );
                return Disposition::Released;
            }
        }

        match self
            .service
            .delete(self.queue.reference(), &message.ack_token)
            .await
        {
            Ok(()) => {
                debug!(
                    queue = %self.queue,
                    message_id = %message.message_id,
                    "Message processed and deleted"
                );
                Disposition::Acknowledged
            }
            Err(e) => {
                error!(
                    queue = %self.queue,
                    message_id = %message.message_id,
                    error = %e,
                    "Error deleting message"
                );
                Disposition::AckFailed
            }
        }
    }
}
