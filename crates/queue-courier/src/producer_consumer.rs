//! # Producer / Consumer Queue
//!
//! Push / blocking-pop messaging over a list store. Producers push onto the
//! head of a named list; the consumer pops from the tail and hands each
//! payload to the handler on its own task, without waiting for it.
//!
//! Delivery is at-most-once-attempted: a popped payload whose handler fails
//! is logged and gone. Concurrent handlers are bounded by `max_in_flight`;
//! the consumer waits for a free slot before popping again.

use crate::client::{panic_message, ListStore, MessageHandler};
use crate::config::ProducerConsumerConfig;
use crate::shutdown::ShutdownSignal;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[cfg(test)]
#[path = "producer_consumer_tests.rs"]
mod tests;

/// Named list with fire-and-forget dispatch
pub struct ProducerConsumerQueue {
    store: Arc<dyn ListStore>,
    queue_name: String,
    config: ProducerConsumerConfig,
    slots: Arc<Semaphore>,
}

impl ProducerConsumerQueue {
    pub fn new(
        store: Arc<dyn ListStore>,
        queue_name: impl Into<String>,
        config: ProducerConsumerConfig,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        Self {
            store,
            queue_name: queue_name.into(),
            config,
            slots,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Handlers currently running
    pub fn in_flight(&self) -> usize {
        self.config.max_in_flight.max(1) - self.slots.available_permits()
    }

    /// Push a payload onto the list. Failures are logged, never returned.
    pub async fn produce(&self, payload: &str) {
        match self.store.push_left(&self.queue_name, payload).await {
            Ok(()) => debug!(queue = %self.queue_name, "Produced message"),
            Err(e) => error!(queue = %self.queue_name, error = %e, "Error producing message"),
        }
    }

    /// Pop and dispatch until `shutdown` fires.
    ///
    /// Handlers already spawned keep running after the loop returns.
    pub async fn consume<H: MessageHandler>(&self, handler: H, mut shutdown: ShutdownSignal) {
        let handler = Arc::new(handler);
        let keys = [self.queue_name.clone()];
        let pause = self.config.wait_between_consume();

        info!(queue = %self.queue_name, max_in_flight = self.config.max_in_flight, "List consumer started");

        loop {
            if shutdown.is_triggered() {
                break;
            }

            let permit = tokio::select! {
                _ = shutdown.triggered() => break,
                permit = self.slots.clone().acquire_owned() => permit,
            };
            let permit = match permit {
                Ok(permit) => permit,
                Err(e) => {
                    error!(queue = %self.queue_name, error = %e, "Dispatch slots closed");
                    break;
                }
            };

            let popped = tokio::select! {
                _ = shutdown.triggered() => break,
                popped = self.store.pop_right_blocking(&keys) => popped,
            };

            match popped {
                Ok((_key, payload)) => {
                    let handler = handler.clone();
                    let queue = self.queue_name.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        match AssertUnwindSafe(handler.handle(payload)).catch_unwind().await {
                            Ok(Ok(())) => debug!(queue = %queue, "Consumed message"),
                            Ok(Err(e)) => {
                                error!(queue = %queue, error = %e, "Error consuming message")
                            }
                            Err(panic) => error!(
                                queue = %queue,
                                panic = %panic_message(panic.as_ref()),
                                "List handler panicked"
                            ),
                        }
                    });
                }
                Err(e) => {
                    drop(permit);
                    error!(queue = %self.queue_name, error = %e, "Error popping message");
                }
            }

            if !pause.is_zero() {
                tokio::select! {
                    _ = shutdown.triggered() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        info!(queue = %self.queue_name, "List consumer stopped");
    }

    /// Run [`consume`](Self::consume) as a background task
    pub fn spawn<H: MessageHandler>(self, handler: H, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move { self.consume(handler, shutdown).await })
    }
}
