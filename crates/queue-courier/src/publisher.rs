//! # Queue Publisher
//!
//! Publishes single messages or pre-built batches to one queue.
//!
//! Publishing has three stages:
//!
//! 1. **Validation**: queue-type rules are checked locally before any network
//!    call. Ordered queues need a group id; standard queues reject group and
//!    deduplication ids.
//! 2. **Request building**: a single send carries the group/deduplication ids
//!    on ordered queues, or a delay on standard queues when it lies strictly
//!    inside the configured bounds (otherwise the delay is dropped).
//! 3. **Bounded retry**: up to `max_retries` attempts with no pause between
//!    them. A payload-too-large rejection aborts at once; every other failure
//!    is logged and retried, and exhaustion is reported as an unsuccessful
//!    result rather than an error.

use crate::client::QueueService;
use crate::config::PublishConfig;
use crate::error::QueueError;
use crate::message::{BatchEntry, Payload, PublishRequest, SendRequest, SendResponse};
use crate::policy::{self, Queue};
use std::sync::Arc;
use tracing::{debug, error, warn};

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;

/// Request built once and reused by every attempt
enum Prepared<'a> {
    Single(SendRequest),
    Batch(&'a [BatchEntry]),
}

/// Publisher bound to a single queue
pub struct QueuePublisher {
    service: Arc<dyn QueueService>,
    queue: Queue,
    config: PublishConfig,
}

impl QueuePublisher {
    /// Create a publisher for an already-resolved queue
    pub fn new(service: Arc<dyn QueueService>, queue: Queue, config: PublishConfig) -> Self {
        Self {
            service,
            queue,
            config,
        }
    }

    /// Resolve the queue URL by name, then create the publisher.
    ///
    /// # Errors
    ///
    /// Returns the lookup error unchanged (e.g. [`QueueError::QueueNotFound`]);
    /// lookups are not retried.
    pub async fn connect(
        service: Arc<dyn QueueService>,
        queue_name: &str,
        config: PublishConfig,
    ) -> Result<Self, QueueError> {
        let reference = service.resolve_url(queue_name).await.map_err(|e| {
            error!(queue = %queue_name, error = %e, "Problem connecting to queue");
            e
        })?;

        Ok(Self::new(service, Queue::new(reference), config))
    }

    /// The queue this publisher writes to
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// ARN of the bound queue
    pub async fn queue_arn(&self) -> Result<String, QueueError> {
        let mut attributes = self
            .service
            .get_attributes(
                self.queue.reference(),
                &[crate::client::QUEUE_ARN_ATTRIBUTE.to_string()],
            )
            .await?;

        attributes
            .remove(crate::client::QUEUE_ARN_ATTRIBUTE)
            .ok_or_else(|| QueueError::ProviderError {
                provider: "QueueService".to_string(),
                code: "MissingAttribute".to_string(),
                message: format!("queue '{}' did not report its ARN", self.queue),
            })
    }

    /// Publish and report whether any attempt succeeded.
    ///
    /// # Errors
    ///
    /// Only validation failures and payload-too-large rejections are
    /// returned as errors; all other failures become `Ok(false)` once
    /// attempts are exhausted.
    pub async fn publish(&self, request: PublishRequest) -> Result<bool, QueueError> {
        Ok(self.publish_with_response(request).await?.is_some())
    }

    /// Publish and return the service's native response of the successful
    /// attempt, or `None` when every attempt failed.
    pub async fn publish_with_response(
        &self,
        request: PublishRequest,
    ) -> Result<Option<SendResponse>, QueueError> {
        let kind = self.queue.kind();
        policy::validate(
            kind,
            request.group_id.as_deref(),
            request.deduplication_id.as_deref(),
        )?;

        let max_retries = request
            .max_retries
            .filter(|n| *n > 0)
            .unwrap_or(self.config.max_retries);

        let prepared = match &request.payload {
            Payload::Single(body) => Prepared::Single(self.build_send_request(body, &request)),
            Payload::Batch(entries) => Prepared::Batch(entries),
        };

        for attempt in 0..max_retries {
            let result = match &prepared {
                Prepared::Single(send_request) => self
                    .service
                    .send(self.queue.reference(), send_request)
                    .await
                    .map(SendResponse::Single),
                Prepared::Batch(entries) => self
                    .service
                    .send_batch(self.queue.reference(), entries)
                    .await
                    .map(SendResponse::Batch),
            };

            match result {
                Ok(response) => {
                    debug!(
                        queue = %self.queue,
                        kind = %kind,
                        attempt = attempt + 1,
                        batch = request.is_batch(),
                        "Published message"
                    );
                    return Ok(Some(response));
                }
                Err(e) if e.aborts_publish() => {
                    error!(queue = %self.queue, error = %e, "Publish rejected");
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        queue = %self.queue,
                        error = %e,
                        attempt = attempt + 1,
                        max_retries,
                        "Error publishing to queue"
                    );
                }
            }
        }

        error!(
            queue = %self.queue,
            max_retries,
            "Publish failed after exhausting retries"
        );
        Ok(None)
    }

    fn build_send_request(&self, body: &str, request: &PublishRequest) -> SendRequest {
        let kind = self.queue.kind();
        let mut send_request = SendRequest {
            body: body.to_string(),
            attributes: request.attributes.clone(),
            ..Default::default()
        };

        if self.queue.is_ordered() {
            send_request.group_id = request.group_id.clone();
            send_request.deduplication_id =
                request.deduplication_id.clone().filter(|d| !d.is_empty());
        } else {
            send_request.delay_seconds =
                policy::delay_applies(kind, request.delay_seconds, self.config.delay_bounds);
        }

        send_request
    }
}
