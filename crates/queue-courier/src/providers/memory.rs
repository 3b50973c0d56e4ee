//! In-memory queue service and list store for tests and development.
//!
//! [`InMemoryQueueService`] models the parts of SQS the engine relies on:
//! - Queues must be created before use; unknown names are `QueueNotFound`
//! - Received messages are leased for a visibility timeout and reappear,
//!   with a higher receive count, if not deleted before it expires
//! - Long polls wait up to the requested time for a message to arrive
//! - Ordered (`.fifo`) queues hand out a message group one lease at a time
//!   and drop repeated deduplication ids within a five minute window
//! - Standard queues honour per-message delays
//! - Bodies above the service payload limit are rejected
//!
//! [`InMemoryListStore`] is a map of deques with a blocking pop.
//!
//! All timing uses `tokio::time`, so tests can pause and advance the clock.

use crate::client::{ListStore, QueueService, QUEUE_ARN_ATTRIBUTE};
use crate::config::ConsumptionConfig;
use crate::error::{QueueError, ValidationError};
use crate::message::{
    AckToken, BatchEntry, BatchResultEntry, BatchResultError, BatchSendResult, MessageAttributes,
    MessageId, QueueRef, ReceivedMessage, SendReceipt, SendRequest, MAX_PAYLOAD_BYTES,
};
use crate::policy::{self, QueueKind};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Lease length when neither the poll nor the service overrides it
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Window in which a repeated deduplication id is dropped
pub const DEDUPLICATION_WINDOW: Duration = Duration::from_secs(5 * 60);

const MAX_DELAY_SECONDS: u32 = 900;
const MAX_BATCH_ENTRIES: usize = 10;
const ENDPOINT: &str = "https://sqs.memory.local";
const ACCOUNT_ID: &str = "000000000000";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// A message waiting in a queue
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: String,
    message_attributes: MessageAttributes,
    group_id: Option<String>,
    sequence: u64,
    sent_at_millis: i64,
    first_received_at_millis: Option<i64>,
    receive_count: u32,
    available_at: Instant,
}

/// A message currently leased to a consumer
struct Lease {
    message: StoredMessage,
    expires_at: Instant,
}

/// State of a single queue
struct InMemoryQueue {
    kind: QueueKind,
    /// Unleased messages ordered by `sequence`
    messages: VecDeque<StoredMessage>,
    /// Leased messages keyed by receipt handle
    leases: HashMap<String, Lease>,
    /// Deduplication id to (first seen, message id)
    deduplication: HashMap<String, (Instant, MessageId)>,
    next_sequence: u64,
}

impl InMemoryQueue {
    fn new(kind: QueueKind) -> Self {
        Self {
            kind,
            messages: VecDeque::new(),
            leases: HashMap::new(),
            deduplication: HashMap::new(),
            next_sequence: 0,
        }
    }

    /// Return expired leases to the visible set, keeping send order
    fn reclaim_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .leases
            .iter()
            .filter(|(_, lease)| lease.expires_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();

        for receipt in expired {
            if let Some(lease) = self.leases.remove(&receipt) {
                let position = self
                    .messages
                    .partition_point(|m| m.sequence < lease.message.sequence);
                self.messages.insert(position, lease.message);
            }
        }
    }

    fn leased_groups(&self) -> HashSet<String> {
        self.leases
            .values()
            .filter_map(|lease| lease.message.group_id.clone())
            .collect()
    }

    /// Earliest future instant at which a hidden message could become receivable
    fn next_change(&self, now: Instant) -> Option<Instant> {
        let delayed = self.messages.iter().map(|m| m.available_at);
        let leased = self.leases.values().map(|l| l.expires_at);
        delayed.chain(leased).filter(|at| *at > now).min()
    }

    fn enqueue(&mut self, message: OutgoingMessage<'_>, now: Instant) -> SendReceipt {
        self.deduplication
            .retain(|_, (seen_at, _)| now.duration_since(*seen_at) < DEDUPLICATION_WINDOW);

        if let Some(deduplication_id) = &message.deduplication_id {
            if let Some((_, message_id)) = self.deduplication.get(deduplication_id) {
                return SendReceipt {
                    message_id: message_id.clone(),
                    sequence_number: None,
                };
            }
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let message_id = MessageId::new();

        if let Some(deduplication_id) = message.deduplication_id {
            self.deduplication
                .insert(deduplication_id, (now, message_id.clone()));
        }

        self.messages.push_back(StoredMessage {
            message_id: message_id.clone(),
            body: message.body.to_string(),
            message_attributes: message.attributes.clone(),
            group_id: message.group_id.map(str::to_string),
            sequence,
            sent_at_millis: chrono::Utc::now().timestamp_millis(),
            first_received_at_millis: None,
            receive_count: 0,
            available_at: now + Duration::from_secs(u64::from(message.delay_seconds)),
        });

        SendReceipt {
            message_id,
            sequence_number: match self.kind {
                QueueKind::Ordered => Some(format!("{:020}", sequence)),
                QueueKind::Standard => None,
            },
        }
    }
}

/// A validated send, single or batch entry
struct OutgoingMessage<'a> {
    body: &'a str,
    attributes: &'a MessageAttributes,
    group_id: Option<&'a str>,
    deduplication_id: Option<String>,
    delay_seconds: u32,
}

impl<'a> OutgoingMessage<'a> {
    /// Apply the service's per-message rules for the queue kind
    fn validate(
        kind: QueueKind,
        body: &'a str,
        attributes: &'a MessageAttributes,
        group_id: Option<&'a str>,
        deduplication_id: Option<&'a str>,
        delay_seconds: Option<u32>,
    ) -> Result<Self, QueueError> {
        if body.len() > MAX_PAYLOAD_BYTES {
            return Err(QueueError::PayloadTooLarge {
                size: Some(body.len()),
                max_size: MAX_PAYLOAD_BYTES,
            });
        }

        let group_id = group_id.filter(|g| !g.is_empty());
        let deduplication_id = deduplication_id.filter(|d| !d.is_empty());
        policy::validate(kind, group_id, deduplication_id)?;

        let delay_seconds = delay_seconds.unwrap_or(0);
        if delay_seconds > MAX_DELAY_SECONDS {
            return Err(ValidationError::OutOfRange {
                field: "delay_seconds".to_string(),
                message: format!("must be at most {}", MAX_DELAY_SECONDS),
            }
            .into());
        }

        let deduplication_id = match kind {
            QueueKind::Ordered => {
                if delay_seconds > 0 {
                    return Err(ValidationError::NotAllowed {
                        fields: "delay_seconds".to_string(),
                        context: "ordered queue message".to_string(),
                    }
                    .into());
                }
                // Content-based deduplication when the sender gives no id
                Some(
                    deduplication_id
                        .map(str::to_string)
                        .unwrap_or_else(|| hex::encode(Sha256::digest(body.as_bytes()))),
                )
            }
            QueueKind::Standard => None,
        };

        Ok(Self {
            body,
            attributes,
            group_id,
            deduplication_id,
            delay_seconds,
        })
    }
}

fn wanted(requested: &[String], name: &str) -> bool {
    requested
        .iter()
        .any(|r| r == "All" || r == ".*" || r == name)
}

// ============================================================================
// InMemoryQueueService
// ============================================================================

/// In-memory [`QueueService`] with lease, redelivery and FIFO semantics
pub struct InMemoryQueueService {
    queues: Mutex<HashMap<String, InMemoryQueue>>,
    changed: Notify,
    default_visibility: Duration,
}

impl InMemoryQueueService {
    pub fn new() -> Self {
        Self::with_default_visibility(DEFAULT_VISIBILITY_TIMEOUT)
    }

    /// Service whose leases last `visibility` unless a poll overrides it
    pub fn with_default_visibility(visibility: Duration) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            changed: Notify::new(),
            default_visibility: visibility,
        }
    }

    /// Create a queue (idempotent) and return its URL.
    ///
    /// A name ending in `.fifo` creates an ordered queue.
    pub fn create_queue(&self, name: &str) -> Result<QueueRef, QueueError> {
        let reference = QueueRef::new(name)?;
        let kind = policy::classify(&reference);
        let name = reference.name().to_string();

        lock(&self.queues)
            .entry(name.clone())
            .or_insert_with(|| InMemoryQueue::new(kind));

        Ok(QueueRef::new(Self::url_for(&name))?)
    }

    fn url_for(name: &str) -> String {
        format!("{}/{}/{}", ENDPOINT, ACCOUNT_ID, name)
    }

    fn not_found(queue: &QueueRef) -> QueueError {
        QueueError::QueueNotFound {
            queue_name: queue.name().to_string(),
        }
    }

    /// One non-blocking receive attempt; also reports when to look again
    fn try_receive(
        &self,
        queue: &QueueRef,
        config: &ConsumptionConfig,
    ) -> Result<(Vec<ReceivedMessage>, Option<Instant>), QueueError> {
        let mut queues = lock(&self.queues);
        let state = queues
            .get_mut(queue.name())
            .ok_or_else(|| Self::not_found(queue))?;

        let now = Instant::now();
        state.reclaim_expired(now);

        let visibility = config
            .visibility_timeout_seconds
            .map(|s| Duration::from_secs(u64::from(s)))
            .unwrap_or(self.default_visibility);
        let max_messages = config.max_messages.clamp(1, MAX_BATCH_ENTRIES as u32) as usize;
        let mut blocked_groups = match state.kind {
            QueueKind::Ordered => state.leased_groups(),
            QueueKind::Standard => HashSet::new(),
        };

        let mut picked = Vec::new();
        let mut index = 0;
        while index < state.messages.len() && picked.len() < max_messages {
            let message = &state.messages[index];
            let group_blocked = message
                .group_id
                .as_ref()
                .is_some_and(|g| blocked_groups.contains(g));

            if message.available_at > now || group_blocked {
                // A hidden message also holds back the rest of its group
                if let Some(group) = &message.group_id {
                    blocked_groups.insert(group.clone());
                }
                index += 1;
                continue;
            }

            if let Some(message) = state.messages.remove(index) {
                picked.push(message);
            }
        }

        let now_millis = chrono::Utc::now().timestamp_millis();
        let mut received = Vec::with_capacity(picked.len());
        for mut message in picked {
            message.receive_count += 1;
            let first_received = *message.first_received_at_millis.get_or_insert(now_millis);

            let mut attributes = HashMap::new();
            let system = [
                ("ApproximateReceiveCount", Some(message.receive_count.to_string())),
                ("SentTimestamp", Some(message.sent_at_millis.to_string())),
                ("ApproximateFirstReceiveTimestamp", Some(first_received.to_string())),
                ("MessageGroupId", message.group_id.clone()),
                (
                    "SequenceNumber",
                    (state.kind == QueueKind::Ordered).then(|| format!("{:020}", message.sequence)),
                ),
            ];
            for (name, value) in system {
                if let Some(value) = value {
                    if wanted(&config.attribute_names, name) {
                        attributes.insert(name.to_string(), value);
                    }
                }
            }

            let message_attributes = message
                .message_attributes
                .iter()
                .filter(|(name, _)| wanted(&config.message_attribute_names, name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();

            let receipt = uuid::Uuid::new_v4().to_string();
            received.push(ReceivedMessage {
                message_id: message.message_id.clone(),
                body: message.body.clone(),
                attributes,
                message_attributes,
                ack_token: AckToken::new(receipt.clone()),
            });
            state.leases.insert(
                receipt,
                Lease {
                    message,
                    expires_at: now + visibility,
                },
            );
        }

        Ok((received, state.next_change(now)))
    }

    fn with_queue<T>(
        &self,
        queue: &QueueRef,
        f: impl FnOnce(&mut InMemoryQueue) -> Result<T, QueueError>,
    ) -> Result<T, QueueError> {
        let mut queues = lock(&self.queues);
        let state = queues
            .get_mut(queue.name())
            .ok_or_else(|| Self::not_found(queue))?;
        f(state)
    }
}

impl Default for InMemoryQueueService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn receive(
        &self,
        queue: &QueueRef,
        config: &ConsumptionConfig,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let deadline = Instant::now() + config.wait_time();

        loop {
            let changed = self.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            let (received, next_change) = self.try_receive(queue, config)?;
            let now = Instant::now();
            if !received.is_empty() || now >= deadline {
                return Ok(received);
            }

            let wake_at = next_change
                .filter(|at| *at < deadline)
                .unwrap_or(deadline);
            let _ = tokio::time::timeout_at(wake_at, changed).await;
        }
    }

    async fn delete(&self, queue: &QueueRef, ack_token: &AckToken) -> Result<(), QueueError> {
        self.with_queue(queue, |state| {
            let now = Instant::now();
            let live = state
                .leases
                .get(ack_token.as_str())
                .is_some_and(|lease| lease.expires_at > now);
            if !live {
                return Err(QueueError::InvalidAckToken {
                    receipt: ack_token.as_str().to_string(),
                });
            }

            state.leases.remove(ack_token.as_str());
            Ok(())
        })?;

        // A finished lease may unblock its message group
        self.changed.notify_waiters();
        Ok(())
    }

    async fn send(
        &self,
        queue: &QueueRef,
        request: &SendRequest,
    ) -> Result<SendReceipt, QueueError> {
        let receipt = self.with_queue(queue, |state| {
            let outgoing = OutgoingMessage::validate(
                state.kind,
                &request.body,
                &request.attributes,
                request.group_id.as_deref(),
                request.deduplication_id.as_deref(),
                request.delay_seconds,
            )?;
            Ok(state.enqueue(outgoing, Instant::now()))
        })?;

        self.changed.notify_waiters();
        Ok(receipt)
    }

    async fn send_batch(
        &self,
        queue: &QueueRef,
        entries: &[BatchEntry],
    ) -> Result<BatchSendResult, QueueError> {
        if entries.is_empty() || entries.len() > MAX_BATCH_ENTRIES {
            return Err(ValidationError::OutOfRange {
                field: "entries".to_string(),
                message: format!(
                    "batch must hold 1 to {} entries, got {}",
                    MAX_BATCH_ENTRIES,
                    entries.len()
                ),
            }
            .into());
        }

        let distinct: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        if distinct.len() != entries.len() {
            return Err(ValidationError::InvalidFormat {
                field: "entries".to_string(),
                message: "batch entry ids must be distinct".to_string(),
            }
            .into());
        }

        let total: usize = entries.iter().map(|e| e.body.len()).sum();
        if total > MAX_PAYLOAD_BYTES {
            return Err(QueueError::PayloadTooLarge {
                size: Some(total),
                max_size: MAX_PAYLOAD_BYTES,
            });
        }

        let result = self.with_queue(queue, |state| {
            let now = Instant::now();
            let mut result = BatchSendResult::default();

            for entry in entries {
                let outgoing = OutgoingMessage::validate(
                    state.kind,
                    &entry.body,
                    &entry.attributes,
                    entry.group_id.as_deref(),
                    entry.deduplication_id.as_deref(),
                    entry.delay_seconds,
                );

                match outgoing {
                    Ok(outgoing) => {
                        let receipt = state.enqueue(outgoing, now);
                        result.successful.push(BatchResultEntry {
                            id: entry.id.clone(),
                            message_id: receipt.message_id,
                        });
                    }
                    Err(e) => result.failed.push(BatchResultError {
                        id: entry.id.clone(),
                        code: "InvalidParameterValue".to_string(),
                        message: e.to_string(),
                        sender_fault: true,
                    }),
                }
            }

            Ok(result)
        })?;

        self.changed.notify_waiters();
        Ok(result)
    }

    async fn resolve_url(&self, name: &str) -> Result<QueueRef, QueueError> {
        let reference = QueueRef::new(name)?;
        if lock(&self.queues).contains_key(reference.name()) {
            Ok(QueueRef::new(Self::url_for(reference.name()))?)
        } else {
            Err(Self::not_found(&reference))
        }
    }

    async fn get_attributes(
        &self,
        queue: &QueueRef,
        names: &[String],
    ) -> Result<HashMap<String, String>, QueueError> {
        let visibility = self.default_visibility.as_secs();
        self.with_queue(queue, |state| {
            state.reclaim_expired(Instant::now());

            let available = [
                (
                    QUEUE_ARN_ATTRIBUTE,
                    format!("arn:aws:sqs:memory:{}:{}", ACCOUNT_ID, queue.name()),
                ),
                (
                    "ApproximateNumberOfMessages",
                    state.messages.len().to_string(),
                ),
                (
                    "ApproximateNumberOfMessagesNotVisible",
                    state.leases.len().to_string(),
                ),
                ("VisibilityTimeout", visibility.to_string()),
                (
                    "FifoQueue",
                    (state.kind == QueueKind::Ordered).to_string(),
                ),
            ];

            Ok(available
                .into_iter()
                .filter(|(name, _)| wanted(names, name))
                .map(|(name, value)| (name.to_string(), value))
                .collect())
        })
    }
}

// ============================================================================
// InMemoryListStore
// ============================================================================

/// In-memory [`ListStore`]
#[derive(Default)]
pub struct InMemoryListStore {
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    pushed: Notify,
}

impl InMemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of values waiting in the list at `key`
    pub fn len(&self, key: &str) -> usize {
        lock(&self.lists).get(key).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }

    fn try_pop(&self, keys: &[String]) -> Option<(String, String)> {
        let mut lists = lock(&self.lists);
        keys.iter().find_map(|key| {
            lists
                .get_mut(key)
                .and_then(VecDeque::pop_back)
                .map(|value| (key.clone(), value))
        })
    }
}

#[async_trait]
impl ListStore for InMemoryListStore {
    async fn push_left(&self, key: &str, value: &str) -> Result<(), QueueError> {
        lock(&self.lists)
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn pop_right_blocking(&self, keys: &[String]) -> Result<(String, String), QueueError> {
        loop {
            let pushed = self.pushed.notified();
            tokio::pin!(pushed);
            pushed.as_mut().enable();

            if let Some(popped) = self.try_pop(keys) {
                return Ok(popped);
            }

            pushed.await;
        }
    }
}
