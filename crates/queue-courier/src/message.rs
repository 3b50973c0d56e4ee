//! Message types for queue operations including core domain identifiers.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Largest message body (or combined batch payload) a queue accepts
pub const MAX_PAYLOAD_BYTES: usize = 256 * 1024;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Identifier of a queue: either its name or its fully resolved URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueRef(String);

impl QueueRef {
    /// Create new queue reference with validation
    pub fn new(identifier: impl Into<String>) -> Result<Self, ValidationError> {
        let identifier = identifier.into();
        let trimmed = identifier.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Required {
                field: "queue".to_string(),
                context: "queue reference".to_string(),
            });
        }

        if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError::InvalidFormat {
                field: "queue".to_string(),
                message: "must not contain whitespace or control characters".to_string(),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Get the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Queue name: the last path segment of a URL, or the identifier itself
    pub fn name(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.0)
    }

    /// Check whether the identifier is a resolved URL rather than a bare name
    pub fn is_url(&self) -> bool {
        self.0.contains("://")
    }
}

impl std::fmt::Display for QueueRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueRef {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Service-assigned identifier of an enqueued message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self(id.to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
                context: "message".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Opaque receipt handle returned with a leased message.
///
/// Only valid for the lease that produced it; deleting with it acknowledges
/// that delivery.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AckToken(String);

impl AckToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Receipt handles are long and carry no diagnostic value
impl std::fmt::Debug for AckToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.0.chars().take(12).collect();
        write!(f, "AckToken({}...)", prefix)
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// Typed user attribute attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttribute {
    pub data_type: String,
    pub string_value: String,
}

impl MessageAttribute {
    /// String-typed attribute
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            string_value: value.into(),
        }
    }

    /// Number-typed attribute
    pub fn number(value: impl ToString) -> Self {
        Self {
            data_type: "Number".to_string(),
            string_value: value.to_string(),
        }
    }
}

/// User attributes keyed by attribute name
pub type MessageAttributes = HashMap<String, MessageAttribute>;

// ============================================================================
// Received Messages
// ============================================================================

/// A message leased from a queue by a poll
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub body: String,
    /// System attributes (e.g. `ApproximateReceiveCount`, `MessageGroupId`)
    pub attributes: HashMap<String, String>,
    pub message_attributes: MessageAttributes,
    pub ack_token: AckToken,
}

impl ReceivedMessage {
    /// Number of times the service has handed this message out, if reported
    pub fn receive_count(&self) -> Option<u32> {
        self.attributes
            .get("ApproximateReceiveCount")
            .and_then(|v| v.parse().ok())
    }
}

// ============================================================================
// Sending
// ============================================================================

/// Caller-assembled entry for a batch send, submitted as-is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub id: String,
    pub body: String,
    pub attributes: MessageAttributes,
    pub group_id: Option<String>,
    pub deduplication_id: Option<String>,
    pub delay_seconds: Option<u32>,
}

impl BatchEntry {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            attributes: HashMap::new(),
            group_id: None,
            deduplication_id: None,
            delay_seconds: None,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: MessageAttribute) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_deduplication_id(mut self, deduplication_id: impl Into<String>) -> Self {
        self.deduplication_id = Some(deduplication_id.into());
        self
    }

    pub fn with_delay_seconds(mut self, delay_seconds: u32) -> Self {
        self.delay_seconds = Some(delay_seconds);
        self
    }
}

/// A single send exactly as it goes to the service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendRequest {
    pub body: String,
    pub attributes: MessageAttributes,
    pub group_id: Option<String>,
    pub deduplication_id: Option<String>,
    pub delay_seconds: Option<u32>,
}

/// Service acknowledgement of a single send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: MessageId,
    /// Present for ordered (FIFO) queues only
    pub sequence_number: Option<String>,
}

/// Successful entry of a batch send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResultEntry {
    pub id: String,
    pub message_id: MessageId,
}

/// Rejected entry of a batch send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResultError {
    pub id: String,
    pub code: String,
    pub message: String,
    pub sender_fault: bool,
}

/// Service acknowledgement of a batch send.
///
/// A batch call may succeed while individual entries fail; the publisher
/// reports the call outcome and leaves per-entry failures to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSendResult {
    pub successful: Vec<BatchResultEntry>,
    pub failed: Vec<BatchResultError>,
}

/// Native response of a successful publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResponse {
    Single(SendReceipt),
    Batch(BatchSendResult),
}

// ============================================================================
// Publish Requests
// ============================================================================

/// What to publish: one body, or pre-built batch entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Single(String),
    Batch(Vec<BatchEntry>),
}

/// Publish request with queue-type dependent options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub payload: Payload,
    pub attributes: MessageAttributes,
    pub group_id: Option<String>,
    pub deduplication_id: Option<String>,
    pub delay_seconds: Option<u32>,
    /// Overrides the publisher's configured attempt count when non-zero
    pub max_retries: Option<u32>,
}

impl PublishRequest {
    /// Single-message publish
    pub fn single(body: impl Into<String>) -> Self {
        Self::from_payload(Payload::Single(body.into()))
    }

    /// Batch publish of pre-built entries
    pub fn batch(entries: Vec<BatchEntry>) -> Self {
        Self::from_payload(Payload::Batch(entries))
    }

    fn from_payload(payload: Payload) -> Self {
        Self {
            payload,
            attributes: HashMap::new(),
            group_id: None,
            deduplication_id: None,
            delay_seconds: None,
            max_retries: None,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: MessageAttribute) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn with_attributes(mut self, attributes: MessageAttributes) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_deduplication_id(mut self, deduplication_id: impl Into<String>) -> Self {
        self.deduplication_id = Some(deduplication_id.into());
        self
    }

    pub fn with_delay_seconds(mut self, delay_seconds: u32) -> Self {
        self.delay_seconds = Some(delay_seconds);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn is_batch(&self) -> bool {
        matches!(self.payload, Payload::Batch(_))
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
