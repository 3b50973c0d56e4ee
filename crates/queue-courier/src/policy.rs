//! Queue type policy.
//!
//! Centralizes the Standard vs Ordered (FIFO) distinction:
//! - Classification is structural: an ordered queue's identifier ends in `.fifo`
//! - Ordered queues require a group id and accept a deduplication id
//! - Standard queues reject both, but accept a bounded delivery delay

use crate::error::ValidationError;
use crate::message::QueueRef;
use serde::{Deserialize, Serialize};

/// Identifier suffix marking an ordered queue.
///
/// Only a trailing suffix counts: an identifier that contains `.fifo`
/// anywhere else, such as `orders.fifo-archive`, is a standard queue.
pub const ORDERED_QUEUE_SUFFIX: &str = ".fifo";

/// Queue variant, derived from the queue identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueKind {
    /// Unordered, at-least-once, possibly duplicate delivery
    Standard,
    /// Ordered within a message group, with deduplication
    Ordered,
}

impl QueueKind {
    /// Label used in log fields and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Ordered => "ordered",
        }
    }
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queue reference together with its kind.
///
/// The kind is computed once from the identifier and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Queue {
    reference: QueueRef,
    kind: QueueKind,
}

impl Queue {
    pub fn new(reference: QueueRef) -> Self {
        let kind = classify(&reference);
        Self { reference, kind }
    }

    /// Parse and classify an identifier in one step
    pub fn parse(identifier: &str) -> Result<Self, ValidationError> {
        Ok(Self::new(QueueRef::new(identifier)?))
    }

    pub fn reference(&self) -> &QueueRef {
        &self.reference
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn is_ordered(&self) -> bool {
        self.kind == QueueKind::Ordered
    }
}

impl std::fmt::Display for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reference)
    }
}

/// Exclusive bounds for delivery delay on standard single sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayBounds {
    /// Exclusive lower bound in seconds
    pub min_seconds: u32,
    /// Exclusive upper bound in seconds
    pub max_seconds: u32,
}

impl Default for DelayBounds {
    fn default() -> Self {
        Self {
            min_seconds: 0,
            max_seconds: 300,
        }
    }
}

impl DelayBounds {
    /// Check whether a delay lies strictly inside the bounds
    pub fn contains(&self, delay_seconds: u32) -> bool {
        self.min_seconds < delay_seconds && delay_seconds < self.max_seconds
    }
}

/// Classify a queue identifier as standard or ordered
pub fn classify(queue: &QueueRef) -> QueueKind {
    if queue
        .as_str()
        .trim_end_matches('/')
        .ends_with(ORDERED_QUEUE_SUFFIX)
    {
        QueueKind::Ordered
    } else {
        QueueKind::Standard
    }
}

/// Validate publish parameters against the queue kind.
///
/// Empty strings count as absent, matching what the service would accept.
pub fn validate(
    kind: QueueKind,
    group_id: Option<&str>,
    deduplication_id: Option<&str>,
) -> Result<(), ValidationError> {
    let has_group = group_id.is_some_and(|g| !g.is_empty());
    let has_dedup = deduplication_id.is_some_and(|d| !d.is_empty());

    match kind {
        QueueKind::Ordered if !has_group => Err(ValidationError::Required {
            field: "group_id".to_string(),
            context: "ordered queue publish".to_string(),
        }),
        QueueKind::Standard if has_group || has_dedup => Err(ValidationError::NotAllowed {
            fields: "group_id and deduplication_id".to_string(),
            context: "standard queue publish".to_string(),
        }),
        _ => Ok(()),
    }
}

/// Delay to attach to a single send, if any.
///
/// Only standard queues take a per-message delay, and only strictly inside
/// the bounds; anything else is silently dropped.
pub fn delay_applies(
    kind: QueueKind,
    delay_seconds: Option<u32>,
    bounds: DelayBounds,
) -> Option<u32> {
    match (kind, delay_seconds) {
        (QueueKind::Standard, Some(delay)) if bounds.contains(delay) => Some(delay),
        _ => None,
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
