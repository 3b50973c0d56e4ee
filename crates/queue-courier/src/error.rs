//! Error types for queue operations.

use thiserror::Error;

/// Comprehensive error type for all queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Operation timed out: {message}")]
    Timeout { message: String },

    #[error("Payload size exceeds the service limit of {max_size} bytes")]
    PayloadTooLarge { size: Option<usize>, max_size: usize },

    #[error("Receipt handle is invalid or its lease has expired: {receipt}")]
    InvalidAckToken { receipt: String },

    #[error("Provider error ({provider}): {code} - {message}")]
    ProviderError {
        provider: String,
        code: String,
        message: String,
    },

    #[error("Serialization failed: {0}")]
    SerializationError(#[from] SerializationError),

    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),
}

impl QueueError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::QueueNotFound { .. } => false,
            Self::ConnectionFailed { .. } => true,
            Self::AuthenticationFailed { .. } => false,
            Self::Timeout { .. } => true,
            Self::PayloadTooLarge { .. } => false,
            Self::InvalidAckToken { .. } => false,
            Self::ProviderError { .. } => true, // Provider-specific errors are usually transient
            Self::SerializationError(_) => false,
            Self::ConfigurationError(_) => false,
            Self::ValidationError(_) => false,
        }
    }

    /// Check if error must abort a publish retry loop instead of being retried.
    ///
    /// Only the service's hard payload limit aborts. Publish parameters are
    /// validated before the first attempt, so a validation error seen here
    /// came from the service and is retried like any other rejection.
    pub fn aborts_publish(&self) -> bool {
        matches!(self, Self::PayloadTooLarge { .. })
    }

    /// Check if error means the queue (or its address) could not be resolved
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::QueueNotFound { .. }
                | Self::ConnectionFailed { .. }
                | Self::AuthenticationFailed { .. }
        )
    }
}

/// Errors while decoding service responses
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("XML parsing failed: {message}")]
    Xml { message: String },

    #[error("Response is missing element '{element}'")]
    MissingElement { element: String },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required parameter {field} for {context}")]
    Required { field: String, context: String },

    #[error("Parameters {fields} not allowed for {context}")]
    NotAllowed { fields: String, context: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
