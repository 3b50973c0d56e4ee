//! Configuration for queue clients, loops and publishers.
//!
//! Sources, applied in order (later sources override earlier ones):
//!  1. `config/queue-courier.{yaml,toml,json}`: optional deployment-local file
//!  2. An explicit file path, required when given
//!  3. Environment variables prefixed `QUEUE_COURIER` with a double-underscore
//!     separator, e.g. `QUEUE_COURIER__SQS__REGION=eu-west-1`
//!
//! Every field carries a serde default, so an unconfigured environment still
//! produces a valid configuration.

use crate::error::ConfigurationError;
use crate::policy::DelayBounds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "QUEUE_COURIER";

/// Deployment-local configuration file, extension resolved by the loader
pub const DEFAULT_CONFIG_FILE: &str = "config/queue-courier";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub sqs: SqsConfig,
    pub consumer: ConsumptionConfig,
    pub publisher: PublishConfig,
    pub producer_consumer: ProducerConsumerConfig,
    pub redis: RedisConfig,
}

impl CourierConfig {
    /// Load configuration from the default file, an optional explicit file
    /// and the process environment, then validate it.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigurationError> {
        Self::load_with_environment(
            explicit_path,
            config::Environment::with_prefix(ENV_PREFIX).separator("__"),
        )
    }

    /// Same as [`CourierConfig::load`] with a caller-supplied environment source
    pub fn load_with_environment(
        explicit_path: Option<&Path>,
        environment: config::Environment,
    ) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false));

        if let Some(path) = explicit_path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let loaded = builder
            .add_source(environment)
            .build()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        let config: Self = loaded
            .try_deserialize()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot produce a working client or loop
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.sqs.validate()?;
        self.consumer.validate()?;
        self.publisher.validate()?;
        self.producer_consumer.validate()?;

        if self.redis.url.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "redis.url".to_string(),
            });
        }

        Ok(())
    }
}

// ============================================================================
// SQS client
// ============================================================================

/// AWS SQS client configuration
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqsConfig {
    pub region: String,
    /// Overrides the regional endpoint (LocalStack, ElasticMQ, tests)
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
    /// Connection pool size per host
    pub max_connections: usize,
    pub connect_timeout_seconds: u64,
    /// Read timeout; must exceed the longest long-poll wait
    pub read_timeout_seconds: u64,
}

impl Default for SqsConfig {
    fn default() -> Self {
        Self {
            region: "ap-south-1".to_string(),
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            max_connections: 10,
            connect_timeout_seconds: 10,
            read_timeout_seconds: 30,
        }
    }
}

impl SqsConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.region.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "sqs.region".to_string(),
            });
        }

        if self.max_connections == 0 {
            return Err(ConfigurationError::Invalid {
                message: "sqs.max_connections must be at least 1".to_string(),
            });
        }

        if let Some(endpoint) = &self.endpoint_url {
            url::Url::parse(endpoint).map_err(|e| ConfigurationError::Invalid {
                message: format!("sqs.endpoint_url '{}' is not a valid URL: {}", endpoint, e),
            })?;
        }

        Ok(())
    }
}

impl fmt::Debug for SqsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsConfig")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .field("read_timeout_seconds", &self.read_timeout_seconds)
            .finish()
    }
}

// ============================================================================
// Consumption
// ============================================================================

/// Poll parameters for the consumer loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumptionConfig {
    pub max_messages: u32,
    /// Long-poll duration
    pub wait_time_seconds: u32,
    /// Lease duration; `None` uses the queue's default
    pub visibility_timeout_seconds: Option<u32>,
    pub attribute_names: Vec<String>,
    pub message_attribute_names: Vec<String>,
    /// Pause after a failed poll; zero polls again immediately
    pub poll_error_backoff_ms: u64,
}

impl Default for ConsumptionConfig {
    fn default() -> Self {
        Self {
            max_messages: 1,
            wait_time_seconds: 5,
            visibility_timeout_seconds: None,
            attribute_names: vec!["All".to_string()],
            message_attribute_names: vec!["All".to_string()],
            poll_error_backoff_ms: 0,
        }
    }
}

impl ConsumptionConfig {
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(u64::from(self.wait_time_seconds))
    }

    pub fn poll_error_backoff(&self) -> Duration {
        Duration::from_millis(self.poll_error_backoff_ms)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if !(1..=10).contains(&self.max_messages) {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "consumer.max_messages must be between 1 and 10, got {}",
                    self.max_messages
                ),
            });
        }

        if self.wait_time_seconds > 20 {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "consumer.wait_time_seconds must be at most 20, got {}",
                    self.wait_time_seconds
                ),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Publishing
// ============================================================================

/// Publisher retry and delay settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Total send attempts per publish
    pub max_retries: u32,
    pub delay_bounds: DelayBounds,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_bounds: DelayBounds::default(),
        }
    }
}

impl PublishConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_retries == 0 {
            return Err(ConfigurationError::Invalid {
                message: "publisher.max_retries must be at least 1".to_string(),
            });
        }

        if self.delay_bounds.min_seconds >= self.delay_bounds.max_seconds {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "publisher.delay_bounds min ({}) must be below max ({})",
                    self.delay_bounds.min_seconds, self.delay_bounds.max_seconds
                ),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Producer / consumer lists
// ============================================================================

/// Settings for list-backed producer/consumer queues
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConsumerConfig {
    /// Pause after each dispatch before the next pop
    pub wait_between_consume_ms: u64,
    /// Upper bound on concurrently running handlers
    pub max_in_flight: usize,
}

impl Default for ProducerConsumerConfig {
    fn default() -> Self {
        Self {
            wait_between_consume_ms: 50,
            max_in_flight: 64,
        }
    }
}

impl ProducerConsumerConfig {
    pub fn wait_between_consume(&self) -> Duration {
        Duration::from_millis(self.wait_between_consume_ms)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_in_flight == 0 {
            return Err(ConfigurationError::Invalid {
                message: "producer_consumer.max_in_flight must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Redis connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
