//! Redis list store.
//!
//! `push_left` is `LPUSH` and `pop_right_blocking` is `BRPOP key... 0`.
//! Blocking pops run on their own connection so a waiting `BRPOP` never
//! holds up pushes issued through the shared one.

use crate::client::ListStore;
use crate::config::RedisConfig;
use crate::error::{ConfigurationError, QueueError};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, ErrorKind, RedisError};
use tracing::info;

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;

const PROVIDER: &str = "Redis";

/// [`ListStore`] backed by Redis lists
pub struct RedisListStore {
    commands: MultiplexedConnection,
    blocking: MultiplexedConnection,
}

impl RedisListStore {
    /// Open both connections to the server at `config.url`
    pub async fn connect(config: &RedisConfig) -> Result<Self, QueueError> {
        let client = Client::open(config.url.as_str()).map_err(map_redis_error)?;
        let commands = client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)?;
        let blocking = client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)?;

        info!(url = %redacted_url(&config.url), "Connected to Redis");
        Ok(Self { commands, blocking })
    }
}

impl std::fmt::Debug for RedisListStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisListStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl ListStore for RedisListStore {
    async fn push_left(&self, key: &str, value: &str) -> Result<(), QueueError> {
        let mut conn = self.commands.clone();
        let _length: i64 = conn.lpush(key, value).await.map_err(map_redis_error)?;
        Ok(())
    }

    async fn pop_right_blocking(&self, keys: &[String]) -> Result<(String, String), QueueError> {
        let mut conn = self.blocking.clone();
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(keys)
            .arg(0)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        // Only reachable if the server gives up on an unbounded wait
        popped.ok_or_else(|| QueueError::Timeout {
            message: format!("BRPOP on {:?} returned no value", keys),
        })
    }
}

/// Translate a Redis client error into the queue error taxonomy
pub(crate) fn map_redis_error(error: RedisError) -> QueueError {
    if error.is_timeout() {
        return QueueError::Timeout {
            message: error.to_string(),
        };
    }

    if error.is_io_error() || error.is_connection_refusal() || error.is_connection_dropped() {
        return QueueError::ConnectionFailed {
            message: error.to_string(),
        };
    }

    match error.kind() {
        ErrorKind::AuthenticationFailed => QueueError::AuthenticationFailed {
            message: error.to_string(),
        },
        ErrorKind::InvalidClientConfig => ConfigurationError::Invalid {
            message: format!("redis: {}", error),
        }
        .into(),
        _ => QueueError::ProviderError {
            provider: PROVIDER.to_string(),
            code: error.code().unwrap_or("ERR").to_string(),
            message: error.to_string(),
        },
    }
}

/// Strip any password from a connection URL before logging it
fn redacted_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<invalid url>".to_string(),
    }
}
