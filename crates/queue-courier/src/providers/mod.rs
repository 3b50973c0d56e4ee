//! Queue service and list store implementations.
//!
//! - [`sqs`]: SQS query API over HTTPS with SigV4 signing
//! - [`redis`]: Redis lists
//! - [`memory`]: in-process stand-ins for tests and local development

pub mod memory;
pub mod redis;
pub mod sqs;

pub use self::memory::{InMemoryListStore, InMemoryQueueService};
pub use self::redis::RedisListStore;
pub use self::sqs::SqsQueueService;
