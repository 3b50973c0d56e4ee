//! # Queue-Courier CLI
//!
//! Command-line host for the queue-courier engine.
//!
//! This module provides CLI commands for:
//! - Running a consumer loop against an SQS queue
//! - Publishing a single message
//! - Looking up a queue ARN
//! - Producing to and consuming from a Redis list
//! - Showing the resolved configuration

use clap::{Parser, Subcommand};
use queue_courier::providers::{RedisListStore, SqsQueueService};
use queue_courier::{
    shutdown_channel, ConfigurationError, CourierConfig, ProducerConsumerQueue, PublishRequest,
    QueueConsumerLoop, QueueError, QueuePublisher, QueueService, SendResponse, ShutdownSignal,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// CLI Structure
// ============================================================================

/// Queue-Courier CLI - queue-backed producer/consumer engine
#[derive(Parser, Debug)]
#[command(name = "queue-courier")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Publish to and consume from SQS queues and Redis lists")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "QUEUE_COURIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level, used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a consumer loop that logs every message body
    Consume {
        /// Queue name or URL
        #[arg(short, long)]
        queue: String,
    },

    /// Publish a single message
    Publish {
        /// Queue name or URL
        #[arg(short, long)]
        queue: String,

        /// Message body
        #[arg(short, long)]
        body: String,

        /// Message group (ordered queues only)
        #[arg(long)]
        group_id: Option<String>,

        /// Deduplication id (ordered queues only)
        #[arg(long)]
        deduplication_id: Option<String>,

        /// Delivery delay in seconds (standard queues only)
        #[arg(long)]
        delay_seconds: Option<u32>,

        /// Override the configured retry count
        #[arg(long)]
        max_retries: Option<u32>,
    },

    /// Print the ARN of a queue
    QueueArn {
        /// Queue name
        #[arg(short, long)]
        queue: String,
    },

    /// Push a payload onto a Redis list
    ListProduce {
        /// List key
        #[arg(short, long)]
        key: String,

        /// Payload
        #[arg(short, long)]
        body: String,
    },

    /// Pop from a Redis list and log every payload
    ListConsume {
        /// List key
        #[arg(short, long)]
        key: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Print the resolved configuration as JSON
    Show,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Publish to '{queue}' failed after exhausting retries")]
    PublishFailed { queue: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Logging setup failed: {message}")]
    Logging { message: String },

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Queue(QueueError::ConfigurationError(_)) => 1,
            Self::Queue(e) if e.is_connection_error() => 2,
            Self::Queue(_) | Self::PublishFailed { .. } => 3,
            Self::InvalidArgument { .. } => 4,
            Self::Logging { .. } | Self::Output(_) => 5,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    run(Cli::parse()).await
}

/// Execute already-parsed arguments
pub async fn run(cli: Cli) -> Result<(), CliError> {
    initialize_logging(&cli)?;

    let config = CourierConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Consume { queue } => execute_consume_command(&queue, &config).await,
        Commands::Publish {
            queue,
            body,
            group_id,
            deduplication_id,
            delay_seconds,
            max_retries,
        } => {
            let mut request = PublishRequest::single(body);
            if let Some(group_id) = group_id {
                request = request.with_group_id(group_id);
            }
            if let Some(deduplication_id) = deduplication_id {
                request = request.with_deduplication_id(deduplication_id);
            }
            if let Some(delay_seconds) = delay_seconds {
                request = request.with_delay_seconds(delay_seconds);
            }
            if let Some(max_retries) = max_retries {
                request = request.with_max_retries(max_retries);
            }
            execute_publish_command(&queue, request, &config).await
        }
        Commands::QueueArn { queue } => execute_queue_arn_command(&queue, &config).await,
        Commands::ListProduce { key, body } => {
            execute_list_produce_command(&key, &body, &config).await
        }
        Commands::ListConsume { key } => execute_list_consume_command(&key, &config).await,
        Commands::Config { action } => match action {
            ConfigCommands::Show => {
                println!("{}", render_config(&config)?);
                Ok(())
            }
        },
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Build the log filter: `RUST_LOG` wins, otherwise `--log-level`
pub fn log_filter(log_level: &str) -> Result<EnvFilter, CliError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(log_level).map_err(|e| CliError::InvalidArgument {
        arg: "log-level".to_string(),
        message: e.to_string(),
    })
}

/// Initialize logging based on CLI arguments.
///
/// Logs go to stderr; stdout carries command output only.
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = log_filter(&cli.log_level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if cli.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

/// Resolved configuration as pretty JSON. The SQS secret is never serialized.
pub fn render_config(config: &CourierConfig) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(config)?)
}

/// Shutdown signal fired by Ctrl-C
fn shutdown_on_ctrl_c() -> ShutdownSignal {
    let (trigger, signal) = shutdown_channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                trigger.trigger();
            }
            Err(e) => error!(error = %e, "Unable to listen for Ctrl-C"),
        }
    });
    signal
}

fn sqs_service(config: &CourierConfig) -> Result<Arc<dyn QueueService>, CliError> {
    Ok(Arc::new(SqsQueueService::new(&config.sqs)?))
}

async fn log_body(body: String) -> anyhow::Result<()> {
    info!(body = %body, "Received message");
    Ok(())
}

/// Execute consume command
async fn execute_consume_command(queue: &str, config: &CourierConfig) -> Result<(), CliError> {
    let service = sqs_service(config)?;
    let consumer = QueueConsumerLoop::connect(service, queue, config.consumer.clone()).await?;

    consumer.subscribe_all(log_body, shutdown_on_ctrl_c()).await;
    Ok(())
}

/// Execute publish command
async fn execute_publish_command(
    queue: &str,
    request: PublishRequest,
    config: &CourierConfig,
) -> Result<(), CliError> {
    let service = sqs_service(config)?;
    let publisher = QueuePublisher::connect(service, queue, config.publisher.clone()).await?;

    match publisher.publish_with_response(request).await? {
        Some(SendResponse::Single(receipt)) => {
            let output = serde_json::json!({
                "queue": queue,
                "message_id": receipt.message_id.as_str(),
                "sequence_number": receipt.sequence_number,
            });
            println!("{}", output);
            Ok(())
        }
        Some(SendResponse::Batch(result)) => {
            println!(
                "{}",
                serde_json::json!({
                    "queue": queue,
                    "successful": result.successful.len(),
                    "failed": result.failed.len(),
                })
            );
            Ok(())
        }
        None => Err(CliError::PublishFailed {
            queue: queue.to_string(),
        }),
    }
}

/// Execute queue-arn command
async fn execute_queue_arn_command(queue: &str, config: &CourierConfig) -> Result<(), CliError> {
    let service = sqs_service(config)?;
    println!("{}", service.queue_arn(queue).await?);
    Ok(())
}

/// Execute list-produce command
async fn execute_list_produce_command(
    key: &str,
    body: &str,
    config: &CourierConfig,
) -> Result<(), CliError> {
    let store = RedisListStore::connect(&config.redis).await?;
    ProducerConsumerQueue::new(Arc::new(store), key, config.producer_consumer.clone())
        .produce(body)
        .await;
    Ok(())
}

/// Execute list-consume command
async fn execute_list_consume_command(key: &str, config: &CourierConfig) -> Result<(), CliError> {
    let store = RedisListStore::connect(&config.redis).await?;
    let queue = ProducerConsumerQueue::new(Arc::new(store), key, config.producer_consumer.clone());

    queue.consume(log_body, shutdown_on_ctrl_c()).await;
    Ok(())
}
