//! Common test utilities for queue-courier integration tests
//!
//! This module provides:
//! - In-memory service setup
//! - A recording handler with scripted failures
//! - Polling helpers for asynchronous assertions

use queue_courier::providers::InMemoryQueueService;
use queue_courier::client::HandlerFuture;
use queue_courier::{ConsumptionConfig, QueueService};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Fixtures
// ============================================================================

/// In-memory service with the named queues already created
#[allow(dead_code)]
pub fn service_with_queues(names: &[&str]) -> Arc<InMemoryQueueService> {
    let service = Arc::new(InMemoryQueueService::new());
    for name in names {
        service.create_queue(name).unwrap();
    }
    service
}

/// Consumer settings for tests: one second long polls and leases
#[allow(dead_code)]
pub fn fast_consumption(max_messages: u32) -> ConsumptionConfig {
    ConsumptionConfig {
        max_messages,
        wait_time_seconds: 1,
        visibility_timeout_seconds: Some(1),
        ..ConsumptionConfig::default()
    }
}

/// Visible plus in-flight message counts for a queue
#[allow(dead_code)]
pub async fn queue_depth(service: &InMemoryQueueService, name: &str) -> (usize, usize) {
    let queue = service.resolve_url(name).await.unwrap();
    let attributes = service
        .get_attributes(
            &queue,
            &[
                "ApproximateNumberOfMessages".to_string(),
                "ApproximateNumberOfMessagesNotVisible".to_string(),
            ],
        )
        .await
        .unwrap();

    (
        attributes["ApproximateNumberOfMessages"].parse().unwrap(),
        attributes["ApproximateNumberOfMessagesNotVisible"]
            .parse()
            .unwrap(),
    )
}

// ============================================================================
// Recording Handler
// ============================================================================

/// What the handler should do with a body on a given attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Outcome {
    Succeed,
    Fail,
    Panic,
}

type Script = Arc<dyn Fn(&str, u32) -> Outcome + Send + Sync>;

/// Handler that records every delivery and follows a script
#[derive(Clone)]
pub struct RecordingHandler {
    deliveries: Arc<Mutex<Vec<String>>>,
    completed: Arc<Mutex<Vec<String>>>,
    attempts: Arc<Mutex<HashMap<String, u32>>>,
    script: Script,
}

#[allow(dead_code)]
impl RecordingHandler {
    /// Handler that accepts everything
    pub fn accepting() -> Self {
        Self::scripted(|_, _| Outcome::Succeed)
    }

    /// Handler whose outcome depends on the body and the attempt number (1-based)
    pub fn scripted(script: impl Fn(&str, u32) -> Outcome + Send + Sync + 'static) -> Self {
        Self {
            deliveries: Arc::new(Mutex::new(Vec::new())),
            completed: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(Mutex::new(HashMap::new())),
            script: Arc::new(script),
        }
    }

    /// Every body delivered, in delivery order
    pub fn deliveries(&self) -> Vec<String> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Bodies whose handler returned success, in completion order
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn attempts(&self, body: &str) -> u32 {
        self.attempts.lock().unwrap().get(body).copied().unwrap_or(0)
    }

    /// Handler closure that records into this recorder
    pub fn handler(&self) -> impl Fn(String) -> HandlerFuture + Send + Sync + 'static {
        let recorder = self.clone();
        move |body: String| -> HandlerFuture {
            let recorder = recorder.clone();
            Box::pin(async move {
                let attempt = {
                    let mut attempts = recorder.attempts.lock().unwrap();
                    let count = attempts.entry(body.clone()).or_insert(0);
                    *count += 1;
                    *count
                };
                recorder.deliveries.lock().unwrap().push(body.clone());

                match (recorder.script)(&body, attempt) {
                    Outcome::Succeed => {
                        recorder.completed.lock().unwrap().push(body);
                        Ok(())
                    }
                    Outcome::Fail => Err(anyhow::anyhow!("rejected {} on attempt {}", body, attempt)),
                    Outcome::Panic => panic!("handler crashed on {}", body),
                }
            })
        }
    }
}

// ============================================================================
// Polling Helpers
// ============================================================================

/// Wait until `condition` holds, failing the test after `limit`
pub async fn wait_until(limit: Duration, condition: impl Fn() -> bool) {
    tokio::time::timeout(limit, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
