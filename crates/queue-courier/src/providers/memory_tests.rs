//! Tests for the in-memory queue service and list store.

use super::*;
use crate::message::MessageAttribute;
use tokio_test::{assert_pending, assert_ready, task};

fn consumption(max_messages: u32, wait_time_seconds: u32) -> ConsumptionConfig {
    ConsumptionConfig {
        max_messages,
        wait_time_seconds,
        visibility_timeout_seconds: None,
        attribute_names: vec!["All".to_string()],
        message_attribute_names: vec!["All".to_string()],
        poll_error_backoff_ms: 0,
    }
}

fn body(text: &str) -> SendRequest {
    SendRequest {
        body: text.to_string(),
        ..Default::default()
    }
}

fn ordered(text: &str, group: &str) -> SendRequest {
    SendRequest {
        body: text.to_string(),
        group_id: Some(group.to_string()),
        ..Default::default()
    }
}

fn bodies(messages: &[ReceivedMessage]) -> Vec<&str> {
    messages.iter().map(|m| m.body.as_str()).collect()
}

// ============================================================================
// Queue Management Tests
// ============================================================================

mod queue_management {
    use super::*;

    #[tokio::test]
    async fn test_create_queue_returns_url_and_is_idempotent() {
        let service = InMemoryQueueService::new();

        let first = service.create_queue("orders").unwrap();
        let second = service.create_queue("orders").unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first.as_str(),
            "https://sqs.memory.local/000000000000/orders"
        );
    }

    #[tokio::test]
    async fn test_resolve_url_requires_existing_queue() {
        let service = InMemoryQueueService::new();
        service.create_queue("orders").unwrap();

        let resolved = service.resolve_url("orders").await.unwrap();
        assert_eq!(resolved.name(), "orders");

        let missing = service.resolve_url("refunds").await.unwrap_err();
        assert!(matches!(missing, QueueError::QueueNotFound { ref queue_name } if queue_name == "refunds"));
    }

    #[tokio::test]
    async fn test_operations_on_unknown_queue_fail() {
        let service = InMemoryQueueService::new();
        let queue = QueueRef::new("nowhere").unwrap();

        assert!(matches!(
            service.send(&queue, &body("x")).await,
            Err(QueueError::QueueNotFound { .. })
        ));
        assert!(matches!(
            service.receive(&queue, &consumption(1, 0)).await,
            Err(QueueError::QueueNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_queue_arn_and_attributes() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("events.fifo").unwrap();
        service.send(&queue, &ordered("a", "g")).await.unwrap();

        let arn = service.queue_arn("events.fifo").await.unwrap();
        assert_eq!(arn, "arn:aws:sqs:memory:000000000000:events.fifo");

        let attributes = service
            .get_attributes(&queue, &["All".to_string()])
            .await
            .unwrap();
        assert_eq!(attributes["FifoQueue"], "true");
        assert_eq!(attributes["ApproximateNumberOfMessages"], "1");
        assert_eq!(attributes["ApproximateNumberOfMessagesNotVisible"], "0");
        assert_eq!(attributes["VisibilityTimeout"], "30");
    }

    #[tokio::test]
    async fn test_get_attributes_filters_by_name() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();

        let attributes = service
            .get_attributes(&queue, &["FifoQueue".to_string()])
            .await
            .unwrap();

        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes["FifoQueue"], "false");
    }
}

// ============================================================================
// Lease Tests
// ============================================================================

mod lease_tests {
    use super::*;

    #[tokio::test]
    async fn test_received_message_is_hidden_until_deleted() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();
        service.send(&queue, &body("first")).await.unwrap();

        let received = service.receive(&queue, &consumption(10, 0)).await.unwrap();
        assert_eq!(bodies(&received), vec!["first"]);
        assert_eq!(received[0].receive_count(), Some(1));

        let again = service.receive(&queue, &consumption(10, 0)).await.unwrap();
        assert!(again.is_empty());

        service.delete(&queue, &received[0].ack_token).await.unwrap();
        let attributes = service
            .get_attributes(&queue, &["All".to_string()])
            .await
            .unwrap();
        assert_eq!(attributes["ApproximateNumberOfMessages"], "0");
        assert_eq!(attributes["ApproximateNumberOfMessagesNotVisible"], "0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacknowledged_message_is_redelivered_after_lease() {
        let service = InMemoryQueueService::with_default_visibility(Duration::from_secs(5));
        let queue = service.create_queue("orders").unwrap();
        service.send(&queue, &body("retry-me")).await.unwrap();

        let first = service.receive(&queue, &consumption(1, 0)).await.unwrap();
        assert_eq!(first[0].receive_count(), Some(1));

        tokio::time::advance(Duration::from_secs(6)).await;

        let second = service.receive(&queue, &consumption(1, 0)).await.unwrap();
        assert_eq!(bodies(&second), vec!["retry-me"]);
        assert_eq!(second[0].receive_count(), Some(2));
        assert_eq!(first[0].message_id, second[0].message_id);
        assert_ne!(first[0].ack_token, second[0].ack_token);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_with_expired_receipt_is_rejected() {
        let service = InMemoryQueueService::with_default_visibility(Duration::from_secs(5));
        let queue = service.create_queue("orders").unwrap();
        service.send(&queue, &body("slow")).await.unwrap();

        let received = service.receive(&queue, &consumption(1, 0)).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;

        let result = service.delete(&queue, &received[0].ack_token).await;
        assert!(matches!(result, Err(QueueError::InvalidAckToken { .. })));
    }

    #[tokio::test]
    async fn test_delete_with_unknown_receipt_is_rejected() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();

        let result = service.delete(&queue, &AckToken::new("bogus")).await;
        assert!(matches!(result, Err(QueueError::InvalidAckToken { ref receipt }) if receipt == "bogus"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_visibility_overrides_default() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();
        service.send(&queue, &body("short")).await.unwrap();

        let mut config = consumption(1, 0);
        config.visibility_timeout_seconds = Some(2);
        service.receive(&queue, &config).await.unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;
        let again = service.receive(&queue, &config).await.unwrap();
        assert_eq!(bodies(&again), vec!["short"]);
    }

    #[tokio::test]
    async fn test_receive_respects_max_messages_and_order() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();
        for text in ["1", "2", "3"] {
            service.send(&queue, &body(text)).await.unwrap();
        }

        let first = service.receive(&queue, &consumption(2, 0)).await.unwrap();
        let second = service.receive(&queue, &consumption(2, 0)).await.unwrap();

        assert_eq!(bodies(&first), vec!["1", "2"]);
        assert_eq!(bodies(&second), vec!["3"]);
    }
}

// ============================================================================
// Long Polling Tests
// ============================================================================

mod long_polling {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_returns_after_wait_time() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();

        let started = Instant::now();
        let received = service.receive(&queue, &consumption(1, 20)).await.unwrap();

        assert!(received.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_long_poll_wakes_on_send() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();
        let config = consumption(1, 20);

        let mut poll = task::spawn(service.receive(&queue, &config));
        assert_pending!(poll.poll());

        service.send(&queue, &body("arrived")).await.unwrap();
        assert!(poll.is_woken());

        let received = assert_ready!(poll.poll()).unwrap();
        assert_eq!(bodies(&received), vec!["arrived"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_poll_picks_up_delayed_message() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();
        let mut request = body("later");
        request.delay_seconds = Some(5);
        service.send(&queue, &request).await.unwrap();

        let immediate = service.receive(&queue, &consumption(1, 0)).await.unwrap();
        assert!(immediate.is_empty());

        let started = Instant::now();
        let received = service.receive(&queue, &consumption(1, 20)).await.unwrap();
        assert_eq!(bodies(&received), vec!["later"]);
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(20));
    }
}

// ============================================================================
// Send Validation Tests
// ============================================================================

mod send_validation {
    use super::*;

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();

        let result = service
            .send(&queue, &body(&"x".repeat(MAX_PAYLOAD_BYTES + 1)))
            .await;

        assert!(matches!(
            result,
            Err(QueueError::PayloadTooLarge { size: Some(size), .. }) if size == MAX_PAYLOAD_BYTES + 1
        ));
    }

    #[tokio::test]
    async fn test_standard_queue_rejects_group_id() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();

        let result = service.send(&queue, &ordered("a", "g")).await;
        assert!(matches!(result, Err(QueueError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_ordered_queue_requires_group_and_rejects_delay() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("events.fifo").unwrap();

        let missing_group = service.send(&queue, &body("a")).await;
        assert!(matches!(missing_group, Err(QueueError::ValidationError(_))));

        let mut delayed = ordered("a", "g");
        delayed.delay_seconds = Some(10);
        let result = service.send(&queue, &delayed).await;
        assert!(matches!(
            result,
            Err(QueueError::ValidationError(ValidationError::NotAllowed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_delay_above_service_maximum_rejected() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();
        let mut request = body("a");
        request.delay_seconds = Some(901);

        let result = service.send(&queue, &request).await;
        assert!(matches!(
            result,
            Err(QueueError::ValidationError(ValidationError::OutOfRange { .. }))
        ));
    }

    #[tokio::test]
    async fn test_message_attributes_round_trip_with_filter() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();
        let mut request = body("a");
        request
            .attributes
            .insert("tenant".to_string(), MessageAttribute::string("acme"));
        request
            .attributes
            .insert("priority".to_string(), MessageAttribute::number(3));
        service.send(&queue, &request).await.unwrap();

        let mut config = consumption(1, 0);
        config.message_attribute_names = vec!["tenant".to_string()];
        config.attribute_names = vec!["SentTimestamp".to_string()];
        let received = service.receive(&queue, &config).await.unwrap();

        assert_eq!(received[0].message_attributes.len(), 1);
        assert_eq!(received[0].message_attributes["tenant"].string_value, "acme");
        assert!(received[0].attributes.contains_key("SentTimestamp"));
        assert!(!received[0].attributes.contains_key("ApproximateReceiveCount"));
    }
}

// ============================================================================
// Ordered Queue Tests
// ============================================================================

mod ordered_queue {
    use super::*;

    #[tokio::test]
    async fn test_group_is_blocked_while_leased() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("events.fifo").unwrap();
        service.send(&queue, &ordered("a1", "a")).await.unwrap();
        service.send(&queue, &ordered("a2", "a")).await.unwrap();
        service.send(&queue, &ordered("b1", "b")).await.unwrap();

        let first = service.receive(&queue, &consumption(1, 0)).await.unwrap();
        assert_eq!(bodies(&first), vec!["a1"]);

        // a2 waits for a1; b1 is free
        let second = service.receive(&queue, &consumption(10, 0)).await.unwrap();
        assert_eq!(bodies(&second), vec!["b1"]);

        service.delete(&queue, &first[0].ack_token).await.unwrap();
        let third = service.receive(&queue, &consumption(10, 0)).await.unwrap();
        assert_eq!(bodies(&third), vec!["a2"]);
    }

    #[tokio::test]
    async fn test_duplicate_deduplication_id_is_dropped() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("events.fifo").unwrap();
        let mut request = ordered("payment", "acct-1");
        request.deduplication_id = Some("pay-77".to_string());

        let first = service.send(&queue, &request).await.unwrap();
        let second = service.send(&queue, &request).await.unwrap();

        assert_eq!(first.message_id, second.message_id);
        let received = service.receive(&queue, &consumption(10, 0)).await.unwrap();
        assert_eq!(received.len(), 1);
    }

    #[tokio::test]
    async fn test_identical_bodies_deduplicate_without_explicit_id() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("events.fifo").unwrap();

        service.send(&queue, &ordered("same", "g")).await.unwrap();
        service.send(&queue, &ordered("same", "g")).await.unwrap();
        service.send(&queue, &ordered("different", "g")).await.unwrap();

        let attributes = service
            .get_attributes(&queue, &["ApproximateNumberOfMessages".to_string()])
            .await
            .unwrap();
        assert_eq!(attributes["ApproximateNumberOfMessages"], "2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deduplication_window_expires() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("events.fifo").unwrap();

        let first = service.send(&queue, &ordered("same", "g")).await.unwrap();
        tokio::time::advance(DEDUPLICATION_WINDOW + Duration::from_secs(1)).await;
        let second = service.send(&queue, &ordered("same", "g")).await.unwrap();

        assert_ne!(first.message_id, second.message_id);
    }

    #[tokio::test]
    async fn test_sequence_numbers_increase() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("events.fifo").unwrap();

        let first = service.send(&queue, &ordered("1", "g")).await.unwrap();
        let second = service.send(&queue, &ordered("2", "g")).await.unwrap();

        let first = first.sequence_number.unwrap();
        let second = second.sequence_number.unwrap();
        assert_eq!(first.len(), 20);
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_standard_send_has_no_sequence_number() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();

        let receipt = service.send(&queue, &body("a")).await.unwrap();
        assert!(receipt.sequence_number.is_none());
    }
}

// ============================================================================
// Batch Tests
// ============================================================================

mod batch_tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_reports_per_entry_failures() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();
        let entries = vec![
            BatchEntry::new("ok", "fine"),
            BatchEntry::new("bad", "grouped").with_group_id("g"),
            BatchEntry::new("late", "later").with_delay_seconds(1000),
        ];

        let result = service.send_batch(&queue, &entries).await.unwrap();

        assert_eq!(result.successful.len(), 1);
        assert_eq!(result.successful[0].id, "ok");
        let failed: Vec<&str> = result.failed.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(failed, vec!["bad", "late"]);
        assert!(result.failed.iter().all(|f| f.sender_fault));
    }

    #[tokio::test]
    async fn test_batch_size_limits() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();

        let empty = service.send_batch(&queue, &[]).await;
        assert!(matches!(empty, Err(QueueError::ValidationError(_))));

        let eleven: Vec<BatchEntry> = (0..11)
            .map(|i| BatchEntry::new(i.to_string(), "x"))
            .collect();
        let too_many = service.send_batch(&queue, &eleven).await;
        assert!(matches!(too_many, Err(QueueError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_batch_total_payload_limit() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();
        let half = "x".repeat(MAX_PAYLOAD_BYTES / 2 + 1);
        let entries = vec![BatchEntry::new("a", half.clone()), BatchEntry::new("b", half)];

        let result = service.send_batch(&queue, &entries).await;
        assert!(matches!(result, Err(QueueError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_batch_entry_ids_must_be_distinct() {
        let service = InMemoryQueueService::new();
        let queue = service.create_queue("orders").unwrap();
        let entries = vec![BatchEntry::new("dup", "a"), BatchEntry::new("dup", "b")];

        let result = service.send_batch(&queue, &entries).await;
        assert!(matches!(result, Err(QueueError::ValidationError(_))));
    }
}

// ============================================================================
// List Store Tests
// ============================================================================

mod list_store {
    use super::*;

    #[tokio::test]
    async fn test_push_left_pop_right_is_fifo() {
        let store = InMemoryListStore::new();
        store.push_left("jobs", "1").await.unwrap();
        store.push_left("jobs", "2").await.unwrap();

        let keys = vec!["jobs".to_string()];
        assert_eq!(
            store.pop_right_blocking(&keys).await.unwrap(),
            ("jobs".to_string(), "1".to_string())
        );
        assert_eq!(store.pop_right_blocking(&keys).await.unwrap().1, "2");
        assert!(store.is_empty("jobs"));
    }

    #[tokio::test]
    async fn test_pop_checks_keys_in_order() {
        let store = InMemoryListStore::new();
        store.push_left("low", "l").await.unwrap();
        store.push_left("high", "h").await.unwrap();

        let keys = vec!["high".to_string(), "low".to_string()];
        assert_eq!(store.pop_right_blocking(&keys).await.unwrap().0, "high");
        assert_eq!(store.pop_right_blocking(&keys).await.unwrap().0, "low");
    }

    #[tokio::test]
    async fn test_pop_blocks_until_push() {
        let store = InMemoryListStore::new();
        let keys = vec!["jobs".to_string()];

        let mut pop = task::spawn(store.pop_right_blocking(&keys));
        assert_pending!(pop.poll());

        store.push_left("other", "ignored").await.unwrap();
        assert_pending!(pop.poll());

        store.push_left("jobs", "wanted").await.unwrap();
        assert!(pop.is_woken());
        let (key, value) = assert_ready!(pop.poll()).unwrap();

        assert_eq!(key, "jobs");
        assert_eq!(value, "wanted");
        assert_eq!(store.len("other"), 1);
    }
}
