//! Retrying-consumer semantics on the in-process transport: ack on success,
//! bounded scheduled retries, dead-letter on exhaustion, immediate
//! dead-letter for poison payloads.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use common_events::{
    ChannelEventSource, DeadLetter, DomainEvent, EventSink, EventSource, EventType,
    InProcessBroker, StreamNames,
};
use common_observability::IndexerMetrics;
use uuid::Uuid;

use search_indexer::consumer::{EventHandler, RetryPolicy, RetryingConsumer};

struct FlakyHandler {
    fail_first: u32,
    calls: Arc<AtomicU32>,
}

#[async_trait::async_trait]
impl EventHandler for FlakyHandler {
    async fn handle(&self, _event: &DomainEvent) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.fail_first {
            bail!("transient failure #{call}");
        }
        Ok(())
    }
}

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(2),
        max_delay: Duration::from_millis(10),
    }
}

struct Pipeline {
    broker: InProcessBroker,
    names: StreamNames,
    dlq: ChannelEventSource,
    calls: Arc<AtomicU32>,
}

fn pipeline(fail_first: u32, max_retries: u32) -> Pipeline {
    let broker = InProcessBroker::new();
    let names = StreamNames::new("snapshot-test-events");
    let source = broker.subscribe(names.main());
    let dlq = broker.subscribe(&names.dead_letter());
    let calls = Arc::new(AtomicU32::new(0));
    let handler = FlakyHandler {
        fail_first,
        calls: calls.clone(),
    };
    let consumer = RetryingConsumer::new(
        source,
        handler,
        Arc::new(broker.clone()) as Arc<dyn EventSink>,
        names.clone(),
        fast_policy(max_retries),
        Arc::new(IndexerMetrics::new()),
    );
    tokio::spawn(consumer.run());
    Pipeline {
        broker,
        names,
        dlq,
        calls,
    }
}

fn event() -> DomainEvent {
    DomainEvent::new(
        EventType::RoomInventoryChanged,
        Uuid::new_v4(),
        serde_json::json!({"reason": "test"}),
    )
}

async fn publish(pipeline: &Pipeline, event: &DomainEvent) {
    pipeline
        .broker
        .publish(
            pipeline.names.main(),
            &event.hotel_id.to_string(),
            &serde_json::to_vec(event).unwrap(),
        )
        .await
        .unwrap();
}

async fn wait_for_calls(calls: &AtomicU32, expected: u32) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while calls.load(Ordering::SeqCst) < expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {expected} handler calls (got {})",
            calls.load(Ordering::SeqCst)
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn recv_dead_letter(dlq: &mut ChannelEventSource, timeout: Duration) -> Option<DeadLetter> {
    match tokio::time::timeout(timeout, dlq.recv()).await {
        Ok(Ok(Some(msg))) => Some(serde_json::from_slice(&msg.payload).expect("dead letter json")),
        _ => None,
    }
}

#[tokio::test]
async fn transient_failures_recover_within_budget() {
    let mut pipeline = pipeline(3, 5);
    let evt = event();
    publish(&pipeline, &evt).await;

    // 3 failures then the 4th attempt succeeds.
    wait_for_calls(&pipeline.calls, 4).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 4);
    assert!(
        recv_dead_letter(&mut pipeline.dlq, Duration::from_millis(100)).await.is_none(),
        "recovered event must not be dead-lettered"
    );
}

#[tokio::test]
async fn exhausted_budget_dead_letters_exactly_once() {
    let mut pipeline = pipeline(u32::MAX, 2);
    let evt = event();
    publish(&pipeline, &evt).await;

    let letter = recv_dead_letter(&mut pipeline.dlq, Duration::from_secs(2))
        .await
        .expect("dead letter");
    // First delivery plus maxRetries redeliveries all failed.
    assert_eq!(letter.retry_count, 3);
    assert!(letter.original_payload.contains(&evt.event_id.to_string()));
    assert!(letter.last_error.contains("transient failure"));

    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 3);
    assert!(
        recv_dead_letter(&mut pipeline.dlq, Duration::from_millis(100)).await.is_none(),
        "only one dead letter per message"
    );
}

#[tokio::test]
async fn poison_payload_dead_letters_immediately() {
    let mut pipeline = pipeline(0, 5);
    pipeline
        .broker
        .publish(pipeline.names.main(), "k", b"this is not json")
        .await
        .unwrap();

    let letter = recv_dead_letter(&mut pipeline.dlq, Duration::from_secs(2))
        .await
        .expect("dead letter");
    assert_eq!(letter.retry_count, 0, "poison skips the retry budget");
    assert_eq!(letter.original_payload, "this is not json");
    // The handler never saw it.
    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn healthy_stream_processes_in_order_without_retries() {
    let mut pipeline = pipeline(0, 5);
    for _ in 0..3 {
        publish(&pipeline, &event()).await;
    }
    wait_for_calls(&pipeline.calls, 3).await;
    assert!(
        recv_dead_letter(&mut pipeline.dlq, Duration::from_millis(100)).await.is_none()
    );
}

#[tokio::test]
async fn retried_events_do_not_block_later_ones() {
    // The first two handler invocations fail, so both events take one trip
    // through the scheduler and both must still complete.
    let mut pipeline = pipeline(2, 5);
    publish(&pipeline, &event()).await;
    publish(&pipeline, &event()).await;

    // two initial failures + two successful redeliveries = 4 calls.
    wait_for_calls(&pipeline.calls, 4).await;
    assert!(
        recv_dead_letter(&mut pipeline.dlq, Duration::from_millis(100)).await.is_none()
    );
}
