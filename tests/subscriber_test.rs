use async_trait::async_trait;
use fleet_telemetry_backbone::broker::{
    dead_letter_topic, BrokerResult, DeadLetterRecord, DeadLetterSink, EventEnvelope,
    EventHandler, ProcessOutcome, RetryBackoff, RetryRunner, SubscriberConfig,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

struct CountingHandler {
    calls: AtomicU32,
    succeed_on: Option<u32>,
}

impl CountingHandler {
    fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            succeed_on: None,
        }
    }

    fn succeeding_on(attempt: u32) -> Self {
        Self {
            calls: AtomicU32::new(0),
            succeed_on: Some(attempt),
        }
    }
}

#[async_trait]
impl EventHandler for CountingHandler {
    async fn handle(&self, _envelope: &EventEnvelope) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.succeed_on {
            Some(n) if call >= n => Ok(()),
            _ => anyhow::bail!("boom on attempt {call}"),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<DeadLetterRecord>>,
    fail: bool,
}

#[async_trait]
impl DeadLetterSink for RecordingSink {
    async fn publish(&self, record: &DeadLetterRecord) -> BrokerResult<()> {
        if self.fail {
            return Err(
                fleet_telemetry_backbone::broker::BrokerError::PublishFailed("down".into()),
            );
        }
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

fn envelope() -> EventEnvelope {
    EventEnvelope {
        topic: "fleet.issue-reports".to_string(),
        partition: 2,
        offset: 99,
        key: Some("VIN1".to_string()),
        value: serde_json::json!({"title": "t", "reporter": "rig"}),
        headers: Default::default(),
        timestamp: chrono::Utc::now(),
    }
}

fn config(max_retries: u32, dlq: bool, backoff: RetryBackoff) -> SubscriberConfig {
    SubscriberConfig {
        max_retries,
        dead_letter_enabled: dlq,
        backoff,
        partition_queue_capacity: 16,
    }
}

#[tokio::test]
async fn test_exhausted_retries_yield_one_dead_letter() {
    let sink = Arc::new(RecordingSink::default());
    let runner = RetryRunner::new(&config(3, true, RetryBackoff::None), Some(sink.clone()));
    let handler = CountingHandler::failing();

    let outcome = runner.process(&envelope(), &handler).await;

    assert_eq!(outcome, ProcessOutcome::DeadLettered { attempts: 3 });
    assert_eq!(handler.calls.load(Ordering::SeqCst), 3);

    let records = sink.records.lock().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].original_topic, "fleet.issue-reports");
    assert_eq!(records[0].partition, 2);
    assert_eq!(records[0].offset, 99);
    assert!(records[0].error.contains("attempt 3"));
}

#[tokio::test]
async fn test_disabled_dead_lettering_produces_no_record() {
    let sink = Arc::new(RecordingSink::default());
    let runner = RetryRunner::new(&config(3, false, RetryBackoff::None), Some(sink.clone()));

    let outcome = runner
        .process(&envelope(), &CountingHandler::failing())
        .await;

    assert_eq!(outcome, ProcessOutcome::Dropped { attempts: 3 });
    assert!(sink.records.lock().await.is_empty());
}

#[tokio::test]
async fn test_success_on_attempt_k_invokes_exactly_k_times() {
    for k in 1..=3u32 {
        let sink = Arc::new(RecordingSink::default());
        let runner = RetryRunner::new(&config(3, true, RetryBackoff::None), Some(sink.clone()));
        let handler = CountingHandler::succeeding_on(k);

        let outcome = runner.process(&envelope(), &handler).await;

        assert_eq!(outcome, ProcessOutcome::Handled { attempts: k });
        assert_eq!(handler.calls.load(Ordering::SeqCst), k);
        assert!(sink.records.lock().await.is_empty());
    }
}

#[tokio::test]
async fn test_dead_letter_publish_failure_still_resolves() {
    let sink = Arc::new(RecordingSink {
        records: Mutex::new(Vec::new()),
        fail: true,
    });
    let runner = RetryRunner::new(&config(2, true, RetryBackoff::None), Some(sink.clone()));

    // The retry loop must resolve so the partition can advance even when
    // the dead-letter topic is unreachable
    let outcome = runner
        .process(&envelope(), &CountingHandler::failing())
        .await;
    assert_eq!(outcome, ProcessOutcome::DeadLettered { attempts: 2 });
    assert!(sink.records.lock().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fixed_backoff_waits_between_attempts() {
    let sink = Arc::new(RecordingSink::default());
    let runner = RetryRunner::new(
        &config(3, true, RetryBackoff::Fixed { delay_ms: 500 }),
        Some(sink),
    );

    let start = tokio::time::Instant::now();
    runner
        .process(&envelope(), &CountingHandler::failing())
        .await;

    // Two inter-attempt delays for three attempts
    assert_eq!(start.elapsed(), std::time::Duration::from_millis(1000));
}

#[test]
fn test_dead_letter_topic_naming() {
    assert_eq!(dead_letter_topic("fleet.issue-reports"), "fleet.issue-reports.dlq");
}
