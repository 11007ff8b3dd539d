//! Reliable message consumption: bounded retry with dead-letter fallback.
//!
//! Each consumed message is decoded into the canonical [`EventEnvelope`] and
//! handed to the registered handler up to `max_retries` times. Exhausted
//! messages are republished to `<topic>.dlq` (or dropped with a warning when
//! dead-lettering is disabled). Offsets are stored only after the retry loop
//! resolves, giving at-least-once delivery; handlers must tolerate duplicate
//! invocation. Ordering is preserved within a partition; distinct partitions
//! are processed concurrently by dedicated worker tasks.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::config::{dead_letter_topic, BrokerConfig, SubscriberConfig};
use super::envelope::{DeadLetterRecord, EventEnvelope};
use super::error::{BrokerError, BrokerResult};
use super::metrics::BROKER_METRICS;
use super::producer::EventProducer;

/// Handler invoked for every decoded envelope
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into an [`EventHandler`]
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(EventEnvelope) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync,
{
    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        (self.0)(envelope.clone()).await
    }
}

/// Destination for messages that exhausted their retries
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn publish(&self, record: &DeadLetterRecord) -> BrokerResult<()>;
}

#[async_trait]
impl DeadLetterSink for EventProducer {
    async fn publish(&self, record: &DeadLetterRecord) -> BrokerResult<()> {
        let topic = dead_letter_topic(&record.original_topic);
        self.send(&topic, record.key.as_deref(), record, None)
            .await
            .map(|_| ())
    }
}

/// How a message's retry loop resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Handler succeeded on attempt `attempts`
    Handled { attempts: u32 },
    /// Every attempt failed; one dead-letter record was published
    DeadLettered { attempts: u32 },
    /// Every attempt failed and dead-lettering is disabled
    Dropped { attempts: u32 },
}

/// The retry loop itself, separated from the consumer plumbing so the
/// bounded-retry and dead-letter semantics are directly testable.
pub struct RetryRunner {
    max_retries: u32,
    backoff: super::retry::RetryBackoff,
    dead_letter: Option<Arc<dyn DeadLetterSink>>,
}

impl RetryRunner {
    pub fn new(
        config: &SubscriberConfig,
        dead_letter: Option<Arc<dyn DeadLetterSink>>,
    ) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            backoff: config.backoff,
            dead_letter: if config.dead_letter_enabled {
                dead_letter
            } else {
                None
            },
        }
    }

    /// Run the handler to resolution for one envelope. Never returns an
    /// error: failure is absorbed into the outcome so the caller can always
    /// advance the partition.
    pub async fn process(
        &self,
        envelope: &EventEnvelope,
        handler: &dyn EventHandler,
    ) -> ProcessOutcome {
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            if let Some(delay) = self.backoff.delay_before(attempt) {
                tokio::time::sleep(delay).await;
            }
            if attempt > 1 {
                BROKER_METRICS
                    .handler_retries
                    .with_label_values(&[&envelope.topic])
                    .inc();
            }

            match handler.handle(envelope).await {
                Ok(()) => return ProcessOutcome::Handled { attempts: attempt },
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(
                        topic = %envelope.topic,
                        partition = envelope.partition,
                        offset = envelope.offset,
                        attempt,
                        max_retries = self.max_retries,
                        error = %last_error,
                        "Handler attempt failed"
                    );
                }
            }
        }

        match &self.dead_letter {
            Some(sink) => {
                let record = DeadLetterRecord::from_envelope(envelope, last_error);
                if let Err(e) = sink.publish(&record).await {
                    tracing::error!(
                        topic = %envelope.topic,
                        partition = envelope.partition,
                        offset = envelope.offset,
                        error = %e,
                        "Dead-letter publish failed; message will be lost on commit"
                    );
                } else {
                    BROKER_METRICS
                        .dead_letters
                        .with_label_values(&[&envelope.topic])
                        .inc();
                }
                ProcessOutcome::DeadLettered {
                    attempts: self.max_retries,
                }
            }
            None => {
                tracing::warn!(
                    topic = %envelope.topic,
                    partition = envelope.partition,
                    offset = envelope.offset,
                    error = %last_error,
                    "Retries exhausted and dead-lettering disabled; dropping message"
                );
                BROKER_METRICS
                    .messages_dropped
                    .with_label_values(&[&envelope.topic, "exhausted"])
                    .inc();
                ProcessOutcome::Dropped {
                    attempts: self.max_retries,
                }
            }
        }
    }
}

/// Reliable subscriber over a shared Kafka consumer.
///
/// One handler per topic; the dispatch loop routes each message to a
/// per-partition worker so a retry loop blocks only its own partition.
pub struct ReliableSubscriber {
    consumer: Arc<StreamConsumer>,
    runner: Arc<RetryRunner>,
    dlq_producer: Arc<EventProducer>,
    handlers: Arc<DashMap<String, Arc<dyn EventHandler>>>,
    topics: Mutex<Vec<String>>,
    config: SubscriberConfig,
}

impl ReliableSubscriber {
    /// Connect the shared consumer and the dead-letter producer. A failure
    /// to establish the dead-letter producer is fatal here.
    pub fn connect(broker: BrokerConfig, config: SubscriberConfig) -> BrokerResult<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &broker.bootstrap_servers)
            .set("group.id", &broker.group_id)
            .set("client.id", &broker.client_id)
            // offsets are stored manually after the retry loop resolves;
            // the background committer then commits whatever is stored
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("session.timeout.ms", broker.session_timeout_ms.to_string());

        if broker.enable_sasl {
            if let (Some(mechanism), Some(username), Some(password)) = (
                &broker.sasl_mechanism,
                &broker.sasl_username,
                &broker.sasl_password,
            ) {
                client_config
                    .set("security.protocol", "SASL_SSL")
                    .set("sasl.mechanism", mechanism)
                    .set("sasl.username", username)
                    .set("sasl.password", password);
            }
        }

        let consumer: StreamConsumer = client_config.create().map_err(|e| {
            BrokerError::ConnectionFailed(format!("Kafka consumer creation failed: {}", e))
        })?;

        let dlq_producer = Arc::new(EventProducer::connect(broker)?);
        let runner = Arc::new(RetryRunner::new(
            &config,
            Some(dlq_producer.clone() as Arc<dyn DeadLetterSink>),
        ));

        Ok(Self {
            consumer: Arc::new(consumer),
            runner,
            dlq_producer,
            handlers: Arc::new(DashMap::new()),
            topics: Mutex::new(Vec::new()),
            config,
        })
    }

    /// Register a handler for a topic and (re)subscribe the shared consumer
    pub fn subscribe(&self, topic: &str, handler: Arc<dyn EventHandler>) -> BrokerResult<()> {
        self.handlers.insert(topic.to_string(), handler);

        let mut topics = self.topics.lock();
        if !topics.iter().any(|t| t == topic) {
            topics.push(topic.to_string());
        }
        let refs: Vec<&str> = topics.iter().map(|t| t.as_str()).collect();
        self.consumer
            .subscribe(&refs)
            .map_err(|e| BrokerError::SubscribeFailed(format!("Kafka subscribe failed: {}", e)))?;

        tracing::info!(topic, "Handler registered");
        Ok(())
    }

    /// Spawn the dispatch loop. Messages are decoded, routed to per-partition
    /// workers, and their offsets stored once processing resolves.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let subscriber = Arc::clone(self);
        tokio::spawn(async move { subscriber.run().await })
    }

    async fn run(&self) {
        type PartitionKey = (String, i32);
        let workers: DashMap<PartitionKey, mpsc::Sender<WorkItem>> = DashMap::new();

        loop {
            let message = match self.consumer.recv().await {
                Ok(m) => m,
                Err(e) => {
                    tracing::error!(error = %e, "Consumer receive failed");
                    continue;
                }
            };

            let (topic, partition, offset) = raw_coordinates(&message);
            let item = match EventEnvelope::decode(&message) {
                Ok(envelope) => {
                    BROKER_METRICS
                        .messages_consumed
                        .with_label_values(&[&topic])
                        .inc();
                    WorkItem::Envelope(envelope)
                }
                Err(e) => {
                    // Malformed upstream data is dropped, never retried; it
                    // still flows through the worker so offsets advance in
                    // partition order
                    tracing::warn!(error = %e, "Dropping undecodable message");
                    BROKER_METRICS
                        .messages_dropped
                        .with_label_values(&[&topic, "malformed"])
                        .inc();
                    WorkItem::Malformed {
                        topic: topic.clone(),
                        partition,
                        offset,
                    }
                }
            };

            let sender = workers
                .entry((topic, partition))
                .or_insert_with(|| self.spawn_partition_worker())
                .clone();

            // Bounded send: a saturated partition backpressures intake rather
            // than reordering or dropping
            if sender.send(item).await.is_err() {
                tracing::error!("Partition worker channel closed unexpectedly");
            }
        }
    }

    fn spawn_partition_worker(&self) -> mpsc::Sender<WorkItem> {
        let (tx, mut rx) = mpsc::channel::<WorkItem>(self.config.partition_queue_capacity);
        let runner = Arc::clone(&self.runner);
        let handlers = Arc::clone(&self.handlers);
        let consumer = Arc::clone(&self.consumer);

        tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                let (topic, partition, offset) = match item {
                    WorkItem::Envelope(envelope) => {
                        let handler = handlers
                            .get(&envelope.topic)
                            .map(|entry| Arc::clone(entry.value()));
                        if let Some(handler) = handler {
                            runner.process(&envelope, handler.as_ref()).await;
                        } else {
                            tracing::warn!(topic = %envelope.topic, "No handler registered; dropping");
                            BROKER_METRICS
                                .messages_dropped
                                .with_label_values(&[&envelope.topic, "no_handler"])
                                .inc();
                        }
                        (envelope.topic, envelope.partition, envelope.offset)
                    }
                    WorkItem::Malformed {
                        topic,
                        partition,
                        offset,
                    } => (topic, partition, offset),
                };

                if let Err(e) = consumer.store_offset(&topic, partition, offset) {
                    tracing::error!(
                        topic = %topic,
                        partition,
                        offset,
                        error = %e,
                        "Failed to store offset"
                    );
                }
            }
        });

        tx
    }

    /// Drain and disconnect before exit; best-effort, never blocks shutdown
    /// for more than the given timeout.
    pub fn close(&self, timeout: Duration) {
        self.dlq_producer.close(timeout);
        if let Err(e) = self
            .consumer
            .commit_consumer_state(rdkafka::consumer::CommitMode::Sync)
        {
            tracing::warn!(error = %e, "Final offset commit failed during shutdown");
        }
    }
}

/// Unit of work routed to a partition worker
enum WorkItem {
    Envelope(EventEnvelope),
    Malformed {
        topic: String,
        partition: i32,
        offset: i64,
    },
}

fn raw_coordinates<M: rdkafka::Message>(message: &M) -> (String, i32, i64) {
    (
        message.topic().to_string(),
        message.partition(),
        message.offset(),
    )
}
