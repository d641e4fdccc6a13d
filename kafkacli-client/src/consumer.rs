//! Consumer-group membership backed by librdkafka
//!
//! [`KafkaConsumerGroup`] joins a group, turns every assignment into a
//! [`Generation`] with one bounded message channel per claimed partition, and
//! runs a single fetch loop that routes records from the shared librdkafka
//! queue to the channel of their partition. Revoking a generation cancels its
//! token and drops the routes, which ends every claim sequence of that
//! generation.

use crate::config::{ConsumerConfig, StartOffset};
use crate::connection;
use crate::error::ClientError;
use crate::metrics::DeliveryMetrics;
use crate::protocol::{
    Generation, GenerationId, Message, MessageHeader, Offset, PartitionAssignment,
    TopicPartition, Watermarks,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::DateTime;
use parking_lot::Mutex;
use rdkafka::client::ClientContext;
use rdkafka::config::RDKafkaLogLevel;
use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Headers, Message as _};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::{Offset as KafkaOffset, TopicPartitionList};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Group membership as seen by the claim engine.
///
/// Generations are delivered in order. `mark`, `pause_all` and `resume_all`
/// are cheap local calls and never block on the network.
#[async_trait]
pub trait ConsumerGroup: Send + Sync {
    /// Wait for the next set of claims. The first call subscribes to `topics`.
    async fn next_generation(&self, topics: &[String]) -> Result<Generation, ClientError>;

    /// Current low and high watermarks of a partition
    async fn watermarks(&self, partition: &TopicPartition) -> Result<Watermarks, ClientError>;

    /// Offset the first fetch of a newly claimed partition starts from: the
    /// group's committed offset, or the start policy applied to `watermarks`
    /// when nothing usable is committed.
    async fn start_position(
        &self,
        partition: &TopicPartition,
        watermarks: Watermarks,
    ) -> Result<Offset, ClientError>;

    /// Mark `offset` as processed. The next committed position is `offset + 1`.
    fn mark(&self, partition: &TopicPartition, offset: Offset) -> Result<(), ClientError>;

    /// Stop fetching from every currently claimed partition
    fn pause_all(&self) -> Result<(), ClientError>;

    /// Resume fetching from every currently claimed partition
    fn resume_all(&self) -> Result<(), ClientError>;

    /// Commit marked offsets and leave the group. A second call fails with
    /// [`ClientError::Closed`].
    async fn close(&self) -> Result<(), ClientError>;
}

#[derive(Default)]
struct ClaimRoutes {
    senders: HashMap<TopicPartition, mpsc::Sender<Message>>,
    revoked: Option<CancellationToken>,
}

impl ClaimRoutes {
    fn revoke(&mut self) {
        self.senders.clear();
        if let Some(token) = self.revoked.take() {
            token.cancel();
        }
    }
}

type GenerationResult = Result<Generation, ClientError>;

/// librdkafka callbacks: rebalance events open and revoke generations, and
/// client logs are forwarded to tracing.
pub struct GroupContext {
    routes: Arc<Mutex<ClaimRoutes>>,
    generations: mpsc::UnboundedSender<GenerationResult>,
    last_generation: AtomicU64,
    claim_buffer: usize,
}

impl GroupContext {
    fn open_generation(&self, assigned: &TopicPartitionList) -> Generation {
        let id: GenerationId = self.last_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let revoked = CancellationToken::new();

        let mut routes = self.routes.lock();
        routes.revoke();
        routes.revoked = Some(revoked.clone());

        let mut assignments = Vec::new();
        for element in assigned.elements() {
            let partition = TopicPartition::new(element.topic(), element.partition());
            let (tx, rx) = mpsc::channel(self.claim_buffer);
            routes.senders.insert(partition.clone(), tx);
            assignments.push(PartitionAssignment {
                partition,
                messages: rx,
            });
        }

        Generation {
            id,
            assignments,
            revoked,
        }
    }
}

impl ClientContext for GroupContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        match level {
            RDKafkaLogLevel::Emerg
            | RDKafkaLogLevel::Alert
            | RDKafkaLogLevel::Critical
            | RDKafkaLogLevel::Error => error!(target: "librdkafka", "{}: {}", fac, log_message),
            RDKafkaLogLevel::Warning => warn!(target: "librdkafka", "{}: {}", fac, log_message),
            RDKafkaLogLevel::Notice | RDKafkaLogLevel::Info => {
                info!(target: "librdkafka", "{}: {}", fac, log_message)
            }
            RDKafkaLogLevel::Debug => debug!(target: "librdkafka", "{}: {}", fac, log_message),
        }
    }

    fn error(&self, error: KafkaError, reason: &str) {
        warn!(target: "librdkafka", error = %error, "{}", reason);
    }
}

impl ConsumerContext for GroupContext {
    fn pre_rebalance<'a>(&self, rebalance: &Rebalance<'a>) {
        if let Rebalance::Revoke(revoked) = rebalance {
            info!(partitions = revoked.count(), "Claims revoked");
            self.routes.lock().revoke();
        }
    }

    fn post_rebalance<'a>(&self, rebalance: &Rebalance<'a>) {
        match rebalance {
            Rebalance::Assign(assigned) => {
                let generation = self.open_generation(assigned);
                info!(
                    generation = generation.id,
                    partitions = generation.assignments.len(),
                    "Claims assigned"
                );
                if self.generations.send(Ok(generation)).is_err() {
                    debug!("Generation receiver dropped");
                }
            }
            Rebalance::Revoke(_) => {}
            Rebalance::Error(e) => {
                error!(error = %e, "Rebalance failed");
                let _ = self
                    .generations
                    .send(Err(ClientError::group(format!("Rebalance failed: {}", e))));
            }
        }
    }
}

/// A consumer-group member on a Kafka cluster
pub struct KafkaConsumerGroup {
    consumer: Arc<StreamConsumer<GroupContext>>,
    generations: tokio::sync::Mutex<mpsc::UnboundedReceiver<GenerationResult>>,
    routes: Arc<Mutex<ClaimRoutes>>,
    group_id: String,
    start_offset: StartOffset,
    request_timeout: Duration,
    subscribed: AtomicBool,
    closed: AtomicBool,
    stop: CancellationToken,
    fetcher: Mutex<Option<JoinHandle<()>>>,
}

impl KafkaConsumerGroup {
    /// Create the consumer and start its fetch loop. Must be called from
    /// within a tokio runtime.
    pub fn new(config: &ConsumerConfig, metrics: Arc<DeliveryMetrics>) -> Result<Self, ClientError> {
        let settings = connection::consumer_config(config)?;

        let routes = Arc::new(Mutex::new(ClaimRoutes::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        let context = GroupContext {
            routes: Arc::clone(&routes),
            generations: tx,
            last_generation: AtomicU64::new(0),
            claim_buffer: config.claim_buffer.max(1),
        };

        let consumer: StreamConsumer<GroupContext> = settings.create_with_context(context)?;
        let consumer = Arc::new(consumer);

        let stop = CancellationToken::new();
        let fetcher = tokio::spawn(fetch_loop(
            Arc::clone(&consumer),
            Arc::clone(&routes),
            metrics,
            stop.clone(),
        ));

        info!(group = %config.group_id, "Consumer created");

        Ok(Self {
            consumer,
            generations: tokio::sync::Mutex::new(rx),
            routes,
            group_id: config.group_id.clone(),
            start_offset: config.start_offset,
            request_timeout: config.client_config.request_timeout,
            subscribed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            stop,
            fetcher: Mutex::new(Some(fetcher)),
        })
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl ConsumerGroup for KafkaConsumerGroup {
    async fn next_generation(&self, topics: &[String]) -> Result<Generation, ClientError> {
        self.ensure_open()?;

        if !self.subscribed.swap(true, Ordering::SeqCst) {
            let names: Vec<&str> = topics.iter().map(String::as_str).collect();
            self.consumer.subscribe(&names)?;
            info!(topics = ?names, group = %self.group_id, "Subscribed");
        }

        let mut generations = self.generations.lock().await;
        match generations.recv().await {
            Some(generation) => generation,
            None => Err(ClientError::Closed),
        }
    }

    async fn watermarks(&self, partition: &TopicPartition) -> Result<Watermarks, ClientError> {
        let consumer = Arc::clone(&self.consumer);
        let topic = partition.topic.clone();
        let id = partition.partition;
        let timeout = self.request_timeout;

        let (low, high) =
            tokio::task::spawn_blocking(move || consumer.fetch_watermarks(&topic, id, timeout))
                .await??;
        Ok(Watermarks::new(low, high))
    }

    async fn start_position(
        &self,
        partition: &TopicPartition,
        watermarks: Watermarks,
    ) -> Result<Offset, ClientError> {
        let consumer = Arc::clone(&self.consumer);
        let topic = partition.topic.clone();
        let id = partition.partition;
        let timeout = self.request_timeout;

        let committed = tokio::task::spawn_blocking(move || {
            let mut list = TopicPartitionList::new();
            list.add_partition(&topic, id);
            consumer.committed_offsets(list, timeout)
        })
        .await??;

        let committed = committed
            .find_partition(&partition.topic, partition.partition)
            .map(|element| element.offset());
        let position = resolve_start(committed, self.start_offset, watermarks);
        debug!(%partition, ?committed, position, "Start position");
        Ok(position)
    }

    fn mark(&self, partition: &TopicPartition, offset: Offset) -> Result<(), ClientError> {
        let mut list = TopicPartitionList::new();
        list.add_partition_offset(
            &partition.topic,
            partition.partition,
            KafkaOffset::Offset(offset + 1),
        )?;
        self.consumer.store_offsets(&list)?;
        Ok(())
    }

    fn pause_all(&self) -> Result<(), ClientError> {
        let assignment = self.consumer.assignment()?;
        self.consumer.pause(&assignment)?;
        Ok(())
    }

    fn resume_all(&self) -> Result<(), ClientError> {
        let assignment = self.consumer.assignment()?;
        self.consumer.resume(&assignment)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ClientError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }

        self.stop.cancel();
        self.routes.lock().revoke();

        // The fetch loop may be parked on a full claim channel whose worker
        // was abandoned, so it is aborted rather than awaited cooperatively.
        let fetcher = self.fetcher.lock().take();
        if let Some(handle) = fetcher {
            handle.abort();
            let _ = handle.await;
        }

        let consumer = Arc::clone(&self.consumer);
        let committed =
            tokio::task::spawn_blocking(move || consumer.commit_consumer_state(CommitMode::Sync))
                .await?;
        match committed {
            Ok(()) => debug!("Final offsets committed"),
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {
                debug!("No offsets to commit")
            }
            Err(e) => warn!(error = %e, "Final offset commit failed"),
        }

        self.consumer.unsubscribe();
        info!(group = %self.group_id, "Consumer closed");
        Ok(())
    }
}

async fn fetch_loop(
    consumer: Arc<StreamConsumer<GroupContext>>,
    routes: Arc<Mutex<ClaimRoutes>>,
    metrics: Arc<DeliveryMetrics>,
    stop: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            received = consumer.recv() => received.map(|m| owned_message(&m)),
        };

        let message = match received {
            Ok(message) => message,
            Err(e) => {
                metrics.record_stream_error();
                warn!(error = %e, "Error from consumer stream");
                continue;
            }
        };

        let route = routes.lock().senders.get(&message.topic_partition()).cloned();
        match route {
            Some(sender) => {
                let (topic, partition, offset) =
                    (message.topic.clone(), message.partition, message.offset);
                if sender.send(message).await.is_err() {
                    debug!(%topic, partition, offset, "Claim closed, message dropped");
                }
            }
            None => debug!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "No active claim for message"
            ),
        }
    }

    debug!("Fetch loop stopped");
}

/// A committed offset still inside the log wins; otherwise the reset policy
/// decides, as librdkafka does on the first fetch.
fn resolve_start(
    committed: Option<KafkaOffset>,
    start_offset: StartOffset,
    watermarks: Watermarks,
) -> Offset {
    match committed {
        Some(KafkaOffset::Offset(offset)) if offset >= watermarks.low => offset,
        _ => match start_offset {
            StartOffset::Earliest => watermarks.low,
            StartOffset::Latest => watermarks.high,
        },
    }
}

fn owned_message(message: &BorrowedMessage<'_>) -> Message {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|header| {
                    MessageHeader::new(
                        Bytes::copy_from_slice(header.key.as_bytes()),
                        header.value.map(Bytes::copy_from_slice).unwrap_or_default(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    Message {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        timestamp: message
            .timestamp()
            .to_millis()
            .and_then(DateTime::from_timestamp_millis),
        key: message.key().map(Bytes::copy_from_slice),
        value: message
            .payload()
            .map(Bytes::copy_from_slice)
            .unwrap_or_default(),
        headers,
    }
}
