//! In-memory collaborators for driving the engine without a broker

#![allow(dead_code)]

use async_trait::async_trait;
use kafkacli::config::ConsumeConfig;
use kafkacli_client::{
    ClientConfig, ClientError, ConsumerGroup, Delivery, Generation, GenerationId, Message,
    MessageSender, Offset, OutgoingMessage, PartitionAssignment, TopicPartition, Watermarks,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCall {
    Pause,
    Resume,
}

/// Producer side of a scripted generation
pub struct ScriptedGeneration {
    pub id: GenerationId,
    senders: HashMap<TopicPartition, mpsc::Sender<Message>>,
    revoked: CancellationToken,
}

impl ScriptedGeneration {
    pub async fn deliver(&self, message: Message) {
        let sender = self
            .senders
            .get(&message.topic_partition())
            .expect("partition not claimed in this generation");
        sender.send(message).await.expect("claim closed");
    }

    /// Deliver offsets `range` of a partition with a fixed header
    pub async fn deliver_range(&self, topic: &str, partition: i32, offsets: std::ops::Range<Offset>) {
        for offset in offsets {
            self.deliver(message(topic, partition, offset)).await;
        }
    }

    /// End every claim of this generation, as a rebalance would
    pub fn revoke(self) {
        self.revoked.cancel();
    }
}

pub fn message(topic: &str, partition: i32, offset: Offset) -> Message {
    Message::new(topic, partition, offset, format!("{}-{}-{}", topic, partition, offset))
}

/// Consumer group whose generations are scripted by the test
pub struct MemoryGroup {
    script_tx: mpsc::UnboundedSender<Result<Generation, ClientError>>,
    script_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Generation, ClientError>>>,
    watermarks: Mutex<HashMap<TopicPartition, Watermarks>>,
    positions: Mutex<HashMap<TopicPartition, Offset>>,
    paused: watch::Sender<bool>,
    marks: Mutex<Vec<(TopicPartition, Offset)>>,
    flow: Mutex<Vec<FlowCall>>,
    subscriptions: Mutex<Vec<Vec<String>>>,
    failing_marks: Mutex<HashSet<Offset>>,
    hang_watermarks: AtomicBool,
    watermarks_requested: Notify,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl Default for MemoryGroup {
    fn default() -> Self {
        let (script_tx, script_rx) = mpsc::unbounded_channel();
        Self {
            script_tx,
            script_rx: tokio::sync::Mutex::new(script_rx),
            watermarks: Mutex::new(HashMap::new()),
            positions: Mutex::new(HashMap::new()),
            paused: watch::channel(false).0,
            marks: Mutex::new(Vec::new()),
            flow: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            failing_marks: Mutex::new(HashSet::new()),
            hang_watermarks: AtomicBool::new(false),
            watermarks_requested: Notify::new(),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        }
    }
}

impl MemoryGroup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a generation claiming `partitions`. Delivered messages pass
    /// through a relay that holds them back while the group is paused.
    pub fn assign(&self, id: GenerationId, partitions: &[(&str, i32)]) -> ScriptedGeneration {
        let revoked = CancellationToken::new();
        let mut senders = HashMap::new();
        let mut assignments = Vec::new();

        for (topic, partition) in partitions {
            let partition = TopicPartition::new(*topic, *partition);
            let (tx, inbound) = mpsc::channel(64);
            let (outbound, rx) = mpsc::channel(64);
            tokio::spawn(relay(inbound, outbound, self.paused.subscribe()));
            senders.insert(partition.clone(), tx);
            assignments.push(PartitionAssignment {
                partition,
                messages: rx,
            });
        }

        let generation = Generation {
            id,
            assignments,
            revoked: revoked.clone(),
        };
        self.script_tx
            .send(Ok(generation))
            .expect("script receiver dropped");

        ScriptedGeneration {
            id,
            senders,
            revoked,
        }
    }

    /// Queue a failure for the next join
    pub fn fail_next(&self, error: ClientError) {
        self.script_tx.send(Err(error)).expect("script receiver dropped");
    }

    pub fn set_watermarks(&self, topic: &str, partition: i32, low: Offset, high: Offset) {
        self.watermarks
            .lock()
            .insert(TopicPartition::new(topic, partition), Watermarks::new(low, high));
    }

    /// Where the first fetch of `partition` starts; the low watermark otherwise
    pub fn set_position(&self, topic: &str, partition: i32, position: Offset) {
        self.positions
            .lock()
            .insert(TopicPartition::new(topic, partition), position);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn hang_watermarks(&self) {
        self.hang_watermarks.store(true, Ordering::SeqCst);
    }

    pub async fn watermarks_requested(&self) {
        self.watermarks_requested.notified().await;
    }

    pub fn fail_mark(&self, offset: Offset) {
        self.failing_marks.lock().insert(offset);
    }

    pub fn marks(&self) -> Vec<(TopicPartition, Offset)> {
        self.marks.lock().clone()
    }

    pub fn marked_offsets(&self, topic: &str, partition: i32) -> Vec<Offset> {
        let partition = TopicPartition::new(topic, partition);
        self.marks
            .lock()
            .iter()
            .filter(|(p, _)| *p == partition)
            .map(|(_, offset)| *offset)
            .collect()
    }

    pub fn flow_calls(&self) -> Vec<FlowCall> {
        self.flow.lock().clone()
    }

    pub fn subscriptions(&self) -> Vec<Vec<String>> {
        self.subscriptions.lock().clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsumerGroup for MemoryGroup {
    async fn next_generation(&self, topics: &[String]) -> Result<Generation, ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        self.subscriptions.lock().push(topics.to_vec());

        let mut script = self.script_rx.lock().await;
        match script.recv().await {
            Some(next) => next,
            None => Err(ClientError::Closed),
        }
    }

    async fn watermarks(&self, partition: &TopicPartition) -> Result<Watermarks, ClientError> {
        self.watermarks_requested.notify_one();
        if self.hang_watermarks.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.watermarks
            .lock()
            .get(partition)
            .copied()
            .ok_or_else(|| ClientError::group(format!("no watermarks for {}", partition)))
    }

    async fn start_position(
        &self,
        partition: &TopicPartition,
        watermarks: Watermarks,
    ) -> Result<Offset, ClientError> {
        Ok(self
            .positions
            .lock()
            .get(partition)
            .copied()
            .unwrap_or(watermarks.low))
    }

    fn mark(&self, partition: &TopicPartition, offset: Offset) -> Result<(), ClientError> {
        if self.failing_marks.lock().contains(&offset) {
            return Err(ClientError::group("offset store failed"));
        }
        self.marks.lock().push((partition.clone(), offset));
        Ok(())
    }

    fn pause_all(&self) -> Result<(), ClientError> {
        self.flow.lock().push(FlowCall::Pause);
        self.paused.send_replace(true);
        Ok(())
    }

    fn resume_all(&self) -> Result<(), ClientError> {
        self.flow.lock().push(FlowCall::Resume);
        self.paused.send_replace(false);
        Ok(())
    }

    async fn close(&self) -> Result<(), ClientError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        Ok(())
    }
}

/// Forward messages to a claim, waiting while the group is paused
async fn relay(
    mut inbound: mpsc::Receiver<Message>,
    outbound: mpsc::Sender<Message>,
    mut paused: watch::Receiver<bool>,
) {
    while let Some(message) = inbound.recv().await {
        if paused.wait_for(|paused| !*paused).await.is_err() {
            break;
        }
        if outbound.send(message).await.is_err() {
            break;
        }
    }
}

/// Sender that records every message and fails for chosen topics
#[derive(Default)]
pub struct MemorySender {
    sent: Mutex<Vec<OutgoingMessage>>,
    failing_topics: Mutex<HashSet<String>>,
}

impl MemorySender {
    pub fn fail_topic(&self, topic: &str) {
        self.failing_topics.lock().insert(topic.to_string());
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MessageSender for MemorySender {
    async fn send(&self, message: &OutgoingMessage) -> Result<Delivery, ClientError> {
        if self.failing_topics.lock().contains(&message.topic) {
            return Err(ClientError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("broker unavailable for {}", message.topic),
            )));
        }

        let mut sent = self.sent.lock();
        sent.push(message.clone());
        Ok(Delivery {
            partition: 0,
            offset: sent.len() as Offset - 1,
        })
    }

    async fn close(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Cloneable in-memory writer
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer that always fails, as a closed stdout pipe does
pub struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn consume_config(topics: &[&str]) -> ConsumeConfig {
    ConsumeConfig::new(
        ClientConfig::default(),
        topics.iter().map(|t| t.to_string()).collect(),
        "test-group".to_string(),
    )
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    let wait = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("condition not reached in time");
}

/// Run `future` with a five second limit
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}
