//! Data model shared by the consumer, producer and the claim engine

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub type TopicName = String;
pub type PartitionId = i32;
pub type Offset = i64;
pub type GenerationId = u64;

/// A (topic, partition) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicPartition {
    pub topic: TopicName,
    pub partition: PartitionId,
}

impl TopicPartition {
    pub fn new<T: Into<TopicName>>(topic: T, partition: PartitionId) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.partition)
    }
}

/// A single record header. Keys are not required to be unique within a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub key: Bytes,
    pub value: Bytes,
}

impl MessageHeader {
    pub fn new<K: Into<Bytes>, V: Into<Bytes>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A message delivered from a claimed partition. Immutable once delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: TopicName,
    pub partition: PartitionId,
    pub offset: Offset,
    pub timestamp: Option<DateTime<Utc>>,
    pub key: Option<Bytes>,
    pub value: Bytes,
    pub headers: Vec<MessageHeader>,
}

impl Message {
    /// Create a message with no key, headers or timestamp
    pub fn new<T: Into<TopicName>, V: Into<Bytes>>(
        topic: T,
        partition: PartitionId,
        offset: Offset,
        value: V,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            timestamp: None,
            key: None,
            value: value.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_key<K: Into<Bytes>>(mut self, key: K) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_header<K: Into<Bytes>, V: Into<Bytes>>(mut self, key: K, value: V) -> Self {
        self.headers.push(MessageHeader::new(key, value));
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}

/// Low and high watermarks of a partition. `high` is one past the newest
/// message visible to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermarks {
    pub low: Offset,
    pub high: Offset,
}

impl Watermarks {
    pub fn new(low: Offset, high: Offset) -> Self {
        Self { low, high }
    }

    /// The partition held no message when the watermarks were captured
    pub fn is_empty(&self) -> bool {
        self.high <= self.low
    }
}

/// A partition claimed for one generation, with the watermarks captured when
/// the claim was established. The snapshot is never refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedPartition {
    pub partition: TopicPartition,
    pub watermarks: Option<Watermarks>,
    /// Offset the first fetch of this claim starts from, when known
    pub position: Option<Offset>,
}

impl ClaimedPartition {
    pub fn new(partition: TopicPartition, watermarks: Option<Watermarks>) -> Self {
        Self {
            partition,
            watermarks,
            position: None,
        }
    }

    pub fn with_position(mut self, position: Offset) -> Self {
        self.position = Some(position);
        self
    }

    pub fn high_water_mark(&self) -> Option<Offset> {
        self.watermarks.map(|w| w.high)
    }

    /// Nothing below the high-water mark is left to read: the partition was
    /// empty, or the claim starts at or past the mark.
    pub fn is_caught_up(&self) -> bool {
        match self.watermarks {
            Some(w) => w.is_empty() || self.position.is_some_and(|p| p >= w.high),
            None => false,
        }
    }
}

/// A partition handed to this member by a rebalance, together with its
/// ordered message sequence. The sequence ends when the generation is revoked.
#[derive(Debug)]
pub struct PartitionAssignment {
    pub partition: TopicPartition,
    pub messages: mpsc::Receiver<Message>,
}

/// One epoch of partition ownership
#[derive(Debug)]
pub struct Generation {
    pub id: GenerationId,
    pub assignments: Vec<PartitionAssignment>,
    /// Cancelled when the claims of this generation are revoked
    pub revoked: CancellationToken,
}

/// A message to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub topic: TopicName,
    pub key: Option<Bytes>,
    pub value: Bytes,
    pub headers: Vec<MessageHeader>,
}

/// Where a produced message landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: PartitionId,
    pub offset: Offset,
}
