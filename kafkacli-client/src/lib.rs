//! # kafkacli client library
//!
//! Thin async layer over librdkafka used by the `kafkacli` command line tool.
//!
//! ## Features
//!
//! - **Consumer groups**: every rebalance becomes a [`Generation`] with one
//!   ordered message channel per claimed partition
//! - **Explicit offset marking**: processed offsets are stored locally and
//!   committed in the background by librdkafka
//! - **Acknowledged produce**: each send waits for the broker's delivery report
//! - **TLS**: CA, certificate and key files are checked before connecting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kafkacli_client::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = KafkaClient::new(
//!         ClientConfigBuilder::new().brokers(vec!["localhost:9092"]).build(),
//!     )?;
//!     let metrics = Arc::new(DeliveryMetrics::new());
//!     let group = client.consumer_group("my-group", StartOffset::Earliest, metrics)?;
//!
//!     let mut generation = group.next_generation(&["events".to_string()]).await?;
//!     for claim in generation.assignments.iter_mut() {
//!         while let Some(message) = claim.messages.recv().await {
//!             group.mark(&claim.partition, message.offset)?;
//!         }
//!     }
//!     group.close().await
//! }
//! ```

pub mod admin;
pub mod client;
pub mod config;
pub mod connection;
pub mod consumer;
pub mod error;
pub mod metrics;
pub mod producer;
pub mod protocol;
pub mod tls;

pub use admin::AdminClient;
pub use client::KafkaClient;
pub use config::{
    ClientConfig, ClientConfigBuilder, ConsumerConfig, ConsumerConfigBuilder, ProducerConfig,
    ProducerConfigBuilder, SecurityConfig, StartOffset,
};
pub use consumer::{ConsumerGroup, KafkaConsumerGroup};
pub use error::ClientError;
pub use metrics::{DeliveryMetrics, MetricsSnapshot};
pub use producer::{KafkaProducer, MessageSender};
pub use protocol::{
    ClaimedPartition, Delivery, Generation, GenerationId, Message, MessageHeader, Offset,
    OutgoingMessage, PartitionAssignment, PartitionId, TopicName, TopicPartition, Watermarks,
};

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
