//! Producer client for publishing messages

use crate::config::ProducerConfig;
use crate::connection;
use crate::error::ClientError;
use crate::protocol::{Delivery, OutgoingMessage};
use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Anything that can publish a message and wait for its acknowledgement
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send one message and wait until the broker acknowledges it
    async fn send(&self, message: &OutgoingMessage) -> Result<Delivery, ClientError>;

    /// Flush outstanding messages and release the connection
    async fn close(&self) -> Result<(), ClientError>;
}

/// Synchronous-style producer: every send waits for its delivery report
#[derive(Clone)]
pub struct KafkaProducer {
    producer: Arc<FutureProducer>,
    delivery_timeout: Duration,
}

impl KafkaProducer {
    pub fn new(config: &ProducerConfig) -> Result<Self, ClientError> {
        let producer: FutureProducer = connection::producer_config(config)?.create()?;
        info!(acks = %config.acks, retries = config.retries, "Producer created");

        Ok(Self {
            producer: Arc::new(producer),
            delivery_timeout: config.delivery_timeout,
        })
    }
}

#[async_trait]
impl MessageSender for KafkaProducer {
    async fn send(&self, message: &OutgoingMessage) -> Result<Delivery, ClientError> {
        let mut headers = OwnedHeaders::new_with_capacity(message.headers.len());
        for header in &message.headers {
            let key = String::from_utf8_lossy(&header.key);
            headers = headers.insert(Header {
                key: &key,
                value: Some(&header.value[..]),
            });
        }

        let mut record: FutureRecord<'_, [u8], [u8]> = FutureRecord::to(&message.topic)
            .payload(&message.value[..])
            .headers(headers);
        if let Some(key) = &message.key {
            record = record.key(&key[..]);
        }

        match self.producer.send(record, self.delivery_timeout).await {
            Ok((partition, offset)) => {
                debug!(topic = %message.topic, partition, offset, "Message delivered");
                Ok(Delivery { partition, offset })
            }
            Err((source, _)) => Err(ClientError::Send {
                topic: message.topic.clone(),
                source,
            }),
        }
    }

    async fn close(&self) -> Result<(), ClientError> {
        let producer = Arc::clone(&self.producer);
        let timeout = self.delivery_timeout;
        let flushed = tokio::task::spawn_blocking(move || producer.flush(timeout)).await?;
        if let Err(e) = &flushed {
            warn!(error = %e, "Producer flush failed");
        }
        flushed?;
        debug!("Producer closed");
        Ok(())
    }
}
