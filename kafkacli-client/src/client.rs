//! Entry point that hands out consumers, producers and admin clients sharing
//! one connection configuration

use crate::config::{ClientConfig, ConsumerConfigBuilder, ProducerConfigBuilder, StartOffset};
use crate::error::ClientError;
use crate::metrics::DeliveryMetrics;
use crate::{tls, AdminClient, KafkaConsumerGroup, KafkaProducer};
use std::sync::Arc;

/// Main client
#[derive(Debug, Clone)]
pub struct KafkaClient {
    config: ClientConfig,
}

impl KafkaClient {
    /// Create a client, validating the TLS material up front
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.brokers.is_empty() {
            return Err(ClientError::invalid_config(
                "At least one broker must be specified",
            ));
        }
        tls::validate(&config.security_config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Join `group_id` as a new consumer-group member
    pub fn consumer_group(
        &self,
        group_id: &str,
        start_offset: StartOffset,
        metrics: Arc<DeliveryMetrics>,
    ) -> Result<KafkaConsumerGroup, ClientError> {
        let config = ConsumerConfigBuilder::new()
            .client_config(self.config.clone())
            .group_id(group_id)
            .start_offset(start_offset)
            .build();
        KafkaConsumerGroup::new(&config, metrics)
    }

    pub fn producer(&self) -> Result<KafkaProducer, ClientError> {
        let config = ProducerConfigBuilder::new()
            .client_config(self.config.clone())
            .build();
        KafkaProducer::new(&config)
    }

    pub fn admin(&self) -> Result<AdminClient, ClientError> {
        AdminClient::new(&self.config)
    }
}
