//! Cluster-level queries

use crate::config::ClientConfig;
use crate::connection;
use crate::error::ClientError;
use rdkafka::consumer::{BaseConsumer, Consumer};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Read-only administrative client
pub struct AdminClient {
    consumer: Arc<BaseConsumer>,
    request_timeout: Duration,
}

impl AdminClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let consumer: BaseConsumer = connection::base_config(config)?.create()?;
        Ok(Self {
            consumer: Arc::new(consumer),
            request_timeout: config.request_timeout,
        })
    }

    /// Names of every consumer group known to the cluster, in broker order
    pub async fn list_consumer_groups(&self) -> Result<Vec<String>, ClientError> {
        let consumer = Arc::clone(&self.consumer);
        let timeout = self.request_timeout;

        let groups = tokio::task::spawn_blocking(move || {
            consumer
                .fetch_group_list(None, timeout)
                .map(|list| {
                    list.groups()
                        .iter()
                        .map(|group| group.name().to_string())
                        .collect::<Vec<_>>()
                })
        })
        .await??;

        debug!(count = groups.len(), "Fetched consumer groups");
        Ok(groups)
    }
}
