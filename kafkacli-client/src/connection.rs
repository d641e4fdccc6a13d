//! librdkafka connection settings derived from the client configuration

use crate::config::{ClientConfig, ConsumerConfig, ProducerConfig};
use crate::error::ClientError;
use rdkafka::config::ClientConfig as RdKafkaConfig;
use std::path::Path;
use tracing::debug;

/// Base settings common to every librdkafka handle
pub fn base_config(config: &ClientConfig) -> Result<RdKafkaConfig, ClientError> {
    if config.brokers.is_empty() {
        return Err(ClientError::invalid_config(
            "At least one broker must be specified",
        ));
    }

    let mut rd = RdKafkaConfig::new();
    rd.set("bootstrap.servers", config.brokers.join(","));

    if let Some(client_id) = &config.client_id {
        rd.set("client.id", client_id);
    }

    let security = &config.security_config;
    if security.tls_enabled() {
        rd.set("security.protocol", "ssl");
        if let Some(ca) = &security.ca_path {
            rd.set("ssl.ca.location", path_str(ca)?);
        }
        if let Some(cert) = &security.cert_path {
            rd.set("ssl.certificate.location", path_str(cert)?);
        }
        if let Some(key) = &security.key_path {
            rd.set("ssl.key.location", path_str(key)?);
        }
    }

    debug!(brokers = %config.brokers.join(","), tls = security.tls_enabled(), "client settings");
    Ok(rd)
}

/// Settings for a group consumer that stores offsets explicitly and lets
/// librdkafka commit them in the background.
pub fn consumer_config(config: &ConsumerConfig) -> Result<RdKafkaConfig, ClientError> {
    if config.group_id.is_empty() {
        return Err(ClientError::invalid_config("A consumer group id is required"));
    }

    let mut rd = base_config(&config.client_config)?;
    rd.set("group.id", &config.group_id)
        .set("enable.auto.commit", "true")
        .set("enable.auto.offset.store", "false")
        .set(
            "auto.commit.interval.ms",
            config.auto_commit_interval.as_millis().to_string(),
        )
        .set("auto.offset.reset", config.start_offset.as_str())
        .set(
            "session.timeout.ms",
            config.session_timeout.as_millis().to_string(),
        )
        .set("partition.assignment.strategy", "range,roundrobin")
        .set("enable.partition.eof", "false");
    Ok(rd)
}

/// Settings for a synchronous-style producer
pub fn producer_config(config: &ProducerConfig) -> Result<RdKafkaConfig, ClientError> {
    let mut rd = base_config(&config.client_config)?;
    rd.set("acks", &config.acks)
        .set("retries", config.retries.to_string())
        .set(
            "message.timeout.ms",
            config.delivery_timeout.as_millis().to_string(),
        );
    Ok(rd)
}

fn path_str(path: &Path) -> Result<&str, ClientError> {
    path.to_str().ok_or_else(|| {
        ClientError::invalid_config(format!("Path is not valid UTF-8: {}", path.display()))
    })
}
