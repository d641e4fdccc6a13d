//! Configuration types for the kafkacli client

use std::path::PathBuf;
use std::time::Duration;

/// Client configuration shared by consumers, producers and the admin client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// List of broker addresses
    pub brokers: Vec<String>,
    /// Timeout for metadata, watermark and group-list requests
    pub request_timeout: Duration,
    /// Security configuration
    pub security_config: SecurityConfig,
    /// Client identifier
    pub client_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            request_timeout: Duration::from_secs(10),
            security_config: SecurityConfig::default(),
            client_id: Some("kafkacli".to_string()),
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityConfig {
    /// Enable TLS
    pub enable_tls: bool,
    /// CA certificate used to verify the brokers (PEM)
    pub ca_path: Option<PathBuf>,
    /// Client certificate (PEM)
    pub cert_path: Option<PathBuf>,
    /// Client private key (PEM)
    pub key_path: Option<PathBuf>,
}

impl SecurityConfig {
    /// TLS is used when requested explicitly or when any TLS file is given
    pub fn tls_enabled(&self) -> bool {
        self.enable_tls
            || self.ca_path.is_some()
            || self.cert_path.is_some()
            || self.key_path.is_some()
    }
}

/// Where a group without a committed offset starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartOffset {
    Earliest,
    #[default]
    Latest,
}

impl StartOffset {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartOffset::Earliest => "earliest",
            StartOffset::Latest => "latest",
        }
    }
}

/// Consumer-specific configuration
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Base client configuration
    pub client_config: ClientConfig,
    /// Consumer group ID
    pub group_id: String,
    /// Initial offset policy
    pub start_offset: StartOffset,
    /// Session timeout for consumer groups
    pub session_timeout: Duration,
    /// Interval at which stored offsets are committed
    pub auto_commit_interval: Duration,
    /// Messages buffered per claimed partition before the fetch loop waits
    pub claim_buffer: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            client_config: ClientConfig::default(),
            group_id: String::new(),
            start_offset: StartOffset::default(),
            session_timeout: Duration::from_secs(10),
            auto_commit_interval: Duration::from_secs(1),
            claim_buffer: 256,
        }
    }
}

/// Producer-specific configuration
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Base client configuration
    pub client_config: ClientConfig,
    /// Acknowledgment level ("0", "1", "all")
    pub acks: String,
    /// Maximum number of send retries
    pub retries: u32,
    /// Delivery timeout
    pub delivery_timeout: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            client_config: ClientConfig::default(),
            acks: "all".to_string(),
            retries: 10,
            delivery_timeout: Duration::from_secs(30),
        }
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn brokers<I, S>(mut self, brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.brokers = brokers.into_iter().map(|s| s.into()).collect();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.config.client_id = Some(client_id.into());
        self
    }

    pub fn security_config(mut self, security_config: SecurityConfig) -> Self {
        self.config.security_config = security_config;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Builder for ConsumerConfig
#[derive(Debug, Default)]
pub struct ConsumerConfigBuilder {
    config: ConsumerConfig,
}

impl ConsumerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_config(mut self, client_config: ClientConfig) -> Self {
        self.config.client_config = client_config;
        self
    }

    pub fn group_id<S: Into<String>>(mut self, group_id: S) -> Self {
        self.config.group_id = group_id.into();
        self
    }

    pub fn start_offset(mut self, start_offset: StartOffset) -> Self {
        self.config.start_offset = start_offset;
        self
    }

    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    pub fn claim_buffer(mut self, capacity: usize) -> Self {
        self.config.claim_buffer = capacity.max(1);
        self
    }

    pub fn build(self) -> ConsumerConfig {
        self.config
    }
}

/// Builder for ProducerConfig
#[derive(Debug, Default)]
pub struct ProducerConfigBuilder {
    config: ProducerConfig,
}

impl ProducerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_config(mut self, client_config: ClientConfig) -> Self {
        self.config.client_config = client_config;
        self
    }

    pub fn acks<S: Into<String>>(mut self, acks: S) -> Self {
        self.config.acks = acks.into();
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.config.delivery_timeout = timeout;
        self
    }

    pub fn build(self) -> ProducerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfigBuilder::new()
            .brokers(vec!["broker1:9092", "broker2:9092"])
            .request_timeout(Duration::from_secs(3))
            .client_id("test-client")
            .build();

        assert_eq!(config.brokers, vec!["broker1:9092", "broker2:9092"]);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.client_id, Some("test-client".to_string()));
    }

    #[test]
    fn test_consumer_config_builder() {
        let config = ConsumerConfigBuilder::new()
            .group_id("test-group")
            .start_offset(StartOffset::Earliest)
            .claim_buffer(0)
            .build();

        assert_eq!(config.group_id, "test-group");
        assert_eq!(config.start_offset.as_str(), "earliest");
        assert_eq!(config.claim_buffer, 1);
    }

    #[test]
    fn test_producer_defaults_wait_for_all_replicas() {
        let config = ProducerConfigBuilder::new().build();
        assert_eq!(config.acks, "all");
        assert_eq!(config.retries, 10);
    }

    #[test]
    fn test_tls_implied_by_files() {
        let mut security = SecurityConfig::default();
        assert!(!security.tls_enabled());

        security.ca_path = Some(PathBuf::from("/etc/ssl/ca.pem"));
        assert!(security.tls_enabled());
    }
}
