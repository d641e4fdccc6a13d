//! Error types for the kafkacli client library

use rdkafka::error::KafkaError;

/// Main error type for broker client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Errors reported by librdkafka
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// TLS material could not be used
    #[error("TLS error: {message}")]
    Tls { message: String },

    /// Consumer group membership could not be established or kept
    #[error("Consumer group error: {message}")]
    Group { message: String },

    /// A single produce request failed
    #[error("Failed to send to topic '{topic}': {source}")]
    Send {
        topic: String,
        #[source]
        source: KafkaError,
    },

    /// A blocking client call was cancelled or panicked
    #[error("Background task failed: {message}")]
    Task { message: String },

    /// The client was already closed
    #[error("Client is closed")]
    Closed,
}

impl ClientError {
    /// Create a new invalid config error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a new TLS error
    pub fn tls<S: Into<String>>(message: S) -> Self {
        Self::Tls {
            message: message.into(),
        }
    }

    /// Create a new consumer group error
    pub fn group<S: Into<String>>(message: S) -> Self {
        Self::Group {
            message: message.into(),
        }
    }

    /// Create a new background task error
    pub fn task<S: Into<String>>(message: S) -> Self {
        Self::Task {
            message: message.into(),
        }
    }

    /// Whether this error prevents establishing or keeping group membership.
    ///
    /// Anything scoped to a single message (a send, an offset store after a
    /// revoke, a fetch error surfaced on the stream) is recoverable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Group { .. }
            | Self::InvalidConfig { .. }
            | Self::Tls { .. }
            | Self::Closed
            | Self::Task { .. } => true,
            Self::Kafka(e) => matches!(
                e,
                KafkaError::ClientCreation(_)
                    | KafkaError::ClientConfig(..)
                    | KafkaError::Subscription(_)
                    | KafkaError::Rebalance(_)
                    | KafkaError::MessageConsumptionFatal(_)
                    | KafkaError::Global(_)
            ),
            Self::Io(_) | Self::Send { .. } => false,
        }
    }

    /// Whether this is the result of closing an already closed client
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl From<tokio::task::JoinError> for ClientError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::task(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::types::RDKafkaErrorCode;

    #[test]
    fn test_membership_errors_are_fatal() {
        assert!(ClientError::group("join failed").is_fatal());
        assert!(ClientError::Kafka(KafkaError::Rebalance(RDKafkaErrorCode::Fail)).is_fatal());
        assert!(ClientError::Kafka(KafkaError::Subscription("bad topic".into())).is_fatal());
    }

    #[test]
    fn test_message_scoped_errors_are_recoverable() {
        let send = ClientError::Send {
            topic: "orders".to_string(),
            source: KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge),
        };
        assert!(!send.is_fatal());
        assert!(!ClientError::Kafka(KafkaError::StoreOffset(RDKafkaErrorCode::State)).is_fatal());
        assert!(!ClientError::Kafka(KafkaError::MessageConsumption(
            RDKafkaErrorCode::BrokerTransportFailure
        ))
        .is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::invalid_config("no brokers");
        assert_eq!(err.to_string(), "Invalid configuration: no brokers");
        assert!(ClientError::Closed.is_closed());
    }
}
