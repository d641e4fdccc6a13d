//! # kafkacli
//!
//! Consume, filter and drain Kafka topics through a consumer group, publish
//! ad-hoc messages, and list the consumer groups of a cluster.
//!
//! ## Architecture
//!
//! The consume path is built from small pieces, leaf first:
//!
//! - [`filter::FilterChain`]: pure predicate over a message, parsed from
//!   `<type>:<condition>` specs
//! - [`completion::CompletionTracker`]: drain targets captured once per
//!   generation, used by `consume --exit`
//! - [`flow::FlowController`]: pause/resume toggle over every claimed partition
//! - [`processor::ClaimProcessor`]: one task per claimed partition that
//!   filters, displays, marks and reports each message in offset order
//! - [`session::SessionCoordinator`]: group membership loop spawning a fresh
//!   set of claim processors for every generation
//! - [`shutdown::ShutdownCoordinator`]: merges operator signals, drain
//!   completion and fatal errors into one cancellation and closes the
//!   connection once every worker has stopped
//!
//! The broker side lives in the `kafkacli-client` crate behind the
//! [`kafkacli_client::ConsumerGroup`] and [`kafkacli_client::MessageSender`]
//! traits, so the whole engine runs against in-memory implementations in tests.

use kafkacli_client::ClientError;
use std::time::Duration;
use thiserror::Error;

pub mod cli;
pub mod completion;
pub mod config;
pub mod consume;
pub mod display;
pub mod filter;
pub mod flow;
pub mod groups;
pub mod processor;
pub mod produce;
pub mod session;
pub mod shutdown;
pub mod signals;

pub use completion::{CompletionTracker, DrainProgress};
pub use config::{ConsumeConfig, ConsumerGroupsConfig, EnvDefaults, ProduceConfig};
pub use display::{DisplayMode, MessageDisplay};
pub use filter::{FilterChain, FilterError, Predicate};
pub use flow::{FlowController, FlowState};
pub use processor::{ClaimProcessor, ClaimSummary, FilteredOffsetPolicy, ProcessorContext};
pub use session::SessionCoordinator;
pub use shutdown::{DrainTimeoutPolicy, OperatorSignal, ShutdownCoordinator, Termination};

/// Errors surfaced by the kafkacli commands
#[derive(Debug, Error)]
pub enum KafkacliError {
    /// Bad arguments, detected before any client is created
    #[error("{0}")]
    Validation(String),

    /// Errors from the broker client
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Writing to the output stream or reading stdin failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment defaults could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// A component failed in a way that ends the run
    #[error("{0}")]
    Fatal(String),

    /// Claim processors were still running when the drain timeout expired
    #[error("Claim processors did not stop within {0:?}")]
    DrainTimeout(Duration),

    /// A worker task panicked or was aborted
    #[error("Task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl KafkacliError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn fatal<S: Into<String>>(message: S) -> Self {
        Self::Fatal(message.into())
    }
}

impl From<FilterError> for KafkacliError {
    fn from(e: FilterError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<::config::ConfigError> for KafkacliError {
    fn from(e: ::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type alias for kafkacli operations
pub type Result<T> = std::result::Result<T, KafkacliError>;
