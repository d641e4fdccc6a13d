//! Run configuration
//!
//! Each command gets one immutable configuration value, built once from the
//! command line layered over [`EnvDefaults`], and passed explicitly to every
//! component.

mod settings;

use crate::display::DisplayMode;
use crate::filter::FilterChain;
use crate::processor::FilteredOffsetPolicy;
use crate::shutdown::DrainTimeoutPolicy;
use bytes::Bytes;
use kafkacli_client::{ClientConfig, MessageHeader, StartOffset};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_BROKER: &str = "localhost:9092";
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Defaults read from `KAFKACLI_*` environment variables. Command line flags
/// take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EnvDefaults {
    /// `KAFKACLI_BROKERS`, comma-separated
    pub brokers: Option<String>,
    pub ssl_cafile: Option<PathBuf>,
    pub ssl_certfile: Option<PathBuf>,
    pub ssl_keyfile: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConsumeConfig {
    pub client: ClientConfig,
    pub topics: Vec<String>,
    pub group_id: String,
    pub start_offset: StartOffset,
    /// Stop once every claimed partition is drained to its snapshot
    pub exit_on_drain: bool,
    pub display_mode: DisplayMode,
    pub filters: FilterChain,
    pub filtered_offsets: FilteredOffsetPolicy,
    pub drain_timeout: Duration,
    pub on_drain_timeout: DrainTimeoutPolicy,
}

impl ConsumeConfig {
    pub fn new(client: ClientConfig, topics: Vec<String>, group_id: String) -> Self {
        Self {
            client,
            topics,
            group_id,
            start_offset: StartOffset::Latest,
            exit_on_drain: false,
            display_mode: DisplayMode::Compact,
            filters: FilterChain::default(),
            filtered_offsets: FilteredOffsetPolicy::Skip,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            on_drain_timeout: DrainTimeoutPolicy::ForceClose,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProduceConfig {
    pub client: ClientConfig,
    pub topics: Vec<String>,
    pub headers: Vec<MessageHeader>,
    /// Sent only when given
    pub key: Option<Bytes>,
    /// Payload from `-m`; `None` or `-` reads standard input
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConsumerGroupsConfig {
    pub client: ClientConfig,
    pub sorted: bool,
}

/// Split every value on `,`, trim the parts and drop empty ones
pub fn split_flatten<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .flat_map(|value| {
            value
                .as_ref()
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Group id used when none is given: `kafkacli-<hostname>-<uuid>`
pub fn generate_group_id() -> String {
    format!("kafkacli-{}-{}", local_hostname(), Uuid::new_v4())
}

fn local_hostname() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_flatten() {
        let values = vec!["a:9092,b:9092", " c:9092 ", "", "d:9092,,"];
        assert_eq!(
            split_flatten(values),
            vec!["a:9092", "b:9092", "c:9092", "d:9092"]
        );
        assert!(split_flatten(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_generated_group_ids_differ() {
        let first = generate_group_id();
        let second = generate_group_id();

        assert!(first.starts_with("kafkacli-"));
        assert!(!second.is_empty());
        assert_ne!(first, second);
    }

    #[test]
    fn test_group_id_carries_hostname() {
        let host = hostname::get().unwrap().to_string_lossy().into_owned();
        let group_id = generate_group_id();

        assert!(group_id.starts_with(&format!("kafkacli-{}-", host)));
        let uuid = &group_id[group_id.len() - 36..];
        assert!(Uuid::parse_str(uuid).is_ok());
    }
}
