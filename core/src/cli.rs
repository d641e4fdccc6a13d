//! Command line interface

use crate::config::{
    generate_group_id, split_flatten, ConsumeConfig, ConsumerGroupsConfig, EnvDefaults,
    ProduceConfig, DEFAULT_BROKER,
};
use crate::display::DisplayMode;
use crate::filter::FilterChain;
use crate::processor::FilteredOffsetPolicy;
use crate::produce::parse_header;
use crate::shutdown::DrainTimeoutPolicy;
use crate::{KafkacliError, Result};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use kafkacli_client::{ClientConfig, ClientConfigBuilder, SecurityConfig, StartOffset};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "kafkacli")]
#[command(version, about = "Consume, filter, drain and produce Kafka messages")]
pub struct Cli {
    /// Broker address; repeatable and comma-separated [env: KAFKACLI_BROKERS]
    #[arg(short = 'b', long = "broker", visible_alias = "brokers", value_name = "HOST:PORT")]
    pub brokers: Vec<String>,

    /// Connect over TLS
    #[arg(short = 's', long)]
    pub secure: bool,

    /// CA file used to verify the brokers (PEM) [env: KAFKACLI_SSL_CAFILE]
    #[arg(long, value_name = "FILE")]
    pub ssl_cafile: Option<PathBuf>,

    /// Client certificate (PEM) [env: KAFKACLI_SSL_CERTFILE]
    #[arg(long, value_name = "FILE")]
    pub ssl_certfile: Option<PathBuf>,

    /// Client private key (PEM) [env: KAFKACLI_SSL_KEYFILE]
    #[arg(long, value_name = "FILE")]
    pub ssl_keyfile: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error [env: KAFKACLI_LOG_LEVEL]
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Consume messages through a consumer group
    Consume(ConsumeArgs),
    /// Send one message to each topic
    Produce(ProduceArgs),
    /// List the consumer groups of the cluster
    ConsumerGroups(ConsumerGroupsArgs),
}

#[derive(Args, Debug)]
pub struct ConsumeArgs {
    /// Start with the earliest message when the group has no committed offset
    #[arg(long)]
    pub from_beginning: bool,

    /// Consumer group id; a random one is generated when unset
    #[arg(short = 'g', long = "consumer-group", value_name = "GROUP")]
    pub group: Option<String>,

    /// Exit once every claimed partition reached its high-water mark
    #[arg(short = 'e', long = "exit")]
    pub exit: bool,

    /// Pretty print the messages
    #[arg(short = 'p', long = "pretty-print")]
    pub pretty: bool,

    /// Filter messages, e.g. --filter header:correlation-id=ac123-fds456
    #[arg(long = "filter", value_name = "TYPE:CONDITION")]
    pub filters: Vec<String>,

    /// Also commit the offsets of messages rejected by the filters
    #[arg(long)]
    pub commit_filtered: bool,

    /// Seconds to wait for claim processors on shutdown
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub drain_timeout: u64,

    /// What to do when the drain timeout expires
    #[arg(long, value_enum, default_value_t = DrainTimeoutPolicy::ForceClose)]
    pub on_drain_timeout: DrainTimeoutPolicy,

    /// Topic(s) to consume from; comma-separated values are split
    #[arg(value_name = "TOPIC", required = true)]
    pub topics: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ProduceArgs {
    /// Message header
    #[arg(short = 'H', long = "header", value_name = "KEY=VALUE")]
    pub headers: Vec<String>,

    /// Message payload; read from standard input when omitted or `-`
    #[arg(short = 'm', long = "message", value_name = "MESSAGE|-")]
    pub message: Option<String>,

    /// Message key
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,

    /// Topic(s) to send to; comma-separated values are split
    #[arg(value_name = "TOPIC", required = true)]
    pub topics: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ConsumerGroupsArgs {
    /// Sort the consumer groups (ascending)
    #[arg(short = 's', long)]
    pub sorted: bool,
}

/// A fully validated command, ready to run
#[derive(Debug)]
pub enum Command {
    Consume(ConsumeConfig),
    Produce(ProduceConfig),
    ConsumerGroups(ConsumerGroupsConfig),
}

impl Cli {
    pub fn log_level(&self, env: &EnvDefaults) -> String {
        self.log_level
            .clone()
            .or_else(|| env.log_level.clone())
            .unwrap_or_else(|| "info".to_string())
    }

    /// Connection settings: flags first, then the environment, then defaults
    pub fn client_config(&self, env: &EnvDefaults) -> Result<ClientConfig> {
        let mut brokers = split_flatten(&self.brokers);
        if brokers.is_empty() {
            brokers = split_flatten(env.brokers.iter());
        }
        if brokers.is_empty() {
            brokers.push(DEFAULT_BROKER.to_string());
        }

        let security = SecurityConfig {
            enable_tls: self.secure,
            ca_path: self.ssl_cafile.clone().or_else(|| env.ssl_cafile.clone()),
            cert_path: self.ssl_certfile.clone().or_else(|| env.ssl_certfile.clone()),
            key_path: self.ssl_keyfile.clone().or_else(|| env.ssl_keyfile.clone()),
        };
        if security.cert_path.is_some() != security.key_path.is_some() {
            return Err(KafkacliError::validation(
                "You need to specify both ssl-certfile and ssl-keyfile",
            ));
        }

        Ok(ClientConfigBuilder::new()
            .brokers(brokers)
            .security_config(security)
            .build())
    }

    /// Validate every argument and build the command configuration. No
    /// network activity happens here.
    pub fn into_command(self, env: &EnvDefaults) -> Result<Command> {
        let client = self.client_config(env)?;

        match self.command {
            Commands::Consume(args) => args.into_config(client).map(Command::Consume),
            Commands::Produce(args) => args.into_config(client).map(Command::Produce),
            Commands::ConsumerGroups(args) => Ok(Command::ConsumerGroups(ConsumerGroupsConfig {
                client,
                sorted: args.sorted,
            })),
        }
    }
}

fn topics(values: &[String]) -> Result<Vec<String>> {
    let topics = split_flatten(values);
    if topics.is_empty() {
        return Err(KafkacliError::validation("At least one topic is required"));
    }
    Ok(topics)
}

impl ConsumeArgs {
    pub fn into_config(self, client: ClientConfig) -> Result<ConsumeConfig> {
        let filters = FilterChain::parse(&self.filters)?;
        let topics = topics(&self.topics)?;
        let group_id = self
            .group
            .filter(|g| !g.is_empty())
            .unwrap_or_else(generate_group_id);

        let mut config = ConsumeConfig::new(client, topics, group_id);
        config.filters = filters;
        config.exit_on_drain = self.exit;
        config.drain_timeout = Duration::from_secs(self.drain_timeout);
        config.on_drain_timeout = self.on_drain_timeout;
        if self.from_beginning {
            config.start_offset = StartOffset::Earliest;
        }
        if self.pretty {
            config.display_mode = DisplayMode::Pretty;
        }
        if self.commit_filtered {
            config.filtered_offsets = FilteredOffsetPolicy::Commit;
        }
        Ok(config)
    }
}

impl ProduceArgs {
    pub fn into_config(self, client: ClientConfig) -> Result<ProduceConfig> {
        let headers = self
            .headers
            .iter()
            .map(|spec| parse_header(spec))
            .collect::<Result<Vec<_>>>()?;

        Ok(ProduceConfig {
            client,
            topics: topics(&self.topics)?,
            headers,
            key: self.key.map(Bytes::from),
            message: self.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kafkacli_client::MessageHeader;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("kafkacli").chain(args.iter().copied())).unwrap()
    }

    fn command(args: &[&str]) -> Result<Command> {
        parse(args).into_command(&EnvDefaults::default())
    }

    #[test]
    fn test_consume_flags() {
        let Command::Consume(config) = command(&[
            "-b",
            "k1:9092,k2:9092",
            "consume",
            "--from-beginning",
            "-g",
            "audit",
            "-e",
            "-p",
            "--filter",
            "h:trace=abc",
            "orders,payments",
            "refunds",
        ])
        .unwrap() else {
            panic!("expected consume");
        };

        assert_eq!(config.client.brokers, vec!["k1:9092", "k2:9092"]);
        assert_eq!(config.topics, vec!["orders", "payments", "refunds"]);
        assert_eq!(config.group_id, "audit");
        assert_eq!(config.start_offset, StartOffset::Earliest);
        assert!(config.exit_on_drain);
        assert_eq!(config.display_mode, DisplayMode::Pretty);
        assert_eq!(config.filters.len(), 1);
        assert_eq!(config.filtered_offsets, FilteredOffsetPolicy::Skip);
        assert_eq!(config.drain_timeout, Duration::from_secs(30));
        assert_eq!(config.on_drain_timeout, DrainTimeoutPolicy::ForceClose);
    }

    #[test]
    fn test_consume_defaults() {
        let Command::Consume(config) = command(&["consume", "orders"]).unwrap() else {
            panic!("expected consume");
        };

        assert_eq!(config.client.brokers, vec![DEFAULT_BROKER]);
        assert!(config.group_id.starts_with("kafkacli-"));
        assert_eq!(config.start_offset, StartOffset::Latest);
        assert_eq!(config.display_mode, DisplayMode::Compact);
        assert!(config.filters.is_empty());
        assert!(!config.client.security_config.tls_enabled());
    }

    #[test]
    fn test_drain_timeout_policy() {
        let Command::Consume(config) = command(&[
            "consume",
            "--drain-timeout",
            "5",
            "--on-drain-timeout",
            "fail",
            "--commit-filtered",
            "orders",
        ])
        .unwrap() else {
            panic!("expected consume");
        };

        assert_eq!(config.drain_timeout, Duration::from_secs(5));
        assert_eq!(config.on_drain_timeout, DrainTimeoutPolicy::Fail);
        assert_eq!(config.filtered_offsets, FilteredOffsetPolicy::Commit);
    }

    #[test]
    fn test_malformed_filter_rejected() {
        let err = command(&["consume", "--filter", "header:trace", "orders"]).unwrap_err();
        assert!(matches!(err, KafkacliError::Validation(_)));
        assert!(err.to_string().contains("header:trace"));
    }

    #[test]
    fn test_topics_required() {
        assert!(Cli::try_parse_from(["kafkacli", "consume"]).is_err());
        assert!(command(&["consume", ","]).is_err());
    }

    #[test]
    fn test_produce_flags() {
        let Command::Produce(config) = command(&[
            "produce", "-H", "a=1", "-H", "b=2", "-m", "hello", "-k", "user-1", "T1,T2",
        ])
        .unwrap() else {
            panic!("expected produce");
        };

        assert_eq!(config.topics, vec!["T1", "T2"]);
        assert_eq!(
            config.headers,
            vec![MessageHeader::new("a", "1"), MessageHeader::new("b", "2")]
        );
        assert_eq!(config.key, Some(Bytes::from("user-1")));
        assert_eq!(config.message.as_deref(), Some("hello"));
    }

    #[test]
    fn test_produce_bad_header() {
        let err = command(&["produce", "-H", "a=1=2", "-m", "x", "T1"]).unwrap_err();
        assert!(matches!(err, KafkacliError::Validation(_)));
    }

    #[test]
    fn test_consumer_groups_sorted() {
        let Command::ConsumerGroups(config) = command(&["consumer-groups", "-s"]).unwrap() else {
            panic!("expected consumer-groups");
        };
        assert!(config.sorted);
    }

    #[test]
    fn test_tls_flags() {
        let err = command(&["--ssl-certfile", "/c.pem", "consumer-groups"]).unwrap_err();
        assert!(err.to_string().contains("both ssl-certfile and ssl-keyfile"));

        let Command::ConsumerGroups(config) =
            command(&["-s", "--ssl-cafile", "/ca.pem", "consumer-groups"]).unwrap()
        else {
            panic!("expected consumer-groups");
        };
        assert!(config.client.security_config.enable_tls);
        assert_eq!(
            config.client.security_config.ca_path,
            Some(PathBuf::from("/ca.pem"))
        );
    }

    #[test]
    fn test_environment_defaults() {
        let env = EnvDefaults {
            brokers: Some("env1:9092,env2:9092".to_string()),
            ssl_cafile: Some(PathBuf::from("/env/ca.pem")),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        let cli = parse(&["consumer-groups"]);
        assert_eq!(cli.log_level(&env), "debug");
        let client = cli.client_config(&env).unwrap();
        assert_eq!(client.brokers, vec!["env1:9092", "env2:9092"]);
        assert!(client.security_config.tls_enabled());

        let cli = parse(&["-b", "flag:9092", "--log-level", "warn", "consumer-groups"]);
        assert_eq!(cli.log_level(&env), "warn");
        assert_eq!(cli.client_config(&env).unwrap().brokers, vec!["flag:9092"]);
    }
}
