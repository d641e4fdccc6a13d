//! The produce command: one acknowledged send per topic

use crate::config::ProduceConfig;
use crate::{KafkacliError, Result};
use bytes::Bytes;
use kafkacli_client::{
    Delivery, DeliveryMetrics, KafkaClient, MessageHeader, MessageSender, OutgoingMessage,
};
use std::io::{self, IsTerminal, Read, Write};
use tracing::{error, info, warn};

const MISSING_PAYLOAD: &str = "a message body must be specified, either using -m=\"message content\" \
     or by piping the content: echo \"message content\" | kafkacli produce topic";

/// Parse a `key=value` header spec. The spec must contain exactly one `=`.
pub fn parse_header(spec: &str) -> Result<MessageHeader> {
    match spec.split('=').collect::<Vec<_>>().as_slice() {
        [key, value] => Ok(MessageHeader::new(key.to_string(), value.to_string())),
        _ => Err(KafkacliError::validation(format!(
            "Invalid header {:?}. must be in <key>=<value> format",
            spec
        ))),
    }
}

/// Resolve the payload: the `-m` value, or standard input when it is absent
/// or `-`. An interactive standard input is refused.
pub fn read_payload(
    message: Option<&str>,
    stdin: &mut dyn Read,
    stdin_is_terminal: bool,
) -> Result<Bytes> {
    match message {
        Some(message) if message != "-" => Ok(Bytes::copy_from_slice(message.as_bytes())),
        _ => {
            if stdin_is_terminal {
                return Err(KafkacliError::validation(MISSING_PAYLOAD));
            }
            let mut payload = Vec::new();
            stdin.read_to_end(&mut payload)?;
            Ok(Bytes::from(payload))
        }
    }
}

#[derive(Debug, Default)]
pub struct ProduceReport {
    pub delivered: Vec<(String, Delivery)>,
    pub failed: Vec<(String, String)>,
}

impl ProduceReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Send `payload` once to every configured topic, reporting each send on
/// `out`. A failed send is reported and the loop moves on to the next topic.
pub async fn produce(
    config: &ProduceConfig,
    payload: Bytes,
    sender: &dyn MessageSender,
    out: &mut (dyn Write + Send),
    metrics: &DeliveryMetrics,
) -> Result<ProduceReport> {
    let mut report = ProduceReport::default();

    for topic in &config.topics {
        let message = OutgoingMessage {
            topic: topic.clone(),
            key: config.key.clone(),
            value: payload.clone(),
            headers: config.headers.clone(),
        };

        writeln!(out, "Send msg to topic {:?}:", topic)?;
        if !message.headers.is_empty() {
            writeln!(out, "(Headers):")?;
            for header in &message.headers {
                writeln!(
                    out,
                    "- {:?}: {:?}",
                    String::from_utf8_lossy(&header.key),
                    String::from_utf8_lossy(&header.value)
                )?;
            }
        }
        writeln!(
            out,
            "(Payload):\n---\n{}\n---",
            String::from_utf8_lossy(&message.value)
        )?;

        match sender.send(&message).await {
            Ok(delivery) => {
                metrics.record_sent();
                writeln!(
                    out,
                    "Payload sent to partition {} - resulting offset {}",
                    delivery.partition, delivery.offset
                )?;
                info!(%topic, partition = delivery.partition, offset = delivery.offset, "Message sent");
                report.delivered.push((topic.clone(), delivery));
            }
            Err(e) => {
                metrics.record_send_error();
                writeln!(out, "error: {}", e)?;
                warn!(%topic, error = %e, "Send failed");
                report.failed.push((topic.clone(), e.to_string()));
            }
        }
    }

    out.flush()?;
    Ok(report)
}

pub async fn run(config: ProduceConfig) -> Result<()> {
    let stdin = io::stdin();
    let payload = read_payload(
        config.message.as_deref(),
        &mut stdin.lock(),
        stdin.is_terminal(),
    )?;

    let client = KafkaClient::new(config.client.clone())?;
    let producer = client.producer()?;
    let metrics = DeliveryMetrics::new();

    let report = produce(&config, payload, &producer, &mut io::stdout(), &metrics).await;

    if let Err(e) = producer.close().await {
        error!(error = %e, "Error while closing producer");
    }

    let report = report?;
    info!(
        sent = report.delivered.len(),
        failed = report.failed.len(),
        "Produce finished"
    );

    if !report.is_success() {
        return Err(KafkacliError::fatal(format!(
            "{} of {} sends failed",
            report.failed.len(),
            config.topics.len()
        )));
    }
    Ok(())
}
