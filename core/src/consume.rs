//! The consume command: wires the session, the claim processors and the
//! shutdown coordinator together

use crate::completion::CompletionTracker;
use crate::config::ConsumeConfig;
use crate::display::MessageDisplay;
use crate::flow::FlowController;
use crate::processor::ProcessorContext;
use crate::session::SessionCoordinator;
use crate::shutdown::{OperatorSignal, ShutdownCoordinator, Termination};
use crate::{signals, Result};
use kafkacli_client::{ConsumerGroup, DeliveryMetrics, KafkaClient, MetricsSnapshot};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeReport {
    pub termination: Termination,
    pub received: u64,
    pub metrics: MetricsSnapshot,
}

/// Consume from a Kafka cluster until terminated
pub async fn run(config: ConsumeConfig) -> Result<ConsumeReport> {
    let client = KafkaClient::new(config.client.clone())?;
    let display = MessageDisplay::stdout(config.display_mode);
    display.line(&format!(
        "Consuming from topic(s) {:?}, broker(s) {:?}",
        config.topics.join(", "),
        config.client.brokers.join(", ")
    ))?;
    info!(group = %config.group_id, "Joining consumer group");

    let metrics = Arc::new(DeliveryMetrics::new());
    let group: Arc<dyn ConsumerGroup> = Arc::new(client.consumer_group(
        &config.group_id,
        config.start_offset,
        Arc::clone(&metrics),
    )?);
    let signals = signals::listen()?;

    consume(config, group, display, metrics, signals).await
}

/// Run the engine against any group implementation. Returns once the
/// connection has been closed.
pub async fn consume(
    config: ConsumeConfig,
    group: Arc<dyn ConsumerGroup>,
    display: MessageDisplay,
    metrics: Arc<DeliveryMetrics>,
    signals: mpsc::Receiver<OperatorSignal>,
) -> Result<ConsumeReport> {
    let cancel = CancellationToken::new();
    let tracker = config
        .exit_on_drain
        .then(|| Arc::new(CompletionTracker::new()));
    let drained = tracker.as_ref().map(|t| t.drained());

    let context = Arc::new(ProcessorContext {
        group: Arc::clone(&group),
        filters: config.filters,
        display,
        tracker,
        metrics: Arc::clone(&metrics),
        filtered_offsets: config.filtered_offsets,
    });
    let flow = Arc::new(FlowController::new(Arc::clone(&group)));

    let session = SessionCoordinator::new(
        Arc::clone(&group),
        config.topics,
        context,
        Arc::clone(&flow),
        cancel.clone(),
    );
    let session = tokio::spawn(session.run());

    let shutdown = ShutdownCoordinator::new(cancel, config.drain_timeout, config.on_drain_timeout);
    let outcome = shutdown
        .supervise(session, group, flow, drained, signals)
        .await;

    let received = metrics.delivered();
    info!("{} messages received", received);

    Ok(ConsumeReport {
        termination: outcome?,
        received,
        metrics: metrics.snapshot(),
    })
}
