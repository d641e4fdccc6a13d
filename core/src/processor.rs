//! Per-partition claim processing
//!
//! One [`ClaimProcessor`] runs for each claimed partition of a generation. It
//! reads the partition's messages in offset order and, for each one, applies
//! the filter chain, renders accepted messages, marks their offsets and
//! reports them to the drain tracker. All side effects of a partition happen
//! on its own task, one message at a time.

use crate::completion::{CompletionTracker, DrainProgress};
use crate::display::MessageDisplay;
use crate::filter::FilterChain;
use crate::Result;
use kafkacli_client::{
    ClaimedPartition, ConsumerGroup, DeliveryMetrics, GenerationId, Message, Offset,
    TopicPartition,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What happens to the offset of a message rejected by the filter chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilteredOffsetPolicy {
    /// Leave it unmarked; it is evaluated again after a restart
    #[default]
    Skip,
    /// Mark it like a delivered message
    Commit,
}

/// Run-wide collaborators shared by every claim processor
pub struct ProcessorContext {
    pub group: Arc<dyn ConsumerGroup>,
    pub filters: FilterChain,
    pub display: MessageDisplay,
    /// Present only when the run exits on drain
    pub tracker: Option<Arc<CompletionTracker>>,
    pub metrics: Arc<DeliveryMetrics>,
    pub filtered_offsets: FilteredOffsetPolicy,
}

/// Why a claim processor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimEnd {
    /// The message sequence ended because the generation was revoked
    Revoked,
    /// The shared cancellation was observed
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSummary {
    pub partition: TopicPartition,
    pub delivered: u64,
    pub filtered: u64,
    pub last_offset: Option<Offset>,
    pub ended: ClaimEnd,
}

pub struct ClaimProcessor {
    context: Arc<ProcessorContext>,
    generation: GenerationId,
    claim: ClaimedPartition,
    cancel: CancellationToken,
}

impl ClaimProcessor {
    pub fn new(
        context: Arc<ProcessorContext>,
        generation: GenerationId,
        claim: ClaimedPartition,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            context,
            generation,
            claim,
            cancel,
        }
    }

    /// Process messages until the sequence ends or cancellation is observed.
    /// At most the message already received is finished after cancellation.
    pub async fn run(self, mut messages: mpsc::Receiver<Message>) -> Result<ClaimSummary> {
        let partition = self.claim.partition.clone();
        info!(
            %partition,
            generation = self.generation,
            high_water_mark = ?self.claim.high_water_mark(),
            "Claim started"
        );

        let mut delivered = 0u64;
        let mut filtered = 0u64;
        let mut last_offset = None;

        let ended = loop {
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break ClaimEnd::Cancelled,
                next = messages.recv() => match next {
                    Some(message) => message,
                    None => break ClaimEnd::Revoked,
                },
            };

            if self.process(&message)? {
                delivered += 1;
            } else {
                filtered += 1;
            }
            last_offset = Some(message.offset);
        };

        info!(%partition, delivered, filtered, ?ended, "Claim ended");
        Ok(ClaimSummary {
            partition,
            delivered,
            filtered,
            last_offset,
            ended,
        })
    }

    /// Returns whether the message passed the filter chain. Only a failure to
    /// write the rendered message is an error.
    fn process(&self, message: &Message) -> Result<bool> {
        let ctx = &self.context;

        if !ctx.filters.accepts(message) {
            ctx.metrics.record_filtered();
            debug!(partition = %self.claim.partition, offset = message.offset, "Filtered out");
            if ctx.filtered_offsets == FilteredOffsetPolicy::Commit {
                self.mark(message.offset);
            }
            return Ok(false);
        }

        ctx.display.show(message)?;
        ctx.metrics.record_delivered();
        self.mark(message.offset);

        if let Some(tracker) = &ctx.tracker {
            match tracker.record(self.generation, &self.claim.partition, message.offset) {
                DrainProgress::PartitionDrained { remaining } => {
                    info!(partition = %self.claim.partition, remaining, "Partition drained")
                }
                DrainProgress::Completed => info!("All claimed partitions drained"),
                DrainProgress::Pending { .. } | DrainProgress::Untracked => {}
            }
        }

        Ok(true)
    }

    fn mark(&self, offset: Offset) {
        let ctx = &self.context;
        match ctx.group.mark(&self.claim.partition, offset) {
            Ok(()) => ctx.metrics.record_marked(),
            Err(e) => {
                ctx.metrics.record_mark_error();
                warn!(partition = %self.claim.partition, offset, error = %e, "Failed to mark offset");
            }
        }
    }
}
