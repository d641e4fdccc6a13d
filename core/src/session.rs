//! Consumer-group session loop
//!
//! The coordinator waits for a generation, captures its drain targets, runs
//! one [`ClaimProcessor`] per claimed partition and waits for all of them
//! before asking for the next generation. A rebalance is the normal way for a
//! generation to end and simply loops; a fatal group error or a failing
//! worker ends the session with an error.

use crate::flow::FlowController;
use crate::processor::{ClaimProcessor, ClaimSummary, ProcessorContext};
use crate::{KafkacliError, Result};
use kafkacli_client::{ClaimedPartition, ConsumerGroup, Generation, GenerationId, TopicPartition};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct SessionCoordinator {
    group: Arc<dyn ConsumerGroup>,
    topics: Vec<String>,
    context: Arc<ProcessorContext>,
    flow: Arc<FlowController>,
    cancel: CancellationToken,
    current: watch::Sender<Option<GenerationId>>,
}

impl SessionCoordinator {
    pub fn new(
        group: Arc<dyn ConsumerGroup>,
        topics: Vec<String>,
        context: Arc<ProcessorContext>,
        flow: Arc<FlowController>,
        cancel: CancellationToken,
    ) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            group,
            topics,
            context,
            flow,
            cancel,
            current,
        }
    }

    /// Id of the generation being served, `None` between generations
    pub fn generations(&self) -> watch::Receiver<Option<GenerationId>> {
        self.current.subscribe()
    }

    /// Serve generations until cancelled
    pub async fn run(self) -> Result<()> {
        let mut served = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = self.group.next_generation(&self.topics) => next,
            };

            let generation = match next {
                Ok(generation) => generation,
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Consumer group session failed");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(error = %e, "Failed to obtain claims, retrying");
                    continue;
                }
            };

            if served == 0 {
                if let Err(e) = self.context.display.line("Consumer up and running!...") {
                    warn!(error = %e, "Failed to write banner");
                }
            }
            served += 1;

            self.serve(generation).await?;
        }

        info!(generations = served, "Session stopped");
        Ok(())
    }

    /// Snapshot the drain target of a claim: its watermarks, which are
    /// required, and where its first fetch starts, which is best effort.
    async fn capture(&self, partition: TopicPartition) -> Result<ClaimedPartition> {
        let watermarks = self.group.watermarks(&partition).await.map_err(|e| {
            KafkacliError::fatal(format!(
                "Failed to fetch watermarks for {}: {}",
                partition, e
            ))
        })?;

        let claim = ClaimedPartition::new(partition, Some(watermarks));
        match self.group.start_position(&claim.partition, watermarks).await {
            Ok(position) => Ok(claim.with_position(position)),
            Err(e) => {
                warn!(partition = %claim.partition, error = %e, "Failed to resolve start position");
                Ok(claim)
            }
        }
    }

    async fn serve(&self, generation: Generation) -> Result<()> {
        let Generation {
            id,
            assignments,
            revoked,
        } = generation;

        let mut claims = Vec::with_capacity(assignments.len());
        let mut sequences = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let claim = match &self.context.tracker {
                Some(_) => self.capture(assignment.partition).await?,
                None => ClaimedPartition::new(assignment.partition, None),
            };
            claims.push(claim);
            sequences.push(assignment.messages);
        }

        if let Some(tracker) = &self.context.tracker {
            tracker.arm(id, &claims);
        }
        if let Err(e) = self.flow.reapply() {
            warn!(error = %e, "Failed to keep consumption paused");
        }

        info!(generation = id, claims = claims.len(), "Generation started");
        self.current.send_replace(Some(id));

        let workers_cancel = self.cancel.child_token();
        let mut workers = JoinSet::new();
        for (claim, messages) in claims.into_iter().zip(sequences) {
            let processor =
                ClaimProcessor::new(Arc::clone(&self.context), id, claim, workers_cancel.clone());
            workers.spawn(processor.run(messages));
        }

        let mut failure: Option<KafkacliError> = None;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = revoked.cancelled() => {
                    info!(generation = id, "Generation revoked");
                    break;
                }
                joined = workers.join_next(), if !workers.is_empty() => {
                    match joined.map(flatten) {
                        Some(Err(e)) => {
                            error!(generation = id, error = %e, "Claim processor failed");
                            failure = Some(e);
                            break;
                        }
                        Some(Ok(())) | None => {}
                    }
                }
            }
        }

        // Barrier: no claim of this generation outlives it.
        workers_cancel.cancel();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = flatten(joined) {
                match failure {
                    None => failure = Some(e),
                    Some(_) => warn!(generation = id, error = %e, "Claim processor failed"),
                }
            }
        }

        self.current.send_replace(None);
        debug!(generation = id, "Generation ended");

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn flatten(joined: std::result::Result<Result<ClaimSummary>, JoinError>) -> Result<()> {
    match joined {
        Ok(Ok(summary)) => {
            debug!(
                partition = %summary.partition,
                delivered = summary.delivered,
                filtered = summary.filtered,
                last_offset = ?summary.last_offset,
                ended = ?summary.ended,
                "Claim joined"
            );
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(e) => Err(e.into()),
    }
}
