//! Drain tracking for `consume --exit`
//!
//! When a generation starts, the high-water mark of every claimed partition is
//! recorded. A partition is drained once the message just below its mark has
//! been delivered; when every partition of the generation is drained the
//! tracker fires its token, exactly once per run.
//!
//! The marks are a snapshot and are never refreshed: messages produced after
//! the generation started are not waited for.

use kafkacli_client::{ClaimedPartition, GenerationId, Offset, TopicPartition};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Outcome of recording one delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainProgress {
    /// No snapshot for this generation or partition
    Untracked,
    /// The partition still has messages below its mark, or was already drained
    Pending { remaining: usize },
    /// This message drained its partition; others are still pending
    PartitionDrained { remaining: usize },
    /// This message drained the last pending partition
    Completed,
}

#[derive(Debug)]
struct DrainSnapshot {
    generation: GenerationId,
    targets: HashMap<TopicPartition, Offset>,
    drained: HashSet<TopicPartition>,
    remaining: usize,
}

#[derive(Debug, Default)]
pub struct CompletionTracker {
    snapshot: Mutex<Option<DrainSnapshot>>,
    drained: CancellationToken,
    signalled: AtomicBool,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the drain targets with those of a new generation.
    ///
    /// Claims without watermarks are not tracked. Partitions with nothing left
    /// below their mark (empty, or starting at or past it) count as drained
    /// immediately, so a generation made only of those completes here.
    pub fn arm(&self, generation: GenerationId, claims: &[ClaimedPartition]) -> DrainProgress {
        let mut targets = HashMap::new();
        let mut drained = HashSet::new();

        for claim in claims {
            let Some(watermarks) = claim.watermarks else {
                continue;
            };
            if claim.is_caught_up() {
                drained.insert(claim.partition.clone());
            } else {
                targets.insert(claim.partition.clone(), watermarks.high);
            }
        }

        let remaining = targets.len();
        let tracked = remaining + drained.len();
        debug!(generation, tracked, remaining, "Drain targets captured");

        *self.snapshot.lock() = Some(DrainSnapshot {
            generation,
            targets,
            drained,
            remaining,
        });

        if tracked > 0 && remaining == 0 {
            return self.complete();
        }
        DrainProgress::Pending { remaining }
    }

    /// Record a delivered message.
    ///
    /// A partition drains on the first delivered offset at or past
    /// `high - 1`, not only on `high - 1` itself: a filtered or compacted tail
    /// may never deliver that exact offset.
    pub fn record(
        &self,
        generation: GenerationId,
        partition: &TopicPartition,
        offset: Offset,
    ) -> DrainProgress {
        let remaining = {
            let mut guard = self.snapshot.lock();
            let Some(snapshot) = guard.as_mut() else {
                return DrainProgress::Untracked;
            };
            if snapshot.generation != generation {
                return DrainProgress::Untracked;
            }
            let Some(&high) = snapshot.targets.get(partition) else {
                return DrainProgress::Untracked;
            };

            if offset + 1 < high || snapshot.drained.contains(partition) {
                return DrainProgress::Pending {
                    remaining: snapshot.remaining,
                };
            }

            snapshot.drained.insert(partition.clone());
            snapshot.remaining -= 1;
            snapshot.remaining
        };

        if remaining == 0 {
            return self.complete();
        }
        DrainProgress::PartitionDrained { remaining }
    }

    fn complete(&self) -> DrainProgress {
        if self.signalled.swap(true, Ordering::SeqCst) {
            return DrainProgress::Pending { remaining: 0 };
        }
        self.drained.cancel();
        DrainProgress::Completed
    }

    /// Partitions of the current generation still to drain
    pub fn remaining(&self) -> Option<usize> {
        self.snapshot.lock().as_ref().map(|s| s.remaining)
    }

    /// Token cancelled when every tracked partition has drained
    pub fn drained(&self) -> CancellationToken {
        self.drained.clone()
    }

    pub fn is_drained(&self) -> bool {
        self.drained.is_cancelled()
    }
}
