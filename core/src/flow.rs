//! Pause/resume of consumption across every claimed partition

use kafkacli_client::ConsumerGroup;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Running,
    Paused,
}

/// Toggles fetching for the whole claim set. Messages already fetched are
/// still delivered while paused.
pub struct FlowController {
    group: Arc<dyn ConsumerGroup>,
    paused: Mutex<bool>,
}

impl FlowController {
    pub fn new(group: Arc<dyn ConsumerGroup>) -> Self {
        Self {
            group,
            paused: Mutex::new(false),
        }
    }

    /// Flip between paused and running. The state only changes when the
    /// client call succeeds. Concurrent toggles are serialized.
    pub fn toggle(&self) -> kafkacli_client::Result<FlowState> {
        let mut paused = self.paused.lock();
        if *paused {
            self.group.resume_all()?;
            *paused = false;
            info!("Resuming consumption");
            Ok(FlowState::Running)
        } else {
            self.group.pause_all()?;
            *paused = true;
            info!("Pausing consumption");
            Ok(FlowState::Paused)
        }
    }

    /// Re-issue the pause for claims of a new generation
    pub fn reapply(&self) -> kafkacli_client::Result<()> {
        let paused = self.paused.lock();
        if *paused {
            self.group.pause_all()?;
            info!("Consumption still paused after rebalance");
        }
        Ok(())
    }

    pub fn state(&self) -> FlowState {
        if *self.paused.lock() {
            FlowState::Paused
        } else {
            FlowState::Running
        }
    }
}
