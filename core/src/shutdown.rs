//! Termination handling for the consume command
//!
//! [`ShutdownCoordinator::supervise`] waits on every termination source at
//! once: operator signals, drain completion and the session task itself.
//! Pause toggles are served inline. On the first termination it raises the
//! shared cancellation, waits for the session and its claim processors to
//! stop (bounded by the drain timeout), then closes the group connection.

use crate::flow::FlowController;
use crate::{KafkacliError, Result};
use kafkacli_client::ConsumerGroup;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Events raised by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorSignal {
    Terminate,
    ToggleFlow,
}

/// Why a consume run stopped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Signal,
    Drained,
    SessionEnded,
}

/// What to do when claim processors outlive the drain timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DrainTimeoutPolicy {
    /// Abort the remaining workers, close the connection and exit normally
    #[default]
    ForceClose,
    /// Abort the remaining workers, close the connection and report an error
    Fail,
}

pub struct ShutdownCoordinator {
    cancel: CancellationToken,
    drain_timeout: Duration,
    on_timeout: DrainTimeoutPolicy,
}

impl ShutdownCoordinator {
    pub fn new(
        cancel: CancellationToken,
        drain_timeout: Duration,
        on_timeout: DrainTimeoutPolicy,
    ) -> Self {
        Self {
            cancel,
            drain_timeout,
            on_timeout,
        }
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn supervise(
        &self,
        mut session: JoinHandle<Result<()>>,
        group: Arc<dyn ConsumerGroup>,
        flow: Arc<FlowController>,
        drained: Option<CancellationToken>,
        mut signals: mpsc::Receiver<OperatorSignal>,
    ) -> Result<Termination> {
        let drained_wait = async {
            match &drained {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(drained_wait);

        let mut signals_open = true;
        let mut session_result = None;

        let termination = loop {
            tokio::select! {
                biased;
                joined = &mut session => {
                    let outcome = joined.map_err(KafkacliError::from).and_then(|r| r);
                    let termination = match &outcome {
                        Ok(()) => {
                            info!("Terminating: session ended");
                            Termination::SessionEnded
                        }
                        Err(e) => {
                            error!(error = %e, "Terminating: fatal error");
                            Termination::SessionEnded
                        }
                    };
                    session_result = Some(outcome);
                    break termination;
                }
                _ = &mut drained_wait => {
                    info!("Terminating: all claimed partitions drained");
                    break Termination::Drained;
                }
                signal = signals.recv(), if signals_open => match signal {
                    Some(OperatorSignal::Terminate) => {
                        info!("Terminating: via signal");
                        break Termination::Signal;
                    }
                    Some(OperatorSignal::ToggleFlow) => {
                        if let Err(e) = flow.toggle() {
                            warn!(error = %e, "Failed to toggle consumption");
                        }
                    }
                    None => signals_open = false,
                },
            }
        };

        self.cancel.cancel();

        let mut failure = None;
        let outcome = match session_result {
            Some(outcome) => outcome,
            None => match tokio::time::timeout(self.drain_timeout, &mut session).await {
                Ok(joined) => joined.map_err(KafkacliError::from).and_then(|r| r),
                Err(_) => {
                    warn!(
                        timeout = ?self.drain_timeout,
                        policy = ?self.on_timeout,
                        "Claim processors still running, aborting them"
                    );
                    session.abort();
                    let _ = session.await;
                    if self.on_timeout == DrainTimeoutPolicy::Fail {
                        failure = Some(KafkacliError::DrainTimeout(self.drain_timeout));
                    }
                    Ok(())
                }
            },
        };
        if let Err(e) = outcome {
            failure.get_or_insert(e);
        }

        self.close_connection(group.as_ref()).await;

        match failure {
            Some(e) => Err(e),
            None => Ok(termination),
        }
    }

    /// Close the group connection. Closing twice is logged, not an error.
    pub async fn close_connection(&self, group: &dyn ConsumerGroup) {
        match group.close().await {
            Ok(()) => info!("Consumer connection closed"),
            Err(e) if e.is_closed() => warn!("Consumer connection already closed"),
            Err(e) => error!(error = %e, "Error while closing consumer"),
        }
    }
}
