//! OS signal forwarding
//!
//! SIGINT and SIGTERM request termination, SIGUSR1 toggles pause/resume.
//! Only Ctrl-C is available outside unix.

use crate::shutdown::OperatorSignal;
use std::io;
use tokio::sync::mpsc;
use tracing::debug;

/// Install the handlers and forward their events until the receiver is dropped
pub fn listen() -> io::Result<mpsc::Receiver<OperatorSignal>> {
    let (tx, rx) = mpsc::channel(8);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut toggle = signal(SignalKind::user_defined1())?;

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = interrupt.recv() => OperatorSignal::Terminate,
                    _ = terminate.recv() => OperatorSignal::Terminate,
                    _ = toggle.recv() => OperatorSignal::ToggleFlow,
                };
                debug!(?event, "Operator signal");
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                debug!("Operator signal: Ctrl-C");
                if tx.send(OperatorSignal::Terminate).await.is_err() {
                    break;
                }
            }
        });
    }

    Ok(rx)
}
