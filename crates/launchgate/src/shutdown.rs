//! Shutdown signal plumbing.

use std::io;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Resolves when shutdown is signalled. Never resolves without a receiver
/// or once every sender is gone.
pub async fn signalled(shutdown: &mut Option<broadcast::Receiver<()>>) {
    if let Some(rx) = shutdown {
        match rx.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => return,
            Err(RecvError::Closed) => {}
        }
    }
    std::future::pending::<()>().await
}

/// True if a shutdown signal is already queued. Consumes it.
pub fn pending(shutdown: &mut Option<broadcast::Receiver<()>>) -> bool {
    match shutdown {
        Some(rx) => matches!(rx.try_recv(), Ok(()) | Err(TryRecvError::Lagged(_))),
        None => false,
    }
}

/// Process signals that request shutdown: SIGINT and SIGTERM.
///
/// Handlers are registered by [`Signals::install`], so nothing is missed
/// between installing and forwarding.
pub struct Signals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Signals {
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Broadcast shutdown on every signal received, not just the first
    pub async fn forward(mut self, shutdown_tx: broadcast::Sender<()>) {
        while let Some(name) = self.next().await {
            tracing::info!(signal = name, "🛑 Shutdown signal received");
            let _ = shutdown_tx.send(());
        }
    }

    #[cfg(unix)]
    async fn next(&mut self) -> Option<&'static str> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some("SIGINT"),
            Some(()) = self.terminate.recv() => Some("SIGTERM"),
            else => None,
        }
    }

    #[cfg(not(unix))]
    async fn next(&mut self) -> Option<&'static str> {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some("Ctrl+C"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                None
            }
        }
    }
}
