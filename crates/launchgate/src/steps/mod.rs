//! Startup steps that run after the readiness gate opens.
//!
//! - `migrate` - Schema migration command
//! - `secrets` - Mounted credential token and namespace
//! - `launch` - Application server process

pub mod launch;
pub mod migrate;
pub mod secrets;

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::broadcast;

use crate::shutdown;

/// Shell convention for signal deaths: 128 + signal number
#[cfg(unix)]
pub(crate) fn signal_code(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|sig| 128 + sig)
}

#[cfg(not(unix))]
pub(crate) fn signal_code(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Ask a child to stop. SIGTERM on Unix; elsewhere there is nothing gentler
/// than a kill.
#[cfg(unix)]
fn terminate(child: &mut Child) -> io::Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(io::Error::from),
        // Already reaped
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

/// How a supervised child ended
pub(crate) struct Supervised {
    pub status: io::Result<ExitStatus>,
    /// Shutdown fired while the child was running
    pub interrupted: bool,
}

/// Wait for `child`, passing shutdown on to it.
///
/// The first shutdown signal sends SIGTERM. The child is killed if it is
/// still running after `grace` or when a second signal arrives.
pub(crate) async fn supervise(
    child: &mut Child,
    shutdown: &mut Option<broadcast::Receiver<()>>,
    grace: Duration,
    step: &str,
) -> Supervised {
    tokio::select! {
        status = child.wait() => {
            return Supervised { status, interrupted: false };
        }
        _ = shutdown::signalled(shutdown) => {}
    }

    tracing::info!(step, grace_ms = grace.as_millis() as u64, "🛑 Forwarding SIGTERM");
    if let Err(e) = terminate(child) {
        tracing::warn!(step, error = %e, "Failed to signal child");
    }

    let status = tokio::select! {
        status = child.wait() => status,
        _ = tokio::time::sleep(grace) => {
            tracing::warn!(step, "Child ignored SIGTERM, killing");
            force_kill(child).await
        }
        _ = shutdown::signalled(shutdown) => {
            tracing::warn!(step, "Second shutdown signal, killing");
            force_kill(child).await
        }
    };

    Supervised {
        status,
        interrupted: true,
    }
}

async fn force_kill(child: &mut Child) -> io::Result<ExitStatus> {
    if let Err(e) = child.start_kill() {
        tracing::warn!(error = %e, "Failed to kill child");
    }
    child.wait().await
}
