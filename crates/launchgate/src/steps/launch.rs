//! Application server launch.
//!
//! The server is spawned as a child and awaited; its exit code becomes
//! ours. Shutdown signals reach it as SIGTERM, as they would if it ran
//! as PID 1 itself. After spawning, a bounded readiness probe reports when
//! the server starts accepting connections.

use launchgate_common::{Endpoint, LaunchError};
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::gate::{GateEvent, ReadinessGate};
use crate::steps::{signal_code, supervise};

const STEP: &str = "server";

/// Spawn the server, wait for it, and mirror its exit status.
///
/// A clean exit is `Ok`; anything else is a `DependencyFailure` carrying
/// the code the process should exit with.
pub async fn run(
    config: &ServerConfig,
    env: &[(String, String)],
    shutdown: &mut Option<broadcast::Receiver<()>>,
) -> Result<(), LaunchError> {
    let (program, args) = config
        .command
        .split_first()
        .ok_or_else(|| LaunchError::config("server.command must not be empty"))?;

    let injected: Vec<&str> = env.iter().map(|(name, _)| name.as_str()).collect();
    tracing::info!(
        command = %config.command.join(" "),
        injected = ?injected,
        "🚀 Launching application server"
    );

    let mut child = Command::new(program)
        .args(args)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            tracing::error!(program = %program, error = %e, "Failed to start server");
            LaunchError::DependencyFailure {
                step: STEP.to_string(),
                code: None,
            }
        })?;

    let watcher = spawn_ready_probe(config, None);
    let outcome = supervise(&mut child, shutdown, config.stop_grace(), STEP).await;

    if let Some(handle) = watcher {
        handle.abort();
    }
    if outcome.interrupted {
        tracing::info!("Application server stopped on shutdown");
    }

    let status = outcome.status.map_err(|e| {
        tracing::error!(error = %e, "Failed to wait for server");
        LaunchError::DependencyFailure {
            step: STEP.to_string(),
            code: None,
        }
    })?;

    if status.success() {
        tracing::info!("Application server exited cleanly");
        return Ok(());
    }

    let code = status.code().or_else(|| signal_code(&status));
    tracing::error!(status = %status, "Application server exited unsuccessfully");
    Err(LaunchError::DependencyFailure {
        step: STEP.to_string(),
        code,
    })
}

/// Probe the server's own port in the background and log once it serves
fn spawn_ready_probe(
    config: &ServerConfig,
    events: Option<mpsc::UnboundedSender<GateEvent>>,
) -> Option<JoinHandle<()>> {
    let addr = config.ready_addr.as_deref()?;
    let endpoint = match Endpoint::parse(addr) {
        Ok(endpoint) => endpoint,
        Err(e) => {
            tracing::warn!(addr = %addr, error = %e, "Invalid server ready address, not probing");
            return None;
        }
    };
    let options = config.ready_options();

    Some(tokio::spawn(async move {
        let mut gate = ReadinessGate::new(endpoint, options);
        if let Some(events) = events {
            gate = gate.with_events(events);
        }
        match gate.wait().await {
            Ok(report) => tracing::info!(
                endpoint = %gate.endpoint(),
                attempts = report.attempts,
                "🚀 Server is now accepting connections"
            ),
            Err(e) => tracing::warn!(error = %e, "Server did not start accepting connections"),
        }
    }))
}
