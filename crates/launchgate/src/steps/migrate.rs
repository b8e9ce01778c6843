//! Schema migration step.
//!
//! Runs an external migration tool and checks its exit status. A failing
//! migration aborts startup instead of launching the server against a
//! stale schema.

use std::process::Stdio;

use launchgate_common::LaunchError;
use tokio::process::Command;
use tokio::sync::broadcast;

use crate::config::MigrationConfig;
use crate::steps::{signal_code, supervise};

const STEP: &str = "migration";

/// Run the configured migration command to completion.
///
/// A shutdown signal stops the command and fails the step with
/// `Interrupted`, whatever the command's exit status.
pub async fn run(
    config: &MigrationConfig,
    shutdown: &mut Option<broadcast::Receiver<()>>,
) -> Result<(), LaunchError> {
    if !config.enabled {
        tracing::info!("Migrations disabled, skipping");
        return Ok(());
    }

    let (program, args) = config
        .command
        .split_first()
        .ok_or_else(|| LaunchError::config("migration.command must not be empty"))?;

    tracing::info!(
        command = %config.command.join(" "),
        workdir = %config.workdir.display(),
        "📦 Running migrations"
    );

    let mut child = Command::new(program)
        .args(args)
        .current_dir(&config.workdir)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            tracing::error!(program = %program, error = %e, "Failed to start migration command");
            LaunchError::DependencyFailure {
                step: STEP.to_string(),
                code: None,
            }
        })?;

    let outcome = supervise(&mut child, shutdown, config.stop_grace(), STEP).await;
    if outcome.interrupted {
        tracing::warn!("Migration interrupted by shutdown, server will not be launched");
        return Err(LaunchError::Interrupted {
            step: STEP.to_string(),
        });
    }

    let status = outcome.status.map_err(|e| {
        tracing::error!(error = %e, "Failed to wait for migration command");
        LaunchError::DependencyFailure {
            step: STEP.to_string(),
            code: None,
        }
    })?;

    match status.code() {
        Some(0) => {
            tracing::info!("✅ Migrations applied");
            Ok(())
        }
        Some(code) if config.allowed_exit_codes.contains(&code) => {
            tracing::warn!(code, "Migration exited non-zero with an allowed code");
            Ok(())
        }
        code => {
            tracing::error!(status = %status, "Migration failed, aborting startup");
            Err(LaunchError::DependencyFailure {
                step: STEP.to_string(),
                code: code.or_else(|| signal_code(&status)),
            })
        }
    }
}
