//! The startup sequence: gate, migrate, load credentials, launch.

use launchgate_common::LaunchError;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::gate::{ReadinessGate, TcpProber};
use crate::shutdown;
use crate::steps::secrets::Credentials;
use crate::steps::{launch, migrate};

/// Run every step in order, stopping at the first failure.
/// Returns once the launched server exits.
///
/// One shutdown receiver follows the whole sequence, so a signal that
/// lands between steps stops the next one from starting.
pub async fn run(config: &AppConfig, shutdown_tx: &broadcast::Sender<()>) -> Result<(), LaunchError> {
    let mut shutdown = Some(shutdown_tx.subscribe());

    config.validate()?;

    let endpoint = config.database.endpoint()?;
    let mut gate = ReadinessGate::new(endpoint, config.gate.options())
        .with_prober(TcpProber::new(config.gate.connect_timeout()))
        .with_shutdown(shutdown_tx.subscribe());

    tracing::info!(endpoint = %gate.endpoint(), "⏳ Waiting for database");
    let report = gate.wait().await?;
    tracing::info!(
        attempts = report.attempts,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "✅ Database reachable"
    );

    ensure_running(&mut shutdown, "migration")?;
    migrate::run(&config.migration, &mut shutdown).await?;

    let credentials = Credentials::load(&config.secrets).await?;
    let env = credentials.env_vars(&config.secrets);

    ensure_running(&mut shutdown, "server")?;
    launch::run(&config.server, &env, &mut shutdown).await
}

/// Refuse to start `step` once shutdown has been requested
fn ensure_running(
    shutdown: &mut Option<broadcast::Receiver<()>>,
    step: &str,
) -> Result<(), LaunchError> {
    if shutdown::pending(shutdown) {
        tracing::info!(step, "🛑 Shutdown requested, not starting {step}");
        return Err(LaunchError::Interrupted {
            step: step.to_string(),
        });
    }
    Ok(())
}
