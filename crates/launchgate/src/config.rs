//! Configuration management for Launchgate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use launchgate_common::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_NAMESPACE_PATH, DEFAULT_RETRY_INTERVAL_MS,
    DEFAULT_SERVER_BIND, DEFAULT_SERVER_READY_ADDR, DEFAULT_STOP_GRACE_MS,
    DEFAULT_TOKEN_PATH, SERVER_READY_ATTEMPTS, SERVER_READY_INTERVAL_MS, env_vars,
};
use launchgate_common::{AttemptBound, Endpoint, LaunchError};
use serde::Deserialize;

use crate::gate::GateOptions;

/// Values supplied on the command line or through the environment.
/// Each one, when present, replaces the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_host: Option<String>,
    pub db_port: Option<String>,
    pub retry_interval_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database endpoint, normally supplied through DB_HOST / DB_PORT
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Readiness gate retry policy
    #[serde(default)]
    pub gate: GateConfig,

    /// Schema migration step
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Mounted credentials
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Application server
    #[serde(default)]
    pub server: ServerConfig,
}

/// Database endpoint. The port is kept as text until validated so that a
/// bad `DB_PORT` is reported by name instead of as a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    pub host: Option<String>,
    pub port: Option<String>,
}

impl DatabaseConfig {
    /// Validated endpoint; errors name the missing or malformed variable
    pub fn endpoint(&self) -> Result<Endpoint, LaunchError> {
        let host = self
            .host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| {
                LaunchError::config(format!("{} is not set", env_vars::DB_HOST))
            })?;

        let raw_port = self.port.as_deref().map(str::trim).ok_or_else(|| {
            LaunchError::config(format!("{} is not set", env_vars::DB_PORT))
        })?;

        let port: u32 = raw_port.parse().map_err(|_| {
            LaunchError::config(format!(
                "{} must be an integer, got '{}'",
                env_vars::DB_PORT,
                raw_port
            ))
        })?;

        Endpoint::new(host, port).map_err(|e| {
            LaunchError::config(format!("{}: {}", env_vars::DB_PORT, inner_message(e)))
        })
    }
}

fn inner_message(err: LaunchError) -> String {
    match err {
        LaunchError::Config(msg) => msg,
        other => other.to_string(),
    }
}

/// Readiness gate configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Pause between probe attempts in milliseconds
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,

    /// Per-attempt connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Give up after this many attempts (unbounded if unset)
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Give up after this many seconds (unbounded if unset)
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: default_retry_interval(),
            connect_timeout_ms: default_connect_timeout(),
            max_attempts: None,
            deadline_secs: None,
        }
    }
}

impl GateConfig {
    /// Retry policy. An attempt count wins over a deadline when both are set.
    pub fn options(&self) -> GateOptions {
        let bound = match (self.max_attempts, self.deadline_secs) {
            (Some(max), _) => Some(AttemptBound::MaxAttempts(max)),
            (None, Some(secs)) => Some(AttemptBound::Deadline(Duration::from_secs(secs))),
            (None, None) => None,
        };

        GateOptions {
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            bound,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Migration step configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    /// Skip the step entirely when false
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Program followed by its arguments
    #[serde(default = "default_migration_command")]
    pub command: Vec<String>,

    /// Directory holding the migration definitions
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// Non-zero exit codes that still count as success
    #[serde(default)]
    pub allowed_exit_codes: Vec<i32>,

    /// Time between SIGTERM and SIGKILL on shutdown, in milliseconds
    #[serde(default = "default_stop_grace")]
    pub stop_grace_ms: u64,
}

impl MigrationConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_migration_command(),
            workdir: default_workdir(),
            allowed_exit_codes: Vec::new(),
            stop_grace_ms: default_stop_grace(),
        }
    }
}

/// Credential files and the variables they are injected as
#[derive(Debug, Clone, Deserialize)]
pub struct SecretsConfig {
    /// Token file
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,

    /// Variable the token is exported as
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Also export `Bearer <token>` under this name
    #[serde(default)]
    pub auth_header_env: Option<String>,

    /// Namespace file
    #[serde(default = "default_namespace_path")]
    pub namespace_path: PathBuf,

    /// Export the namespace under this name (skipped if unset)
    #[serde(default = "default_namespace_env")]
    pub namespace_env: Option<String>,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
            token_env: default_token_env(),
            auth_header_env: None,
            namespace_path: default_namespace_path(),
            namespace_env: default_namespace_env(),
        }
    }
}

/// Application server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Program followed by its arguments
    #[serde(default = "default_server_command")]
    pub command: Vec<String>,

    /// Address probed after launch (no probe if unset)
    #[serde(default = "default_ready_addr")]
    pub ready_addr: Option<String>,

    /// Post-launch probe attempts
    #[serde(default = "default_ready_attempts")]
    pub ready_attempts: u32,

    /// Post-launch probe interval in milliseconds
    #[serde(default = "default_ready_interval")]
    pub ready_interval_ms: u64,

    /// Time between SIGTERM and SIGKILL on shutdown, in milliseconds
    #[serde(default = "default_stop_grace")]
    pub stop_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: default_server_command(),
            ready_addr: default_ready_addr(),
            ready_attempts: default_ready_attempts(),
            ready_interval_ms: default_ready_interval(),
            stop_grace_ms: default_stop_grace(),
        }
    }
}

impl ServerConfig {
    pub fn ready_options(&self) -> GateOptions {
        GateOptions {
            retry_interval: Duration::from_millis(self.ready_interval_ms),
            bound: Some(AttemptBound::MaxAttempts(self.ready_attempts)),
        }
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_retry_interval() -> u64 { DEFAULT_RETRY_INTERVAL_MS }
fn default_connect_timeout() -> u64 { DEFAULT_CONNECT_TIMEOUT_MS }
fn default_migration_command() -> Vec<String> {
    ["alembic", "upgrade", "head"].map(String::from).to_vec()
}
fn default_workdir() -> PathBuf { PathBuf::from(".") }
fn default_token_path() -> PathBuf { PathBuf::from(DEFAULT_TOKEN_PATH) }
fn default_token_env() -> String { env_vars::SERVICE_ACCOUNT_TOKEN.to_string() }
fn default_namespace_path() -> PathBuf { PathBuf::from(DEFAULT_NAMESPACE_PATH) }
fn default_namespace_env() -> Option<String> { Some(env_vars::POD_NAMESPACE.to_string()) }
fn default_server_command() -> Vec<String> {
    let (host, port) = DEFAULT_SERVER_BIND
        .rsplit_once(':')
        .unwrap_or(("0.0.0.0", "8000"));
    ["uvicorn", "backend.main:app", "--host", host, "--port", port]
        .map(String::from)
        .to_vec()
}
fn default_ready_addr() -> Option<String> { Some(DEFAULT_SERVER_READY_ADDR.to_string()) }
fn default_ready_attempts() -> u32 { SERVER_READY_ATTEMPTS }
fn default_ready_interval() -> u64 { SERVER_READY_INTERVAL_MS }
fn default_stop_grace() -> u64 { DEFAULT_STOP_GRACE_MS }

impl AppConfig {
    /// Load configuration from file, with CLI/env overrides
    pub fn load(config_path: &str, overrides: &Overrides) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        config.apply_overrides(overrides);
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(ref host) = overrides.db_host {
            self.database.host = Some(host.clone());
        }
        if let Some(ref port) = overrides.db_port {
            self.database.port = Some(port.clone());
        }
        if let Some(interval) = overrides.retry_interval_ms {
            self.gate.retry_interval_ms = interval;
        }
        if let Some(max) = overrides.max_attempts {
            self.gate.max_attempts = Some(max);
        }
    }

    /// Check everything that can be checked before touching the network
    pub fn validate(&self) -> Result<(), LaunchError> {
        self.database.endpoint()?;
        self.gate.options().validate()?;

        if self.migration.enabled && self.migration.command.is_empty() {
            return Err(LaunchError::config("migration.command must not be empty"));
        }
        if self.server.command.is_empty() {
            return Err(LaunchError::config("server.command must not be empty"));
        }
        if self.secrets.token_env.trim().is_empty() {
            return Err(LaunchError::config("secrets.token_env must not be empty"));
        }
        if let Some(ref addr) = self.server.ready_addr {
            Endpoint::parse(addr)?;
            self.server.ready_options().validate()?;
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            gate: GateConfig::default(),
            migration: MigrationConfig::default(),
            secrets: SecretsConfig::default(),
            server: ServerConfig::default(),
        }
    }
}
