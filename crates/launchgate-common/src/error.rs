//! Error taxonomy for the startup sequence.

use std::time::Duration;

use thiserror::Error;

use crate::constants::exit_codes;

/// Errors surfaced by the readiness gate and the startup steps
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Invalid or missing configuration, detected before any network or process activity
    #[error("Configuration error: {0}")]
    Config(String),

    /// Attempt or deadline budget exhausted without reachability
    #[error("Timed out waiting for {endpoint}: {attempts} attempts in {elapsed:?}")]
    Timeout {
        endpoint: String,
        attempts: u32,
        elapsed: Duration,
    },

    /// Wait interrupted by a shutdown signal
    #[error("Wait for {endpoint} cancelled after {attempts} attempts")]
    Cancelled { endpoint: String, attempts: u32 },

    /// A later step was stopped by a shutdown signal before the server launched
    #[error("{step} interrupted by shutdown")]
    Interrupted { step: String },

    /// An external step could not run or exited unsuccessfully
    #[error("{step} failed{}", .code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    DependencyFailure { step: String, code: Option<i32> },
}

impl LaunchError {
    /// Shorthand for a configuration error naming the offending variable
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => exit_codes::CONFIG,
            Self::Timeout { .. } => exit_codes::TEMPFAIL,
            Self::Cancelled { .. } | Self::Interrupted { .. } => exit_codes::INTERRUPTED,
            Self::DependencyFailure { code, .. } => match code {
                Some(c) if (1..=255).contains(c) => *c as u8,
                _ => exit_codes::FAILURE,
            },
        }
    }

    /// Returns true if running the sequence again could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Cancelled { .. } | Self::Interrupted { .. }
        )
    }
}
