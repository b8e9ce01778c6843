//! # Launchgate
//!
//! Startup orchestration for containerized services.
//!
//! ## Modules
//! - `gate` - Dependency readiness gate (TCP reachability with retry)
//! - `steps` - Migration, credential loading, server launch
//! - `startup` - The full sequence in order
//! - `config` - File + CLI/env configuration
//! - `shutdown` - Shutdown broadcast helpers

pub mod config;
pub mod gate;
pub mod shutdown;
pub mod startup;
pub mod steps;

pub use config::{AppConfig, Overrides};
pub use gate::{ReadinessGate, await_reachable};
