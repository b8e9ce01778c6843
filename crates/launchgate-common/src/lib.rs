//! # Launchgate Common
//!
//! Shared types, errors, and constants used across Launchgate components.
//!
//! ## Modules
//! - `types` - Core data structures (Endpoint, AttemptBound, GateState)
//! - `error` - The launch error taxonomy
//! - `constants` - Shared defaults and environment variable names

pub mod constants;
pub mod error;
pub mod types;

pub use error::LaunchError;
pub use types::*;
