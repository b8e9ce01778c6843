//! Shared constants for Launchgate components.

/// Default pause between probe attempts (5 seconds)
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 5_000;

/// Default per-attempt TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3_000;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/launchgate.toml";

/// Mounted service account token
pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Mounted service account namespace
pub const DEFAULT_NAMESPACE_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Namespace used when the namespace file is absent
pub const FALLBACK_NAMESPACE: &str = "default";

/// Address the application server binds to
pub const DEFAULT_SERVER_BIND: &str = "0.0.0.0:8000";

/// Address probed after launch to confirm the server is serving
pub const DEFAULT_SERVER_READY_ADDR: &str = "127.0.0.1:8000";

/// Post-launch probe: attempts before giving up (~10s)
pub const SERVER_READY_ATTEMPTS: u32 = 20;

/// Post-launch probe: pause between attempts
pub const SERVER_READY_INTERVAL_MS: u64 = 500;

/// Time a child gets to exit after SIGTERM before it is killed
pub const DEFAULT_STOP_GRACE_MS: u64 = 10_000;

/// Environment variable names
pub mod env_vars {
    /// Database host consumed by the readiness gate
    pub const DB_HOST: &str = "DB_HOST";

    /// Database port consumed by the readiness gate (integer string)
    pub const DB_PORT: &str = "DB_PORT";

    /// Token injected into the server environment
    pub const SERVICE_ACCOUNT_TOKEN: &str = "SERVICE_ACCOUNT_TOKEN";

    /// Namespace injected into the server environment
    pub const POD_NAMESPACE: &str = "POD_NAMESPACE";
}

/// Process exit codes (sysexits.h where one applies)
pub mod exit_codes {
    /// Generic failure
    pub const FAILURE: u8 = 1;

    /// EX_TEMPFAIL: dependency never became reachable
    pub const TEMPFAIL: u8 = 75;

    /// EX_CONFIG: bad configuration
    pub const CONFIG: u8 = 78;

    /// Interrupted by a shutdown signal (128 + SIGINT)
    pub const INTERRUPTED: u8 = 130;
}
