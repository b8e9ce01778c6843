//! Core types shared across Launchgate components.

use std::fmt;
use std::time::Duration;

use crate::error::LaunchError;

/// A network endpoint the readiness gate waits for.
///
/// The host is not format-validated: name resolution failures are treated
/// like any other failed connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint, rejecting an empty host and ports outside 1-65535
    pub fn new(host: impl Into<String>, port: u32) -> Result<Self, LaunchError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(LaunchError::config("host must not be empty"));
        }

        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                LaunchError::config(format!("port {port} is outside the range 1-65535"))
            })?;

        Ok(Self { host, port })
    }

    /// Parse an `host:port` pair. IPv6 literals must be bracketed (`[::1]:80`).
    pub fn parse(addr: &str) -> Result<Self, LaunchError> {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| LaunchError::config(format!("address '{addr}' is missing a port")))?;

        let port: u32 = port
            .parse()
            .map_err(|_| LaunchError::config(format!("address '{addr}' has an invalid port")))?;

        let host = host.trim_start_matches('[').trim_end_matches(']');
        Self::new(host, port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Optional limit on how long the gate keeps probing.
/// No bound means retry until reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptBound {
    /// Give up after this many probe attempts
    MaxAttempts(u32),
    /// Give up once this much time has elapsed since the first attempt
    Deadline(Duration),
}

impl AttemptBound {
    /// Returns true if no further attempt is allowed
    pub fn is_exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        match *self {
            Self::MaxAttempts(max) => attempts >= max,
            Self::Deadline(deadline) => elapsed >= deadline,
        }
    }

    /// Time left before the deadline, if this is a deadline bound
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        match *self {
            Self::MaxAttempts(_) => None,
            Self::Deadline(deadline) => Some(deadline.saturating_sub(elapsed)),
        }
    }
}

/// Readiness gate lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Probing, dependency not reachable yet
    Waiting,
    /// Dependency accepted a connection
    Reachable,
    /// Attempt or deadline budget used up
    Exhausted,
    /// Interrupted by shutdown
    Cancelled,
}

impl Default for GateState {
    fn default() -> Self {
        Self::Waiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_port_range() {
        assert!(Endpoint::new("db", 1).is_ok());
        assert!(Endpoint::new("db", 65535).is_ok());

        for port in [0, 65536, 70000] {
            let err = Endpoint::new("db", port).unwrap_err();
            assert!(matches!(err, LaunchError::Config(_)), "port {port}");
        }
    }

    #[test]
    fn test_endpoint_empty_host() {
        assert!(matches!(
            Endpoint::new("  ", 5432),
            Err(LaunchError::Config(_))
        ));
    }

    #[test]
    fn test_endpoint_parse() {
        let ep = Endpoint::parse("127.0.0.1:8000").unwrap();
        assert_eq!(ep.host(), "127.0.0.1");
        assert_eq!(ep.port(), 8000);

        let ep = Endpoint::parse("[::1]:5432").unwrap();
        assert_eq!(ep.host(), "::1");
        assert_eq!(ep.to_string(), "[::1]:5432");

        assert!(Endpoint::parse("localhost").is_err());
        assert!(Endpoint::parse("localhost:http").is_err());
        assert!(Endpoint::parse("localhost:0").is_err());
    }

    #[test]
    fn test_attempt_bound() {
        let max = AttemptBound::MaxAttempts(3);
        assert!(!max.is_exhausted(2, Duration::from_secs(100)));
        assert!(max.is_exhausted(3, Duration::ZERO));
        assert_eq!(max.remaining(Duration::ZERO), None);

        let deadline = AttemptBound::Deadline(Duration::from_millis(50));
        assert!(!deadline.is_exhausted(10, Duration::from_millis(49)));
        assert!(deadline.is_exhausted(1, Duration::from_millis(50)));
        assert_eq!(
            deadline.remaining(Duration::from_millis(80)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_gate_state() {
        assert_eq!(GateState::default(), GateState::Waiting);
    }
}
