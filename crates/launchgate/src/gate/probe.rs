//! Reachability probes.

use std::future::Future;
use std::io;
use std::time::Duration;

use launchgate_common::Endpoint;
use launchgate_common::constants::DEFAULT_CONNECT_TIMEOUT_MS;
use tokio::net::TcpStream;

/// One connection attempt against an endpoint.
///
/// The returned connection is owned by the caller; dropping it releases
/// the underlying socket. Implementations must release anything they
/// opened before returning an error.
pub trait Prober {
    type Connection: Send;

    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = io::Result<Self::Connection>> + Send;
}

/// TCP connect probe with a per-attempt timeout
#[derive(Debug, Clone)]
pub struct TcpProber {
    connect_timeout: Duration,
}

impl TcpProber {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS))
    }
}

impl Prober for TcpProber {
    type Connection = TcpStream;

    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = io::Result<Self::Connection>> + Send {
        // Display form brackets IPv6 literals, so it resolves as a String address
        let addr = endpoint.to_string();
        let timeout = self.connect_timeout;

        async move {
            match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {}ms", timeout.as_millis()),
                )),
            }
        }
    }
}
