//! Retry loop: probe, pause, probe again until reachable or out of budget.

use std::time::{Duration, Instant};

use launchgate_common::constants::DEFAULT_RETRY_INTERVAL_MS;
use launchgate_common::{AttemptBound, Endpoint, GateState, LaunchError};
use tokio::sync::{broadcast, mpsc};

use super::probe::{Prober, TcpProber};
use crate::shutdown;

/// Retry policy for one gate invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOptions {
    /// Pause between failed attempts
    pub retry_interval: Duration,
    /// None retries until reachable
    pub bound: Option<AttemptBound>,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS),
            bound: None,
        }
    }
}

impl GateOptions {
    pub fn validate(&self) -> Result<(), LaunchError> {
        if self.retry_interval.is_zero() {
            return Err(LaunchError::config("retry interval must be positive"));
        }
        match self.bound {
            Some(AttemptBound::MaxAttempts(0)) => {
                Err(LaunchError::config("max attempts must be at least 1"))
            }
            Some(AttemptBound::Deadline(d)) if d.is_zero() => {
                Err(LaunchError::config("deadline must be positive"))
            }
            _ => Ok(()),
        }
    }
}

/// Outcome of a successful wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateReport {
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Progress notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// Attempt failed, another one follows after the retry interval
    Waiting { attempt: u32, error: String },
    /// Endpoint accepted a connection
    Reachable { attempts: u32, elapsed: Duration },
}

/// Waits for an endpoint to accept connections
pub struct ReadinessGate<P = TcpProber> {
    endpoint: Endpoint,
    options: GateOptions,
    prober: P,
    shutdown: Option<broadcast::Receiver<()>>,
    events: Option<mpsc::UnboundedSender<GateEvent>>,
    state: GateState,
}

impl ReadinessGate<TcpProber> {
    pub fn new(endpoint: Endpoint, options: GateOptions) -> Self {
        Self {
            endpoint,
            options,
            prober: TcpProber::default(),
            shutdown: None,
            events: None,
            state: GateState::Waiting,
        }
    }
}

impl<P: Prober> ReadinessGate<P> {
    /// Swap the network layer
    pub fn with_prober<Q: Prober>(self, prober: Q) -> ReadinessGate<Q> {
        ReadinessGate {
            endpoint: self.endpoint,
            options: self.options,
            prober,
            shutdown: self.shutdown,
            events: self.events,
            state: self.state,
        }
    }

    /// Abort the wait when the shutdown channel fires
    pub fn with_shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Publish progress notifications to a channel
    pub fn with_events(mut self, events: mpsc::UnboundedSender<GateEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Probe until the endpoint is reachable, the bound is exhausted,
    /// or shutdown is signalled.
    pub async fn wait(&mut self) -> Result<GateReport, LaunchError> {
        self.options.validate()?;

        self.state = GateState::Waiting;
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            // The connection is dropped as soon as the probe resolves
            let probe = tokio::select! {
                result = self.prober.connect(&self.endpoint) => result.map(drop),
                _ = shutdown::signalled(&mut self.shutdown) => {
                    return Err(self.cancel(attempts));
                }
            };

            let elapsed = started.elapsed();
            let error = match probe {
                Ok(()) => {
                    self.state = GateState::Reachable;
                    tracing::info!(
                        endpoint = %self.endpoint,
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Dependency is reachable"
                    );
                    self.emit(GateEvent::Reachable { attempts, elapsed });
                    return Ok(GateReport { attempts, elapsed });
                }
                Err(e) => e,
            };

            if self
                .options
                .bound
                .is_some_and(|bound| bound.is_exhausted(attempts, elapsed))
            {
                self.state = GateState::Exhausted;
                tracing::error!(
                    endpoint = %self.endpoint,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %error,
                    "Dependency did not become reachable"
                );
                return Err(LaunchError::Timeout {
                    endpoint: self.endpoint.to_string(),
                    attempts,
                    elapsed,
                });
            }

            let pause = match self.options.bound.and_then(|b| b.remaining(elapsed)) {
                Some(remaining) => remaining.min(self.options.retry_interval),
                None => self.options.retry_interval,
            };

            tracing::warn!(
                endpoint = %self.endpoint,
                attempt = attempts,
                error = %error,
                retry_in_ms = pause.as_millis() as u64,
                "Waiting for dependency to become reachable"
            );
            self.emit(GateEvent::Waiting {
                attempt: attempts,
                error: error.to_string(),
            });

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown::signalled(&mut self.shutdown) => {
                    return Err(self.cancel(attempts));
                }
            }
        }
    }

    fn cancel(&mut self, attempts: u32) -> LaunchError {
        self.state = GateState::Cancelled;
        tracing::info!(endpoint = %self.endpoint, attempts, "🛑 Wait cancelled by shutdown");
        LaunchError::Cancelled {
            endpoint: self.endpoint.to_string(),
            attempts,
        }
    }

    fn emit(&self, event: GateEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening anymore
            let _ = events.send(event);
        }
    }
}

/// Wait until `host:port` accepts a TCP connection.
///
/// Invalid ports (0 or above 65535) fail before any network activity.
pub async fn await_reachable(
    host: &str,
    port: u32,
    retry_interval: Duration,
    bound: Option<AttemptBound>,
) -> Result<(), LaunchError> {
    let endpoint = Endpoint::new(host, port)?;
    let options = GateOptions {
        retry_interval,
        bound,
    };

    ReadinessGate::new(endpoint, options).wait().await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::net::TcpListener;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Default)]
    struct Counters {
        calls: AtomicU32,
        opened: AtomicU32,
        closed: AtomicU32,
    }

    /// Open probe socket; closing it is recorded on drop
    struct FakeConnection(Arc<Counters>);

    impl Drop for FakeConnection {
        fn drop(&mut self) {
            self.0.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Refuses connections until attempt `reachable_on` (never if None)
    struct FakeProber {
        counters: Arc<Counters>,
        reachable_on: Option<u32>,
    }

    impl FakeProber {
        fn new(reachable_on: Option<u32>) -> (Self, Arc<Counters>) {
            let counters = Arc::new(Counters::default());
            let prober = Self {
                counters: counters.clone(),
                reachable_on,
            };
            (prober, counters)
        }
    }

    impl Prober for FakeProber {
        type Connection = FakeConnection;

        fn connect(
            &self,
            _endpoint: &Endpoint,
        ) -> impl Future<Output = io::Result<FakeConnection>> + Send {
            let attempt = self.counters.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            let conn = FakeConnection(self.counters.clone());

            let result = match self.reachable_on {
                Some(k) if attempt >= k => Ok(conn),
                _ => {
                    drop(conn);
                    Err(io::Error::from(io::ErrorKind::ConnectionRefused))
                }
            };
            std::future::ready(result)
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint::new("db.internal", 5432).unwrap()
    }

    fn options(interval_ms: u64, bound: Option<AttemptBound>) -> GateOptions {
        GateOptions {
            retry_interval: Duration::from_millis(interval_ms),
            bound,
        }
    }

    async fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_reachable_listener_first_attempt() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let ep = Endpoint::new("127.0.0.1", port.into()).unwrap();

        let mut gate = ReadinessGate::new(ep, options(10, Some(AttemptBound::MaxAttempts(5))));
        let report = assert_ok!(gate.wait().await);

        assert_eq!(report.attempts, 1);
        assert_eq!(gate.state(), GateState::Reachable);
        assert!(report.elapsed < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_waiting_events_before_success() {
        let (prober, counters) = FakeProber::new(Some(4));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut gate = ReadinessGate::new(endpoint(), options(5, None))
            .with_prober(prober)
            .with_events(tx);

        let report = assert_ok!(gate.wait().await);
        assert_eq!(report.attempts, 4);
        assert_eq!(counters.calls.load(Ordering::SeqCst), 4);

        let mut waiting = Vec::new();
        let mut reachable = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                GateEvent::Waiting { attempt, .. } => waiting.push(attempt),
                GateEvent::Reachable { attempts, .. } => {
                    assert_eq!(attempts, 4);
                    reachable += 1;
                }
            }
        }
        assert_eq!(waiting, vec![1, 2, 3]);
        assert_eq!(reachable, 1);
    }

    #[tokio::test]
    async fn test_max_attempts_exhausted_exactly() {
        let (prober, counters) = FakeProber::new(None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut gate = ReadinessGate::new(endpoint(), options(5, Some(AttemptBound::MaxAttempts(3))))
            .with_prober(prober)
            .with_events(tx);

        let err = assert_err!(gate.wait().await);
        match err {
            LaunchError::Timeout { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(counters.calls.load(Ordering::SeqCst), 3);
        assert_eq!(gate.state(), GateState::Exhausted);

        // No notification after the final attempt
        let mut notices = 0;
        while rx.try_recv().is_ok() {
            notices += 1;
        }
        assert_eq!(notices, 2);
    }

    #[tokio::test]
    async fn test_invalid_port_fails_before_probing() {
        for port in [0, 70000] {
            let err = assert_err!(
                await_reachable("localhost", port, Duration::from_millis(10), None).await
            );
            assert!(matches!(err, LaunchError::Config(_)), "port {port}");
        }
    }

    #[tokio::test]
    async fn test_invalid_options_issue_no_attempts() {
        let cases = [
            options(0, None),
            options(10, Some(AttemptBound::MaxAttempts(0))),
            options(10, Some(AttemptBound::Deadline(Duration::ZERO))),
        ];

        for opts in cases {
            let (prober, counters) = FakeProber::new(Some(1));
            let mut gate = ReadinessGate::new(endpoint(), opts).with_prober(prober);

            let err = assert_err!(gate.wait().await);
            assert!(matches!(err, LaunchError::Config(_)));
            assert_eq!(counters.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_probe_connections_never_leak() {
        let (prober, counters) = FakeProber::new(Some(6));
        let mut gate = ReadinessGate::new(endpoint(), options(1, None)).with_prober(prober);
        assert_ok!(gate.wait().await);

        let opened = counters.opened.load(Ordering::SeqCst);
        assert_eq!(opened, 6);
        assert_eq!(counters.closed.load(Ordering::SeqCst), opened);

        let (prober, counters) = FakeProber::new(None);
        let mut gate = ReadinessGate::new(endpoint(), options(1, Some(AttemptBound::MaxAttempts(4))))
            .with_prober(prober);
        assert_err!(gate.wait().await);

        assert_eq!(counters.opened.load(Ordering::SeqCst), 4);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_no_listener_times_out_after_three_attempts() {
        let port = free_port().await;
        let started = Instant::now();

        let err = assert_err!(
            await_reachable(
                "127.0.0.1",
                port.into(),
                Duration::from_millis(10),
                Some(AttemptBound::MaxAttempts(3)),
            )
            .await
        );

        match err {
            LaunchError::Timeout { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected timeout, got {other:?}"),
        }
        // Two pauses of 10ms plus scheduling slack
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(20));
        assert!(elapsed < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_listener_bound_after_delay() {
        let port = free_port().await;
        let (bound_tx, bound_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(15)).await;
            let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            let _ = bound_tx.send(());
            // Keep the listener open for the duration of the test
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(listener);
        });

        let ep = Endpoint::new("127.0.0.1", port.into()).unwrap();
        let mut gate = ReadinessGate::new(ep, options(10, None));
        let report = tokio::time::timeout(Duration::from_secs(5), gate.wait())
            .await
            .expect("gate should finish once the listener is up")
            .unwrap();

        assert!(bound_rx.await.is_ok());
        assert!(report.attempts >= 2);
        assert!(report.elapsed >= Duration::from_millis(10));
        assert!(report.elapsed < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_deadline_bound() {
        let (prober, counters) = FakeProber::new(None);
        let bound = AttemptBound::Deadline(Duration::from_millis(40));
        let mut gate = ReadinessGate::new(endpoint(), options(10, Some(bound))).with_prober(prober);

        let started = Instant::now();
        let err = assert_err!(gate.wait().await);

        assert!(matches!(err, LaunchError::Timeout { .. }));
        assert!(started.elapsed() >= Duration::from_millis(40));
        let calls = counters.calls.load(Ordering::SeqCst);
        assert!((2..=6).contains(&calls), "calls = {calls}");
    }

    #[tokio::test]
    async fn test_shutdown_cancels_wait() {
        let (prober, _counters) = FakeProber::new(None);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let mut gate = ReadinessGate::new(endpoint(), options(10_000, None))
            .with_prober(prober)
            .with_shutdown(shutdown_rx);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = shutdown_tx.send(());
        });

        let started = Instant::now();
        let err = assert_err!(gate.wait().await);

        assert!(matches!(err, LaunchError::Cancelled { attempts: 1, .. }));
        assert_eq!(gate.state(), GateState::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_closed_shutdown_channel_does_not_cancel() {
        let (prober, _counters) = FakeProber::new(Some(3));
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        drop(shutdown_tx);

        let mut gate = ReadinessGate::new(endpoint(), options(1, None))
            .with_prober(prober)
            .with_shutdown(shutdown_rx);

        let report = assert_ok!(gate.wait().await);
        assert_eq!(report.attempts, 3);
    }
}
