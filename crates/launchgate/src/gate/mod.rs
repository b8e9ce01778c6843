//! Dependency readiness gate.
//!
//! Blocks startup until a TCP endpoint accepts connections. The network
//! layer sits behind [`Prober`] so the retry loop can run against a fake.

mod probe;
mod readiness;

pub use probe::{Prober, TcpProber};
pub use readiness::{GateEvent, GateOptions, GateReport, ReadinessGate, await_reachable};
