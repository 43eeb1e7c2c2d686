//! Endpoint health checking.
//!
//! # Data Flow
//! ```text
//! fetched endpoints (check ports bound by synthesis)
//!     → checker.rs (one probe per endpoint, concurrently)
//!     → probe.rs (HTTP GET through the endpoint's local SOCKS test listener)
//!     → healthy subset, input order preserved
//!     → metrics: pass/fail counter and latency gauge per tag
//! ```
//!
//! # Design Decisions
//! - A probe passes only on transport success AND HTTP 200
//! - One failing probe never affects the others
//! - The probe is a trait so reconciliation can be exercised without an engine

pub mod checker;
pub mod probe;

pub use checker::HealthChecker;
pub use probe::{Probe, ProbeError, SocksProbe};
