//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (probe outcomes, reconciliation outcomes, restarts)
//!
//! Consumers:
//!     → stdout (interleaved with the engine's own output)
//!     → /metrics on the control surface (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Metric names live in one place; call sites use record_* helpers
//! - Without an installed recorder the helpers are no-ops

pub mod logging;
pub mod metrics;
