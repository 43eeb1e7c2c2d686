//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Stop signal to the engine:
//!     → retries.rs (bounded attempts, then give up and log)
//! ```
//!
//! # Design Decisions
//! - Bounded: a failing operation is attempted a fixed number of times
//! - No backoff between attempts; callers that need spacing sleep themselves

pub mod retries;
