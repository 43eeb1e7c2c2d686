//! Reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! Subscription loop (timer | /api/sub):
//!     fetch → canonical diff vs last fetched
//!     → override_endpoints → write managed copy + rendered file
//!     → commit { config, fetched, healthy } → restart request
//!
//! Health loop (timer | /api/sub/check):
//!     snapshot fetched → probe all → (tag, canonical) diff vs healthy
//!     → balance → write rendered file
//!     → commit { config, healthy } → restart request
//! ```
//!
//! # Design Decisions
//! - Restart only on Changed; an identical result is a no-op
//! - The state lock is not held while probing; a snapshot that went stale
//!   during the probe is discarded at commit
//! - Failures keep the current config serving

pub mod reconciler;
pub mod state;
pub mod trigger;

use thiserror::Error;

use crate::engine::render::RenderError;
use crate::subscription::FetchError;
use crate::synthesis::SynthesisError;

pub use reconciler::{ConfigFiles, Reconciler};
pub use state::{ServingState, Snapshot};
pub use trigger::{drive, trigger_channel, Trigger};

/// Result of one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Changed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Unchanged => "unchanged",
            Outcome::Changed => "changed",
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("persisting config failed: {0}")]
    Persist(#[from] RenderError),
}
