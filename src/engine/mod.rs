//! Engine configuration subsystem.
//!
//! # Data Flow
//! ```text
//! bootstrap JSON file
//!     → model.rs (EngineConfig, typed where the supervisor edits it)
//!     → synthesis (deep copy, merge endpoints)
//!     → render.rs (temp-dir config.json the engine is launched with)
//! ```
//!
//! # Design Decisions
//! - Unknown keys are carried in flattened maps, never dropped
//! - Copies go through the serialized form so the rendered file can always be produced
//! - Only the first balancer is managed

pub mod model;
pub mod render;

pub use model::{EngineConfig, ModelError};
pub use render::{write_config, RenderError, RenderedConfig};
