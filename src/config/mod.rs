//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → cli.rs (flag / environment overlay)
//!     → validation.rs (semantic checks)
//!     → SupervisorConfig (validated, immutable)
//!
//! bootstrap engine config (JSON)
//!     → loader.rs::load_engine_config (must declare a balancer)
//!     → initial ServingState
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::{load_engine_config, load_settings, ConfigError};
pub use schema::SupervisorConfig;
