//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load engine config → Render → Initial refresh → Launch engine
//!     → Start loops and control surface
//!
//! Supervision (supervisor.rs):
//!     Respawn loop: spawn → publish handle → wait for exit → spawn again
//!     Restart handler: request → stop signal (bounded retries) → respawn loop relaunches
//!
//! Shutdown (shutdown.rs):
//!     Signal received → loops finish their run → engine stopped → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Only the respawn loop owns the child; everyone else sends requests
//! - A restart is a stop; relaunching is always the respawn loop's job

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use supervisor::{EngineCommand, RestartHandle, RestartSource, Supervisor};
