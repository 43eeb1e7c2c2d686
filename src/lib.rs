//! Proxy engine supervisor library.

pub mod admin;
pub mod config;
pub mod endpoint;
pub mod engine;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod reconcile;
pub mod resilience;
pub mod subscription;
pub mod synthesis;

pub use config::schema::SupervisorConfig;
pub use endpoint::Endpoint;
pub use engine::EngineConfig;
pub use lifecycle::Shutdown;
