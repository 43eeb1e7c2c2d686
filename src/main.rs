//! Proxy engine supervisor.
//!
//! Keeps a proxy engine process running against a configuration built from a
//! subscription feed, routing only through endpoints that pass health checks.
//!
//! # Architecture Overview
//!
//! ```text
//!   subscription feed          control surface (/api/sub, /api/sub/check, /api/core/restart)
//!          │                         │                 │                   │
//!          ▼                         ▼                 ▼                   │
//!   ┌──────────────┐  timer  ┌──────────────┐  ┌──────────────┐           │
//!   │ subscription │◀────────│   triggers   │─▶│    health    │           │
//!   │     loop     │         └──────────────┘  │     loop     │           │
//!   └──────┬───────┘                           └──────┬───────┘           │
//!          │ override_endpoints                        │ probe + balance   │
//!          ▼                                           ▼                   │
//!   ┌────────────────────────────────────────────────────────┐            │
//!   │          ServingState { config, fetched, healthy }      │            │
//!   └──────────────────────────┬─────────────────────────────┘            │
//!                              │ rendered config + restart request         │
//!                              ▼                                           ▼
//!                     ┌──────────────────┐   stop signal   ┌────────────────────┐
//!                     │  respawn loop    │◀────────────────│  restart handler   │
//!                     │  (owns engine)   │                 └────────────────────┘
//!                     └──────────────────┘
//! ```

use clap::Parser;
use std::process::ExitCode;

use engine_supervisor::config::Cli;
use engine_supervisor::lifecycle::startup;
use engine_supervisor::observability::{logging, metrics};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging("info");
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "engine-supervisor starting");
    tracing::info!(
        config_path = %config.engine.config_path.display(),
        binary = %config.engine.binary.display(),
        subscription = config.subscription.url.as_deref().unwrap_or("-"),
        health_check = config.health_check_active(),
        period_secs = config.subscription.period_secs,
        control_port = config.control.port,
        "Configuration loaded"
    );

    let handle = if config.observability.metrics_enabled {
        match metrics::install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "Failed to install metrics recorder");
                None
            }
        }
    } else {
        None
    };

    match startup::run(config, handle).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Supervisor failed");
            ExitCode::FAILURE
        }
    }
}
