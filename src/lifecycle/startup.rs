//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the bootstrap engine config and render it
//! - Run one subscription refresh before the engine first starts
//! - Start the supervisor, both reconciliation loops and the control surface
//! - Wait for shutdown and let every task finish
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The engine is launched only after the initial refresh
//! - The rendered config directory lives until the supervisor has stopped

use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

use crate::admin::{self, ControlState};
use crate::config::{load_engine_config, ConfigError, SupervisorConfig};
use crate::engine::render::{RenderError, RenderedConfig};
use crate::health::{HealthChecker, SocksProbe};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::lifecycle::supervisor::{restart_channel, EngineCommand, Supervisor};
use crate::reconcile::{drive, trigger_channel, ConfigFiles, Reconciler, ServingState};
use crate::subscription::{FetchError, SubscriptionSource};

/// Timeout for downloading the subscription feed.
pub const SUBSCRIPTION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("rendering engine config failed: {0}")]
    Render(#[from] RenderError),

    #[error("invalid {field} url: {source}")]
    Url {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("building subscription client failed: {0}")]
    Client(#[from] FetchError),

    #[error("binding control surface on {addr} failed: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, StartupError> {
    Url::parse(raw).map_err(|source| StartupError::Url { field, source })
}

/// Run the supervisor until `shutdown` fires. Signal handling is left to the
/// caller, see [`run`].
pub async fn run_until(
    config: SupervisorConfig,
    metrics: Option<PrometheusHandle>,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let base = load_engine_config(&config.engine.config_path).await?;
    let rendered = RenderedConfig::create(&base).await?;
    tracing::info!(
        bootstrap = %config.engine.config_path.display(),
        rendered = %rendered.path().display(),
        "Engine config loaded"
    );

    let state = Arc::new(ServingState::new(base));
    let (restart, restart_rx) = restart_channel();
    let files = ConfigFiles {
        managed: config.engine.config_path.clone(),
        rendered: rendered.path().to_path_buf(),
    };

    let mut reconciler = Reconciler::new(Arc::clone(&state), files, restart.clone(), shutdown.subscribe());
    if let Some(url) = &config.subscription.url {
        let source = SubscriptionSource::new(parse_url("subscription", url)?, SUBSCRIPTION_TIMEOUT)?;
        reconciler = reconciler.with_subscription(source);
    }
    if config.health_check_active() {
        let target = parse_url("health check", &config.health_check.url)?;
        let probe = SocksProbe::new(target, config.health_check.timeout());
        reconciler = reconciler.with_health_checker(HealthChecker::new(probe));
    }

    if config.subscription.url.is_some() {
        match reconciler.refresh_subscription().await {
            Ok(outcome) => tracing::info!(outcome = outcome.as_str(), "Initial subscription refresh done"),
            Err(e) => tracing::warn!(error = %e, "Initial subscription refresh failed, using bootstrap config"),
        }
    }
    let reconciler = Arc::new(reconciler);

    let supervisor = Supervisor::new(EngineCommand {
        binary: config.engine.binary.clone(),
        config_path: rendered.path().to_path_buf(),
        asset_dir: config.engine.asset_dir.clone(),
    });
    let process = supervisor.slot();
    let supervisor_task = tokio::spawn(supervisor.run(restart_rx, shutdown.subscribe()));

    let period = config.subscription.period();
    let (sub_trigger, sub_rx) = trigger_channel("subscription");
    let (health_trigger, health_rx) = trigger_channel("health");
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    if config.subscription.url.is_some() {
        let r = Arc::clone(&reconciler);
        tasks.push(tokio::spawn(drive("subscription", period, sub_rx, shutdown.subscribe(), move |reason| {
            let r = Arc::clone(&r);
            async move { r.run_subscription(reason).await }
        })));
    } else {
        drop(sub_rx);
        tracing::info!("No subscription configured, serving the bootstrap config");
    }

    if reconciler.health_checks_enabled() {
        let r = Arc::clone(&reconciler);
        tasks.push(tokio::spawn(drive("health", period, health_rx, shutdown.subscribe(), move |reason| {
            let r = Arc::clone(&r);
            async move { r.run_health(reason).await }
        })));
    } else {
        drop(health_rx);
    }

    if config.control.port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.control.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| StartupError::Bind { addr, source })?;
        let router = admin::setup_control_router(ControlState {
            subscription: sub_trigger,
            health: health_trigger,
            restart,
            serving: Arc::clone(&state),
            process,
            metrics,
        });
        let control_shutdown = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, router, control_shutdown).await {
                tracing::error!(error = %e, "Control surface failed");
            }
        }));
    }

    if let Err(e) = supervisor_task.await {
        tracing::error!(error = %e, "Supervisor task panicked");
    }
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Task panicked during shutdown");
        }
    }

    drop(rendered);
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Run the supervisor until SIGINT or SIGTERM.
pub async fn run(config: SupervisorConfig, metrics: Option<PrometheusHandle>) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));
    run_until(config, metrics, shutdown).await
}
