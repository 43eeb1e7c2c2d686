//! Control surface.
//!
//! # Routes
//! - `/api/sub` → queue a subscription refresh (202)
//! - `/api/sub/check` → queue a health re-check (202)
//! - `/api/core/restart` → queue an engine restart (202)
//! - `/api/status` → engine process and selector summary
//! - `/metrics` → Prometheus exposition
//!
//! Triggers are accepted whether or not the run they start succeeds.

pub mod handlers;

use axum::{
    routing::{any, get},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use self::handlers::*;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::lifecycle::supervisor::{ProcessSlot, RestartHandle};
use crate::reconcile::{ServingState, Trigger};

#[derive(Clone)]
pub struct ControlState {
    pub subscription: Trigger,
    pub health: Trigger,
    pub restart: RestartHandle,
    pub serving: Arc<ServingState>,
    pub process: ProcessSlot,
    pub metrics: Option<PrometheusHandle>,
}

pub fn setup_control_router(state: ControlState) -> Router {
    Router::new()
        .route("/api/sub", any(trigger_subscription))
        .route("/api/sub/check", any(trigger_health_check))
        .route("/api/core/restart", any(restart_engine))
        .route("/api/status", get(get_status))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the control surface until shutdown.
pub async fn serve(listener: TcpListener, router: Router, mut shutdown: ShutdownSignal) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Control surface listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.recv().await })
        .await
}
