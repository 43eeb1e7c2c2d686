use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::admin::ControlState;
use crate::lifecycle::supervisor::RestartSource;

const TRIGGER_REASON: &str = "control request";

#[derive(Debug, Serialize)]
pub struct SupervisorStatus {
    pub version: &'static str,
    pub engine: Option<EngineStatus>,
    pub fetched_endpoints: usize,
    pub selector: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EngineStatus {
    pub pid: u32,
    pub generation: u64,
    pub uptime_secs: u64,
}

pub async fn trigger_subscription(State(state): State<ControlState>) -> StatusCode {
    if !state.subscription.fire(TRIGGER_REASON).await {
        tracing::info!("Subscription refresh is not running, trigger dropped");
    }
    StatusCode::ACCEPTED
}

pub async fn trigger_health_check(State(state): State<ControlState>) -> StatusCode {
    if !state.health.fire(TRIGGER_REASON).await {
        tracing::info!("Health check is not running, trigger dropped");
    }
    StatusCode::ACCEPTED
}

pub async fn restart_engine(State(state): State<ControlState>) -> StatusCode {
    if !state.restart.request(RestartSource::Control).await {
        tracing::warn!("Supervisor stopped, restart dropped");
    }
    StatusCode::ACCEPTED
}

pub async fn get_metrics(State(state): State<ControlState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn get_status(State(state): State<ControlState>) -> Json<SupervisorStatus> {
    let snapshot = state.serving.snapshot().await;
    let engine = state.process.load_full().map(|p| EngineStatus {
        pid: p.pid(),
        generation: p.generation(),
        uptime_secs: p.uptime().as_secs(),
    });

    Json(SupervisorStatus {
        version: env!("CARGO_PKG_VERSION"),
        engine,
        fetched_endpoints: snapshot.fetched.len(),
        selector: snapshot.config.selector().to_vec(),
    })
}
