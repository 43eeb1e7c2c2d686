//! Subscription and health reconciliation.
//!
//! Both runs follow the same shape: gather (fetch or probe), diff against the
//! serving state, synthesize, persist, commit, and only then ask for a restart.
//! A failure anywhere before commit leaves the serving state untouched.

use std::path::PathBuf;
use std::sync::Arc;

use crate::endpoint::{self, Endpoint};
use crate::engine::render::write_config;
use crate::health::{HealthChecker, Probe, SocksProbe};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::lifecycle::supervisor::{RestartHandle, RestartSource};
use crate::observability::metrics;
use crate::reconcile::state::ServingState;
use crate::reconcile::{Outcome, ReconcileError};
use crate::subscription::SubscriptionSource;
use crate::synthesis;

/// Where a new config is written.
#[derive(Debug, Clone)]
pub struct ConfigFiles {
    /// Bootstrap path; receives the subscription-managed copy (best effort).
    pub managed: PathBuf,
    /// File the engine is launched against.
    pub rendered: PathBuf,
}

pub struct Reconciler<P = SocksProbe> {
    state: Arc<ServingState>,
    files: ConfigFiles,
    restart: RestartHandle,
    shutdown: ShutdownSignal,
    source: Option<SubscriptionSource>,
    checker: Option<HealthChecker<P>>,
}

impl Reconciler {
    pub fn new(
        state: Arc<ServingState>,
        files: ConfigFiles,
        restart: RestartHandle,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            state,
            files,
            restart,
            shutdown,
            source: None,
            checker: None,
        }
    }
}

impl<P: Probe> Reconciler<P> {
    pub fn with_subscription(mut self, source: SubscriptionSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_health_checker<Q: Probe>(self, checker: HealthChecker<Q>) -> Reconciler<Q> {
        Reconciler {
            state: self.state,
            files: self.files,
            restart: self.restart,
            shutdown: self.shutdown,
            source: self.source,
            checker: Some(checker),
        }
    }

    pub fn state(&self) -> &Arc<ServingState> {
        &self.state
    }

    pub fn health_checks_enabled(&self) -> bool {
        self.checker.is_some()
    }

    /// Fetch the subscription and apply it. Without a configured source this
    /// is a no-op.
    pub async fn refresh_subscription(&self) -> Result<Outcome, ReconcileError> {
        let Some(source) = &self.source else {
            return Ok(Outcome::Unchanged);
        };
        let endpoints = source.fetch().await?;
        tracing::info!(url = %source.url(), count = endpoints.len(), "Subscription fetched");
        self.apply_subscription(endpoints).await
    }

    /// Replace the endpoint set if its canonical forms differ from the last
    /// applied one. Every fetched endpoint starts out healthy.
    pub async fn apply_subscription(&self, endpoints: Vec<Endpoint>) -> Result<Outcome, ReconcileError> {
        let mut state = self.state.lock().await;

        if endpoint::canonical_forms(&state.fetched) == endpoint::canonical_forms(&endpoints) {
            tracing::debug!(count = endpoints.len(), "Subscription unchanged");
            return Ok(Outcome::Unchanged);
        }

        let synthesis = synthesis::override_endpoints(&state.config, &endpoints)?;

        if let Err(e) = write_config(&self.files.managed, &synthesis.config).await {
            tracing::warn!(error = %e, "Saving subscription-managed config failed");
        }
        write_config(&self.files.rendered, &synthesis.config).await?;

        tracing::info!(
            previous = state.fetched.len(),
            current = synthesis.endpoints.len(),
            selector = ?endpoint::tags(&synthesis.endpoints),
            "Subscription changed"
        );
        state.config = synthesis.config;
        state.healthy = synthesis.endpoints.clone();
        state.fetched = synthesis.endpoints;
        Ok(Outcome::Changed)
    }

    /// Probe the last fetched endpoints and rebalance onto the healthy ones.
    /// No-op without a health checker or before the first subscription.
    pub async fn recheck_health(&self) -> Result<Outcome, ReconcileError> {
        let Some(checker) = &self.checker else {
            return Ok(Outcome::Unchanged);
        };

        let candidates = self.state.fetched().await;
        if candidates.is_empty() {
            tracing::debug!("No subscription endpoints to check");
            return Ok(Outcome::Unchanged);
        }

        let healthy = checker.check(&candidates).await;

        let mut state = self.state.lock().await;
        if endpoint::canonical_forms(&state.fetched) != endpoint::canonical_forms(&candidates) {
            tracing::info!("Subscription changed during health check, discarding results");
            return Ok(Outcome::Unchanged);
        }

        if identity(&state.healthy) == identity(&healthy) {
            tracing::debug!(healthy = healthy.len(), "Healthy set unchanged");
            return Ok(Outcome::Unchanged);
        }

        let config = synthesis::balance(&state.config, &healthy)?;
        write_config(&self.files.rendered, &config).await?;

        tracing::info!(
            previous = state.healthy.len(),
            current = healthy.len(),
            selector = ?endpoint::tags(&healthy),
            "Healthy set changed"
        );
        state.config = config;
        state.healthy = healthy;
        Ok(Outcome::Changed)
    }

    /// One subscription loop iteration.
    pub async fn run_subscription(&self, reason: String) {
        let outcome = self.refresh_subscription().await;
        self.finish("subscription", &reason, outcome, RestartSource::Subscription, metrics::record_subscription_refresh)
            .await;
    }

    /// One health loop iteration.
    pub async fn run_health(&self, reason: String) {
        let outcome = self.recheck_health().await;
        self.finish("health", &reason, outcome, RestartSource::Health, metrics::record_health_recheck)
            .await;
    }

    async fn finish(
        &self,
        name: &'static str,
        reason: &str,
        outcome: Result<Outcome, ReconcileError>,
        source: RestartSource,
        record: fn(&'static str),
    ) {
        match outcome {
            Ok(Outcome::Changed) => {
                record(Outcome::Changed.as_str());
                if self.shutdown.is_triggered() {
                    tracing::info!(reconciler = name, "Shutting down, restart not requested");
                } else if !self.restart.request(source).await {
                    tracing::warn!(reconciler = name, "Supervisor stopped, restart not requested");
                }
            }
            Ok(Outcome::Unchanged) => record(Outcome::Unchanged.as_str()),
            Err(e) => {
                record("failed");
                tracing::warn!(reconciler = name, %reason, error = %e, "Reconciliation failed, keeping current config");
            }
        }
    }
}

fn identity(endpoints: &[Endpoint]) -> Vec<(&str, &str)> {
    endpoints
        .iter()
        .map(|ep| (ep.tag(), ep.canonical_form()))
        .collect()
}
