//! Batch health checking of endpoints.

use futures_util::future::join_all;
use std::time::Instant;

use crate::endpoint::Endpoint;
use crate::health::probe::{Probe, SocksProbe};
use crate::observability::metrics;

/// Probes a set of endpoints and keeps the ones that pass.
#[derive(Debug, Clone)]
pub struct HealthChecker<P = SocksProbe> {
    probe: P,
}

impl<P: Probe> HealthChecker<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    /// Probe every endpoint concurrently and return those that passed, in
    /// input order.
    pub async fn check(&self, endpoints: &[Endpoint]) -> Vec<Endpoint> {
        let outcomes = join_all(endpoints.iter().map(|ep| self.check_one(ep))).await;

        let healthy: Vec<Endpoint> = endpoints
            .iter()
            .zip(outcomes)
            .filter_map(|(ep, ok)| ok.then(|| ep.clone()))
            .collect();

        tracing::info!(
            probed = endpoints.len(),
            healthy = healthy.len(),
            "Endpoint health check finished"
        );
        healthy
    }

    async fn check_one(&self, endpoint: &Endpoint) -> bool {
        let start = Instant::now();
        let result = self.probe.probe(endpoint).await;
        let elapsed = start.elapsed();

        metrics::record_endpoint_check(endpoint.tag(), result.is_ok(), elapsed);

        match result {
            Ok(()) => {
                tracing::debug!(tag = %endpoint.tag(), elapsed_ms = elapsed.as_millis() as u64, "Endpoint healthy");
                true
            }
            Err(e) => {
                tracing::info!(tag = %endpoint.tag(), error = %e, "Endpoint probe failed");
                false
            }
        }
    }
}
