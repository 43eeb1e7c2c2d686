//! The serving state shared by both reconciliation loops.

use tokio::sync::{Mutex, MutexGuard};

use crate::endpoint::Endpoint;
use crate::engine::model::EngineConfig;

/// What the engine is (or is about to be) running.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Config most recently written to the rendered file.
    pub config: EngineConfig,
    /// Endpoints of the last applied subscription, with check ports bound.
    pub fetched: Vec<Endpoint>,
    /// Endpoints currently in the balancer selector.
    pub healthy: Vec<Endpoint>,
}

/// Lock-guarded serving state. Writers hold the lock from diff to commit so
/// the three fields always change together.
#[derive(Debug)]
pub struct ServingState {
    inner: Mutex<Snapshot>,
}

impl ServingState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            inner: Mutex::new(Snapshot {
                config,
                fetched: Vec::new(),
                healthy: Vec::new(),
            }),
        }
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> Snapshot {
        self.inner.lock().await.clone()
    }

    pub async fn fetched(&self) -> Vec<Endpoint> {
        self.inner.lock().await.fetched.clone()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.inner.lock().await
    }
}
