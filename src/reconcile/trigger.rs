//! Trigger-driven loop shared by both reconcilers.
//!
//! A run starts on a timer tick or an on-demand trigger. Runs execute inline,
//! so a loop never has two runs in flight; triggers arriving meanwhile wait in
//! the bounded queue.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::lifecycle::shutdown::ShutdownSignal;

/// Pending on-demand triggers per loop before senders wait.
pub const TRIGGER_QUEUE_CAPACITY: usize = 16;

/// Sending side of a loop's trigger queue.
#[derive(Debug, Clone)]
pub struct Trigger {
    name: &'static str,
    tx: mpsc::Sender<String>,
}

impl Trigger {
    /// Queue a run. Returns false once the loop has stopped.
    pub async fn fire(&self, reason: impl Into<String>) -> bool {
        let delivered = self.tx.send(reason.into()).await.is_ok();
        if !delivered {
            tracing::debug!(reconciler = self.name, "Trigger dropped, loop stopped");
        }
        delivered
    }
}

pub fn trigger_channel(name: &'static str) -> (Trigger, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(TRIGGER_QUEUE_CAPACITY);
    (Trigger { name, tx }, rx)
}

/// Run `run` on every tick of `period` (first tick one period from now) and on
/// every queued trigger, until shutdown. A run already in progress when
/// shutdown fires completes first.
pub async fn drive<F, Fut>(
    name: &'static str,
    period: Duration,
    mut triggers: mpsc::Receiver<String>,
    mut shutdown: ShutdownSignal,
    mut run: F,
) where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(reconciler = name, period_secs = period.as_secs(), "Reconciliation loop started");

    loop {
        let reason = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            Some(reason) = triggers.recv() => reason,
            _ = ticker.tick() => format!("{} seconds passed", period.as_secs()),
        };

        tracing::info!(reconciler = name, %reason, "Reconciliation triggered");
        run(reason).await;
    }

    triggers.close();
    tracing::info!(reconciler = name, "Reconciliation loop stopped");
}
