//! Engine process supervision.
//!
//! # Responsibilities
//! - Launch the engine as `<binary> -config <rendered file>` with the asset
//!   directory exported, relaunching whenever it exits
//! - Publish the running process so restart requests can reach it
//! - Turn restart requests into a stop signal; the relaunch does the rest
//!
//! Only the respawn loop signals the child, and only while it has not reaped
//! it, so a pid recycled after exit is never signalled. The restart handler
//! just wakes the generation it found in the slot; a stale handle wakes
//! nobody.
//! - Stop the engine on shutdown

use arc_swap::ArcSwapOption;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Notify};

use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::retries::retry_bounded;

/// Environment variable telling the engine where its asset files live.
pub const ASSET_DIR_ENV: &str = "V2RAY_LOCATION_ASSET";

/// Stop signal delivery attempts per restart request.
pub const STOP_SIGNAL_ATTEMPTS: u32 = 3;

/// Pending restart requests before senders wait.
pub const RESTART_QUEUE_CAPACITY: usize = 16;

const DEFAULT_SPAWN_RETRY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("pid {0} is out of range")]
    InvalidPid(u32),

    #[cfg(unix)]
    #[error("signalling pid {pid} failed: {source}")]
    Send {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },

    #[cfg(not(unix))]
    #[error("signalling processes is not supported on this platform")]
    Unsupported,
}

/// How to launch the engine.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    pub binary: PathBuf,
    pub config_path: PathBuf,
    pub asset_dir: PathBuf,
}

impl EngineCommand {
    fn spawn(&self) -> std::io::Result<Child> {
        Command::new(&self.binary)
            .arg("-config")
            .arg(&self.config_path)
            .env(ASSET_DIR_ENV, &self.asset_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
    }
}

/// A launched engine process.
#[derive(Debug)]
pub struct EngineProcess {
    pid: u32,
    generation: u64,
    started_at: Instant,
    stop: Arc<Notify>,
}

impl EngineProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Launch counter, starting at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Ask the respawn loop that launched this generation to stop it.
    fn request_stop(&self) {
        self.stop.notify_one();
    }
}

#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<(), SignalError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| SignalError::InvalidPid(pid))?;
    kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|source| SignalError::Send { pid, source })
}

#[cfg(not(unix))]
fn send_terminate(_pid: u32) -> Result<(), SignalError> {
    Err(SignalError::Unsupported)
}

/// Shared handle to the currently running engine, empty between launches.
pub type ProcessSlot = Arc<ArcSwapOption<EngineProcess>>;

/// Who asked for a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartSource {
    Subscription,
    Health,
    Control,
}

impl RestartSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartSource::Subscription => "subscription",
            RestartSource::Health => "health",
            RestartSource::Control => "control",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RestartRequest {
    pub source: RestartSource,
}

/// Sending side of the restart queue.
#[derive(Debug, Clone)]
pub struct RestartHandle {
    tx: mpsc::Sender<RestartRequest>,
}

impl RestartHandle {
    /// Queue a restart. Returns false once the supervisor has stopped.
    pub async fn request(&self, source: RestartSource) -> bool {
        metrics::record_restart_request(source.as_str());
        self.tx.send(RestartRequest { source }).await.is_ok()
    }
}

/// Create the restart queue shared by the reconcilers and the control surface.
pub fn restart_channel() -> (RestartHandle, mpsc::Receiver<RestartRequest>) {
    let (tx, rx) = mpsc::channel(RESTART_QUEUE_CAPACITY);
    (RestartHandle { tx }, rx)
}

/// Keeps exactly one engine process running until shutdown.
pub struct Supervisor {
    command: EngineCommand,
    slot: ProcessSlot,
    spawn_retry_delay: Duration,
    stop_grace: Duration,
}

impl Supervisor {
    pub fn new(command: EngineCommand) -> Self {
        Self {
            command,
            slot: Arc::new(ArcSwapOption::empty()),
            spawn_retry_delay: DEFAULT_SPAWN_RETRY_DELAY,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// Pause before relaunching after a failed spawn.
    pub fn with_spawn_retry_delay(mut self, delay: Duration) -> Self {
        self.spawn_retry_delay = delay;
        self
    }

    /// Time the engine gets to exit after the stop signal on shutdown.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn slot(&self) -> ProcessSlot {
        Arc::clone(&self.slot)
    }

    /// Run the respawn loop and the restart handler until shutdown.
    pub async fn run(self, restarts: mpsc::Receiver<RestartRequest>, shutdown: ShutdownSignal) {
        let handler = tokio::spawn(handle_restarts(self.slot(), restarts, shutdown.clone()));
        self.respawn_loop(shutdown).await;
        if let Err(e) = handler.await {
            tracing::error!(error = %e, "Restart handler panicked");
        }
    }

    async fn respawn_loop(&self, mut shutdown: ShutdownSignal) {
        let mut generation = 0;

        'respawn: while !shutdown.is_triggered() {
            let mut child = match self.command.spawn() {
                Ok(child) => child,
                Err(e) => {
                    tracing::error!(
                        binary = %self.command.binary.display(),
                        error = %e,
                        "Launching engine failed"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(self.spawn_retry_delay) => continue,
                        _ = shutdown.recv() => break,
                    }
                }
            };

            generation += 1;
            metrics::record_process_launch();

            let pid = child.id();
            let stop = Arc::new(Notify::new());
            if let Some(pid) = pid {
                self.slot.store(Some(Arc::new(EngineProcess {
                    pid,
                    generation,
                    started_at: Instant::now(),
                    stop: Arc::clone(&stop),
                })));
                tracing::info!(pid, generation, "Engine launched");
            }

            loop {
                tokio::select! {
                    status = child.wait() => {
                        self.slot.store(None);
                        match status {
                            Ok(status) if status.success() => tracing::info!(generation, "Engine exited"),
                            Ok(status) => tracing::warn!(generation, %status, "Engine exited abnormally"),
                            Err(e) => tracing::error!(generation, error = %e, "Waiting on engine failed"),
                        }
                        break;
                    }
                    _ = stop.notified() => {
                        // Not reaped yet: the pid still belongs to this child.
                        if let Some(pid) = pid {
                            signal_restart(pid, generation);
                        }
                    }
                    _ = shutdown.recv() => {
                        self.stop(&mut child, pid).await;
                        self.slot.store(None);
                        break 'respawn;
                    }
                }
            }
        }

        tracing::info!("Engine supervisor stopped");
    }

    async fn stop(&self, child: &mut Child, pid: Option<u32>) {
        tracing::info!(?pid, "Stopping engine");
        let signalled = match pid {
            Some(pid) => match send_terminate(pid) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(pid, error = %e, "Stop signal failed");
                    false
                }
            },
            None => false,
        };

        if signalled {
            if let Ok(status) = tokio::time::timeout(self.stop_grace, child.wait()).await {
                tracing::info!(?status, "Engine stopped");
                return;
            }
            tracing::warn!(grace_secs = self.stop_grace.as_secs(), "Engine ignored stop signal, killing");
        }

        if let Err(e) = child.kill().await {
            tracing::error!(error = %e, "Killing engine failed");
        }
    }
}

fn signal_restart(pid: u32, generation: u64) {
    match retry_bounded(STOP_SIGNAL_ATTEMPTS, |_| send_terminate(pid)) {
        Ok(((), attempts)) => tracing::debug!(pid, generation, attempts, "Stop signal delivered"),
        Err(e) => tracing::error!(pid, generation, error = %e, "Giving up on engine restart"),
    }
}

/// Stop the current engine for every queued request; the respawn loop brings
/// it back with the freshly rendered config.
pub async fn handle_restarts(
    slot: ProcessSlot,
    mut requests: mpsc::Receiver<RestartRequest>,
    mut shutdown: ShutdownSignal,
) {
    loop {
        let request = tokio::select! {
            _ = shutdown.recv() => break,
            request = requests.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let Some(process) = slot.load_full() else {
            tracing::info!(source = request.source.as_str(), "No engine running, restart skipped");
            continue;
        };

        tracing::info!(
            pid = process.pid(),
            generation = process.generation(),
            source = request.source.as_str(),
            "Restarting engine"
        );
        process.request_stop();
    }

    requests.close();
}
