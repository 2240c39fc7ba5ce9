use crate::log::{self, LogRing, LogStream};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::process::{Child, Command};
use tokio::sync::{RwLock, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// How long the gateway gets to honour SIGINT before it is killed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Extra time `shutdown` waits past the grace period for the exit to be seen.
pub const SHUTDOWN_MARGIN: Duration = Duration::from_secs(2);

/// Subcommand passed to the gateway binary; no other arguments are given.
pub const GATEWAY_SUBCOMMAND: &str = "gateway";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("binary not found: {}", .0.display())]
    BinaryMissing(PathBuf),
    #[error("config not found — create default config first")]
    ConfigMissing,
    #[error("gateway is already running")]
    AlreadyRunning,
    #[error("gateway is not running")]
    NotRunning,
    #[error("failed to start: {0}")]
    SpawnFailed(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Starting => write!(f, "starting"),
            Phase::Running => write!(f, "running"),
            Phase::Stopping => write!(f, "stopping"),
        }
    }
}

struct RunningGateway {
    pid: u32,
    started_at: Instant,
    cancel: CancellationToken,
}

/// `Starting` reserves the slot while the binary is spawned outside the lock.
/// Only the completion watcher moves `Running`/`Stopping` back to `Idle`.
enum GatewayState {
    Idle,
    Starting,
    Running(RunningGateway),
    Stopping(RunningGateway),
}

impl GatewayState {
    fn phase(&self) -> Phase {
        match self {
            GatewayState::Idle => Phase::Idle,
            GatewayState::Starting => Phase::Starting,
            GatewayState::Running(_) => Phase::Running,
            GatewayState::Stopping(_) => Phase::Stopping,
        }
    }

    fn gateway(&self) -> Option<&RunningGateway> {
        match self {
            GatewayState::Running(g) | GatewayState::Stopping(g) => Some(g),
            GatewayState::Idle | GatewayState::Starting => None,
        }
    }
}

/// Point-in-time view of the supervisor, taken under the read lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayStatus {
    pub phase: Phase,
    pub running: bool,
    /// 0 when not running.
    pub pid: u32,
    /// Empty when not running.
    pub uptime: String,
}

/// Render whole seconds as `1h2m3s`, `4m5s` or `6s`.
pub fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Supervisor {
    binary_path: PathBuf,
    config_path: PathBuf,
    grace_period: Duration,
    state: Arc<RwLock<GatewayState>>,
    running_tx: Arc<watch::Sender<bool>>,
    logs: LogRing,
}

impl Supervisor {
    pub fn new(binary_path: PathBuf, config_path: PathBuf, logs: LogRing) -> Self {
        let (running_tx, _) = watch::channel(false);
        Self {
            binary_path,
            config_path,
            grace_period: DEFAULT_GRACE_PERIOD,
            state: Arc::new(RwLock::new(GatewayState::Idle)),
            running_tx: Arc::new(running_tx),
            logs,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub async fn status(&self) -> GatewayStatus {
        let state = self.state.read().await;
        let phase = state.phase();
        match state.gateway() {
            Some(g) => GatewayStatus {
                phase,
                running: true,
                pid: g.pid,
                uptime: format_uptime(g.started_at.elapsed()),
            },
            None => GatewayStatus {
                phase,
                running: false,
                pid: 0,
                uptime: String::new(),
            },
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.gateway().is_some()
    }

    /// Launch `<binary> gateway` and return its pid without waiting for it
    /// to become ready.
    ///
    /// The launch runs on its own task, so dropping this future (a client
    /// hanging up mid-request) never strands the supervisor in `Starting`.
    pub async fn start(&self) -> Result<u32, SupervisorError> {
        let this = self.clone();
        match tokio::spawn(async move { this.start_detached().await }).await {
            Ok(result) => result,
            Err(e) => {
                let mut state = self.state.write().await;
                if matches!(*state, GatewayState::Starting) {
                    *state = GatewayState::Idle;
                }
                Err(SupervisorError::SpawnFailed(io::Error::other(e)))
            }
        }
    }

    async fn start_detached(&self) -> Result<u32, SupervisorError> {
        {
            let mut state = self.state.write().await;
            if !matches!(*state, GatewayState::Idle) {
                return Err(SupervisorError::AlreadyRunning);
            }
            *state = GatewayState::Starting;
        }

        let (mut child, pid) = match self.launch().await {
            Ok(launched) => launched,
            Err(e) => {
                *self.state.write().await = GatewayState::Idle;
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        {
            let mut state = self.state.write().await;
            *state = GatewayState::Running(RunningGateway {
                pid,
                started_at: Instant::now(),
                cancel: cancel.clone(),
            });
            self.running_tx.send_replace(true);
            self.logs.push(format!("Gateway started (PID: {pid})"));
        }
        tracing::info!(pid, binary = %self.binary_path.display(), "gateway started");

        if let Some(stdout) = child.stdout.take() {
            log::spawn_log_copier(LogStream::Stdout, stdout, self.logs.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            log::spawn_log_copier(LogStream::Stderr, stderr, self.logs.clone());
        }
        self.spawn_watcher(child, pid, cancel);

        Ok(pid)
    }

    async fn launch(&self) -> Result<(Child, u32), SupervisorError> {
        if !fs::try_exists(&self.binary_path).await.unwrap_or(false) {
            return Err(SupervisorError::BinaryMissing(self.binary_path.clone()));
        }
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            return Err(SupervisorError::ConfigMissing);
        }

        let mut child = Command::new(&self.binary_path)
            .arg(GATEWAY_SUBCOMMAND)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match child.id() {
            Some(pid) => Ok((child, pid)),
            None => {
                let _ = child.wait().await;
                Err(SupervisorError::SpawnFailed(io::Error::other(
                    "gateway exited before its pid was read",
                )))
            }
        }
    }

    /// Ask the gateway to exit. Returns once the request is issued; the
    /// watcher reports the actual exit. Repeating a stop while one is in
    /// flight is a no-op.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let mut state = self.state.write().await;
        match &*state {
            GatewayState::Running(_) => {}
            GatewayState::Stopping(_) => return Ok(()),
            GatewayState::Idle | GatewayState::Starting => {
                return Err(SupervisorError::NotRunning);
            }
        }

        if let GatewayState::Running(gateway) = std::mem::replace(&mut *state, GatewayState::Idle)
        {
            self.logs.push("Stopping gateway...");
            tracing::info!(pid = gateway.pid, "stopping gateway");
            gateway.cancel.cancel();
            *state = GatewayState::Stopping(gateway);
        }
        Ok(())
    }

    /// Resolves once no gateway is running.
    pub async fn wait_for_exit(&self) {
        let mut rx = self.running_tx.subscribe();
        let _ = rx.wait_for(|running| !*running).await;
    }

    /// Stop the gateway (if any) and wait for it to go away, bounded by the
    /// grace period plus [`SHUTDOWN_MARGIN`].
    pub async fn shutdown(&self) {
        if self.stop().await.is_err() {
            return;
        }
        let deadline = self.grace_period + SHUTDOWN_MARGIN;
        if tokio::time::timeout(deadline, self.wait_for_exit()).await.is_err() {
            tracing::warn!("gateway still running at shutdown deadline, killing it on exit");
        }
    }

    fn spawn_watcher(&self, child: Child, pid: u32, cancel: CancellationToken) {
        let state = Arc::clone(&self.state);
        let running_tx = Arc::clone(&self.running_tx);
        let logs = self.logs.clone();
        let grace_period = self.grace_period;

        tokio::spawn(async move {
            let status = wait_with_stop(child, pid, &cancel, grace_period, &logs).await;

            {
                let mut state = state.write().await;
                *state = GatewayState::Idle;
                running_tx.send_replace(false);
            }

            match status {
                Ok(status) if status.success() => {
                    logs.push("Gateway stopped");
                    tracing::info!(pid, "gateway stopped");
                }
                Ok(status) => {
                    logs.push(format!("Gateway exited: {status}"));
                    tracing::warn!(pid, %status, "gateway exited");
                }
                Err(e) => {
                    logs.push(format!("Gateway exited: {e}"));
                    tracing::error!(pid, error = %e, "failed waiting for gateway");
                }
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Exit handling
// ---------------------------------------------------------------------------

/// Wait for the child to exit on its own, or for `cancel` to request a stop.
///
/// On a stop request the child gets SIGINT and `grace_period` to exit before
/// it is killed. The timer lives only as long as the wait, and every signal
/// goes through the still-unreaped `child`, so a reused pid is never hit.
async fn wait_with_stop(
    mut child: Child,
    pid: u32,
    cancel: &CancellationToken,
    grace_period: Duration,
    logs: &LogRing,
) -> io::Result<ExitStatus> {
    tokio::select! {
        status = child.wait() => return status,
        _ = cancel.cancelled() => {}
    }

    if !send_interrupt(&child) {
        force_kill(&mut child, pid);
        return child.wait().await;
    }

    match tokio::time::timeout(grace_period, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            logs.push(format!(
                "Gateway did not exit within {}s, killing",
                grace_period.as_secs_f32()
            ));
            tracing::warn!(pid, "gateway ignored interrupt, killing");
            force_kill(&mut child, pid);
            child.wait().await
        }
    }
}

fn force_kill(child: &mut Child, pid: u32) {
    if let Err(e) = child.start_kill() {
        tracing::warn!(pid, error = %e, "failed to kill gateway");
    }
}

#[cfg(unix)]
fn send_interrupt(child: &Child) -> bool {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return false;
    };
    signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT).is_ok()
}

#[cfg(not(unix))]
fn send_interrupt(_child: &Child) -> bool {
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
