//! Gradio application supervisor
//!
//! Owns the single ViDubb child process: starts it, decides the launch
//! response, exposes its status and stops it.

use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::{
    process::Child,
    sync::{Mutex, RwLock},
    time::{sleep, Instant},
};

use crate::config::EnvConfig;
use crate::infra::{CommandError, CommandRunner, CommandSpec, SpawnedCommand};
use crate::state::log_hub::LogSink;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Application is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// What happened within the startup grace period
#[derive(Debug, Clone)]
pub enum LaunchOutcome {
    /// The process exited before the grace period elapsed
    Exited {
        exit_code: Option<i32>,
        success: bool,
        stdout: String,
        stderr: String,
    },
    /// Still alive after the grace period; now supervised
    Started { pid: Option<u32>, output: String },
    /// Killed by `stop` before the grace period elapsed
    Stopped { stdout: String },
}

enum Startup {
    Exited(Option<ExitStatus>),
    Stopped,
    Running,
}

/// Prefix of the supervisor's own lines in the app log
const LAUNCHER_PREFIX: &str = "[launcher]";

const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Serialize)]
pub struct AppStatus {
    pub running: bool,
    pub healthy: bool,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub exited_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub last_error: Option<String>,
    pub command: String,
    pub url: String,
}

struct ProcessState {
    child: Mutex<Option<Child>>,
    started_at: RwLock<Option<DateTime<Utc>>>,
    exited_at: RwLock<Option<DateTime<Utc>>>,
    exit_status: RwLock<Option<ExitStatus>>,
    last_error: RwLock<Option<String>>,
}

impl ProcessState {
    fn new() -> Self {
        Self {
            child: Mutex::new(None),
            started_at: RwLock::new(None),
            exited_at: RwLock::new(None),
            exit_status: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }
}

/// Resets the launching flag when the launch attempt ends
struct LaunchingGuard<'a>(&'a AtomicBool);

impl Drop for LaunchingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Supervises the Gradio app process
pub struct GradioSupervisor {
    command: CommandSpec,
    grace: Duration,
    url: String,
    http: reqwest::Client,
    sink: LogSink,
    launching: AtomicBool,
    stop_requested: AtomicBool,
    process: ProcessState,
}

/// Command line for the app: `<python> <script>` in the app directory
pub fn app_command(config: &EnvConfig) -> CommandSpec {
    let mut spec = CommandSpec::new(&config.python, &config.app_dir)
        .args([config.app_script.as_str()])
        .env("PYTHONPATH", config.app_python_path())
        .env("PYTHONUNBUFFERED", "1");
    if let Some(ref home) = config.home {
        spec = spec.env("HOME", home);
    }
    spec
}

impl GradioSupervisor {
    pub fn new(command: CommandSpec, grace: Duration, url: impl Into<String>, sink: LogSink) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap_or_default();

        Self {
            command,
            grace,
            url: url.into(),
            http,
            sink,
            launching: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            process: ProcessState::new(),
        }
    }

    pub fn from_config(config: &EnvConfig, sink: LogSink) -> Self {
        Self::new(
            app_command(config),
            config.startup_grace,
            config.gradio_url.clone(),
            sink,
        )
    }

    /// Start the app and wait at most one grace period for it to exit
    ///
    /// The child is supervised from the moment it is spawned, so `stop`
    /// and `status` see it during the grace period too. Exactly one
    /// outcome is produced: the child's exit, a stop request, or a startup
    /// acknowledgement once the grace period has elapsed.
    pub async fn launch(&self) -> Result<LaunchOutcome, LaunchError> {
        if self
            .launching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LaunchError::AlreadyRunning);
        }
        let _launching = LaunchingGuard(&self.launching);

        let (running, _) = self.process_state().await;
        if running {
            return Err(LaunchError::AlreadyRunning);
        }

        self.sink
            .stdout(&format!("{} starting {}", LAUNCHER_PREFIX, self.command.display()))
            .await;
        let started_at = Utc::now();

        let spawned = match CommandRunner::spawn(&self.command, Some(self.sink.clone())) {
            Ok(spawned) => spawned,
            Err(e) => {
                *self.process.last_error.write().await = Some(e.to_string());
                self.sink.stderr(&format!("{} {}", LAUNCHER_PREFIX, e)).await;
                return Err(e.into());
            }
        };
        let SpawnedCommand { child, output } = spawned;
        let pid = child.id();

        *self.process.started_at.write().await = Some(started_at);
        *self.process.exited_at.write().await = None;
        *self.process.exit_status.write().await = None;
        *self.process.last_error.write().await = None;
        self.stop_requested.store(false, Ordering::Release);
        *self.process.child.lock().await = Some(child);

        tracing::info!(pid = ?pid, command = %self.command.display(), "Gradio app spawned");

        match self.watch_startup().await? {
            Startup::Exited(status) => {
                let (stdout, stderr) = output.collect().await;
                let exit_code = status.and_then(|s| s.code());
                let success = status.is_some_and(|s| s.success());

                tracing::info!(exit_code = ?exit_code, "Gradio app exited during startup");
                Ok(LaunchOutcome::Exited {
                    exit_code,
                    success,
                    stdout,
                    stderr,
                })
            }
            Startup::Stopped => {
                let (stdout, _) = output.collect().await;
                tracing::info!(pid = ?pid, "Gradio app stopped during startup");
                Ok(LaunchOutcome::Stopped { stdout })
            }
            Startup::Running => {
                // 读取任务继续把输出写入日志中心
                drop(output);

                let output = self
                    .sink
                    .since(started_at)
                    .await
                    .into_iter()
                    .filter(|line| !line.is_stderr() && !line.content.starts_with(LAUNCHER_PREFIX))
                    .map(|line| line.content)
                    .collect::<Vec<_>>()
                    .join("\n");

                tracing::info!(pid = ?pid, grace = ?self.grace, "Gradio app startup initiated");
                Ok(LaunchOutcome::Started { pid, output })
            }
        }
    }

    /// Poll the supervised child until it exits, is stopped, or the grace
    /// period elapses
    async fn watch_startup(&self) -> Result<Startup, LaunchError> {
        let deadline = Instant::now() + self.grace;

        loop {
            {
                let mut child_guard = self.process.child.lock().await;
                let Some(child) = child_guard.as_mut() else {
                    // taken by stop() or reaped by a status query
                    if self.stop_requested.load(Ordering::Acquire) {
                        return Ok(Startup::Stopped);
                    }
                    return Ok(Startup::Exited(*self.process.exit_status.read().await));
                };

                if let Some(status) = child.try_wait().map_err(CommandError::WaitFailed)? {
                    *child_guard = None;
                    self.record_exit(status).await;
                    return Ok(Startup::Exited(Some(status)));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Startup::Running);
            }
            sleep(STARTUP_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Kill the app if it is running; returns whether it was
    ///
    /// Also applies while a launch is still inside its grace period.
    pub async fn stop(&self) -> bool {
        let mut child_guard = self.process.child.lock().await;
        let Some(mut child) = child_guard.take() else {
            return false;
        };
        self.stop_requested.store(true, Ordering::Release);

        self.sink
            .stdout(&format!("{} stopping application", LAUNCHER_PREFIX))
            .await;

        if let Err(e) = child.kill().await {
            let msg = format!("Failed to kill application: {}", e);
            tracing::warn!(error = %e, "Failed to kill Gradio app");
            *self.process.last_error.write().await = Some(msg);
        }

        match child.wait().await {
            Ok(status) => {
                *self.process.exited_at.write().await = Some(Utc::now());
                *self.process.exit_status.write().await = Some(status);
            }
            Err(e) => {
                *self.process.last_error.write().await =
                    Some(format!("Failed to wait for application: {}", e));
            }
        }

        tracing::info!("Gradio app stopped");
        true
    }

    pub async fn status(&self) -> AppStatus {
        let (running, pid) = self.process_state().await;
        let healthy = running && self.health_check().await;

        AppStatus {
            running,
            healthy,
            pid,
            started_at: *self.process.started_at.read().await,
            exited_at: *self.process.exited_at.read().await,
            exit_code: (*self.process.exit_status.read().await).and_then(|s| s.code()),
            last_error: self.process.last_error.read().await.clone(),
            command: self.command.display(),
            url: self.url.clone(),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.process_state().await.0
    }

    /// Reap an exited child and report (running, pid)
    async fn process_state(&self) -> (bool, Option<u32>) {
        let mut child_guard = self.process.child.lock().await;
        let Some(child) = child_guard.as_mut() else {
            return (false, None);
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                *child_guard = None;
                self.record_exit(status).await;
                drop(child_guard);
                self.sink
                    .stderr(&format!("{} application exited: {}", LAUNCHER_PREFIX, status))
                    .await;
                (false, None)
            }
            Ok(None) => (true, child.id()),
            Err(e) => {
                let pid = child.id();
                drop(child_guard);
                *self.process.last_error.write().await =
                    Some(format!("Failed to query application status: {}", e));
                (true, pid)
            }
        }
    }

    async fn record_exit(&self, status: ExitStatus) {
        *self.process.exited_at.write().await = Some(Utc::now());
        *self.process.exit_status.write().await = Some(status);
        if !status.success() {
            let label = status.code().map_or_else(|| "signal".to_string(), |c| c.to_string());
            *self.process.last_error.write().await =
                Some(format!("Application exited with {}", label));
        }
    }

    async fn health_check(&self) -> bool {
        match self.http.get(&self.url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, url = %self.url, "Gradio health probe failed");
                false
            }
        }
    }
}
