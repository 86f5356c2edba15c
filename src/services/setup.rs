//! Environment setup
//!
//! Runs the installer chain (`pip install --upgrade pip`, then
//! `pip install -r requirements.txt`). The first failing step aborts the
//! chain; every run re-executes all steps.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::EnvConfig;
use crate::domain::{LogSource, SetupReport, SetupStep};
use crate::infra::{CommandRunner, CommandSpec};
use crate::state::{log_hub::LogSink, AppState};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Environment setup already in progress")]
    AlreadyRunning,
}

/// The step that broke the chain
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub step: String,
    pub exit_code: Option<i32>,
    pub error: String,
}

/// Result of one setup run
#[derive(Debug, Clone)]
pub struct SetupOutcome {
    pub report: SetupReport,
    /// stdout of every executed step, concatenated
    pub output: String,
    pub failure: Option<StepFailure>,
}

impl SetupOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Execution context for a setup run
#[derive(Clone)]
pub struct SetupContext {
    pub work_dir: PathBuf,
    pub timeout: Duration,
    pub sink: LogSink,
    /// Slot that mirrors the in-flight report for `/status`
    pub report: Arc<RwLock<Option<SetupReport>>>,
}

impl SetupContext {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            work_dir: state.config.app_dir.clone(),
            timeout: state.config.setup_timeout,
            sink: state.log_hub.sink(LogSource::Setup),
            report: state.last_setup.clone(),
        }
    }

    async fn publish(&self, report: &SetupReport) {
        *self.report.write().await = Some(report.clone());
    }
}

/// Installer steps derived from configuration
pub fn plan(config: &EnvConfig) -> Vec<SetupStep> {
    vec![
        SetupStep::new(
            "upgrade_pip",
            "Upgrade pip",
            &config.python,
            &["-m", "pip", "install", "--upgrade", "pip"],
        ),
        SetupStep::new(
            "install_requirements",
            "Install requirements",
            &config.python,
            &["-m", "pip", "install", "-r", config.requirements.as_str()],
        ),
    ]
}

/// Run setup for the launcher, rejecting concurrent runs
pub async fn execute(state: &AppState) -> Result<SetupOutcome, SetupError> {
    let _guard = state
        .setup_lock
        .try_lock()
        .map_err(|_| SetupError::AlreadyRunning)?;

    let steps = plan(&state.config);
    let ctx = SetupContext::from_state(state);

    tracing::info!(steps = steps.len(), work_dir = %ctx.work_dir.display(), "Environment setup started");
    let outcome = run_steps(&ctx, &steps).await;

    match &outcome.failure {
        None => tracing::info!(setup_id = %outcome.report.id, "Environment setup completed"),
        Some(failure) => tracing::warn!(
            setup_id = %outcome.report.id,
            step = %failure.step,
            exit_code = ?failure.exit_code,
            "Environment setup failed"
        ),
    }

    Ok(outcome)
}

/// Execute `steps` in order, stopping at the first failure
pub async fn run_steps(ctx: &SetupContext, steps: &[SetupStep]) -> SetupOutcome {
    let mut report = SetupReport::new(steps);
    let mut output = String::new();
    let mut failure: Option<StepFailure> = None;

    ctx.sink.stdout("=== Starting environment setup ===").await;

    for (i, step) in steps.iter().enumerate() {
        if failure.is_some() {
            report.stages[i].skip(Some("previous step failed".to_string()));
            continue;
        }

        report.stages[i].start();
        ctx.publish(&report).await;
        ctx.sink.stdout(&format!(">>> {}", step.command_line())).await;

        let spec = CommandSpec::new(&step.program, &ctx.work_dir).args(step.args.iter().cloned());

        match CommandRunner::run_captured(&spec, Some(ctx.sink.clone()), ctx.timeout).await {
            Ok(captured) => {
                output.push_str(&captured.stdout);

                if captured.success {
                    report.stages[i].finish(true, captured.exit_code, None);
                    continue;
                }

                let error = if captured.timed_out {
                    format!(
                        "{} timed out after {}s\n{}",
                        step.display_name,
                        ctx.timeout.as_secs(),
                        captured.stderr
                    )
                } else if captured.stderr.trim().is_empty() {
                    format!("{} exited with {}", step.display_name, exit_label(captured.exit_code))
                } else {
                    captured.stderr
                };

                report.stages[i].finish(
                    false,
                    captured.exit_code,
                    Some(format!("exited with {}", exit_label(captured.exit_code))),
                );
                failure = Some(StepFailure {
                    step: step.display_name.clone(),
                    exit_code: captured.exit_code,
                    error,
                });
            }
            Err(e) => {
                tracing::error!(step = %step.name, error = %e, "Failed to run setup step");
                report.stages[i].finish(false, None, Some(e.to_string()));
                failure = Some(StepFailure {
                    step: step.display_name.clone(),
                    exit_code: None,
                    error: e.to_string(),
                });
            }
        }

        if let Some(ref f) = failure {
            ctx.sink
                .stderr(&format!("=== {} failed ({}) ===", f.step, exit_label(f.exit_code)))
                .await;
        }
    }

    if failure.is_none() {
        ctx.sink.stdout("=== Environment setup completed ===").await;
    }

    report.complete(failure.is_none());
    ctx.publish(&report).await;

    SetupOutcome {
        report,
        output,
        failure,
    }
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code".to_string(),
    }
}
