//! 命令执行器
//!
//! 提供统一的子进程执行接口，支持：
//! - 逐行读取 stdout/stderr，同时写入日志中心并完整捕获
//! - 超时控制
//! - 分离运行（长期运行的应用进程）

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::state::log_hub::LogSink;

/// 命令执行错误
#[derive(Debug, Error)]
pub enum CommandError {
    /// 命令启动失败
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// 等待命令完成失败
    #[error("Failed to wait for command: {0}")]
    WaitFailed(#[source] std::io::Error),
}

/// 要执行的命令
#[derive(Clone, Debug)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: work_dir.into(),
            envs: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// 命令行的可读形式，用于日志
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 捕获的命令结果
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    /// 退出码（被信号终止时为 None）
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// 是否因超时而终止
    pub timed_out: bool,
}

/// 子进程退出后等待输出读取结束的最长时间
///
/// 继承了管道的孙进程可能在子进程退出后继续占用管道
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 已启动的子进程及其输出读取任务
pub struct SpawnedCommand {
    pub child: Child,
    pub output: OutputCapture,
}

/// stdout/stderr 读取任务
///
/// 丢弃时读取任务继续运行，输出照常写入日志中心
pub struct OutputCapture {
    stdout: CaptureTask,
    stderr: CaptureTask,
}

impl OutputCapture {
    /// 等待输出读取结束，返回 (stdout, stderr)
    ///
    /// 最多等待 `OUTPUT_DRAIN_TIMEOUT`，超时后中止读取并返回已读到的内容
    pub async fn collect(self) -> (String, String) {
        let (stdout, stderr) = tokio::join!(
            self.stdout.finish(OUTPUT_DRAIN_TIMEOUT),
            self.stderr.finish(OUTPUT_DRAIN_TIMEOUT),
        );
        (stdout, stderr)
    }
}

struct CaptureTask {
    stream: &'static str,
    task: JoinHandle<()>,
    captured: Arc<Mutex<String>>,
}

impl CaptureTask {
    async fn finish(self, wait: Duration) -> String {
        let mut task = self.task;
        if tokio::time::timeout(wait, &mut task).await.is_err() {
            task.abort();
            warn!(stream = self.stream, "Output pipe still open after exit, stopped reading");
        }
        std::mem::take(&mut *self.captured.lock().await)
    }
}

/// 命令执行器
pub struct CommandRunner;

impl CommandRunner {
    /// 启动命令并挂上 stdout/stderr 读取任务
    ///
    /// 子进程设置了 kill_on_drop，句柄被丢弃时进程会被终止
    pub fn spawn(spec: &CommandSpec, sink: Option<LogSink>) -> Result<SpawnedCommand, CommandError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &spec.envs {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| CommandError::SpawnFailed {
            program: spec.program.clone(),
            source,
        })?;

        debug!(command = %spec.display(), pid = ?child.id(), "Spawned command");

        let output = OutputCapture {
            stdout: spawn_reader(child.stdout.take(), sink.clone(), "stdout"),
            stderr: spawn_reader(child.stderr.take(), sink, "stderr"),
        };

        Ok(SpawnedCommand { child, output })
    }

    /// 执行命令直到退出或超时，捕获全部输出
    pub async fn run_captured(
        spec: &CommandSpec,
        sink: Option<LogSink>,
        timeout: Duration,
    ) -> Result<CapturedOutput, CommandError> {
        let mut spawned = Self::spawn(spec, sink)?;

        let (status, timed_out) = tokio::select! {
            status = spawned.child.wait() => {
                (status.map_err(CommandError::WaitFailed)?, false)
            }
            _ = tokio::time::sleep(timeout) => {
                error!(command = %spec.display(), "Command timed out after {:?}", timeout);
                let _ = spawned.child.kill().await;
                // 等待进程实际终止
                (spawned.child.wait().await.map_err(CommandError::WaitFailed)?, true)
            }
        };

        let (stdout, stderr) = spawned.output.collect().await;

        Ok(CapturedOutput {
            exit_code: status.code(),
            success: status.success() && !timed_out,
            stdout,
            stderr,
            timed_out,
        })
    }
}

fn spawn_reader<R>(pipe: Option<R>, sink: Option<LogSink>, stream: &'static str) -> CaptureTask
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let captured = Arc::new(Mutex::new(String::new()));
    let buffer = captured.clone();

    let task = tokio::spawn(async move {
        let Some(pipe) = pipe else {
            return;
        };

        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(ref sink) = sink {
                sink.push(stream, &line).await;
            }
            let mut buffer = buffer.lock().await;
            buffer.push_str(&line);
            buffer.push('\n');
        }
    });

    CaptureTask {
        stream,
        task,
        captured,
    }
}
