//! 环境安装相关领域模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 阶段状态
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// 一条要执行的安装命令
#[derive(Clone, Debug)]
pub struct SetupStep {
    /// 阶段标识 (e.g., "upgrade_pip")
    pub name: String,
    /// 显示名称
    pub display_name: String,
    pub program: String,
    pub args: Vec<String>,
}

impl SetupStep {
    pub fn new(name: &str, display_name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// 命令行的可读形式，用于日志
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 安装阶段执行记录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetupStage {
    pub name: String,
    pub display_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// 持续时间（毫秒）
    pub duration_ms: Option<i64>,
    pub status: StageStatus,
    pub exit_code: Option<i32>,
    pub message: Option<String>,
}

impl SetupStage {
    /// 创建新的待执行阶段
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: StageStatus::Pending,
            exit_code: None,
            message: None,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StageStatus::Running;
    }

    pub fn finish(&mut self, success: bool, exit_code: Option<i32>, message: Option<String>) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            StageStatus::Success
        } else {
            StageStatus::Failed
        };
        self.exit_code = exit_code;
        self.message = message;
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }

    pub fn skip(&mut self, reason: Option<String>) {
        self.status = StageStatus::Skipped;
        self.message = reason;
    }
}

/// 一次 setup 的完整记录
#[derive(Clone, Debug, Serialize)]
pub struct SetupReport {
    pub id: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<SetupStage>,
}

impl SetupReport {
    pub fn new(steps: &[SetupStep]) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            success: false,
            started_at: Utc::now(),
            finished_at: None,
            stages: steps
                .iter()
                .map(|s| SetupStage::new(&s.name, &s.display_name))
                .collect(),
        }
    }

    pub fn complete(&mut self, success: bool) {
        self.success = success;
        self.finished_at = Some(Utc::now());
    }
}
