//! 启动器领域模型：响应结构、日志行、日志来源

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 所有端点共用的 JSON 响应
///
/// `{success, message, output?, error?}`，启动确认时额外带 `pid`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LaunchResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl LaunchResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            output: None,
            error: None,
            pid: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(message)
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }
}

/// 日志来源
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    /// 环境安装（pip）
    Setup,
    /// Gradio 应用进程
    #[default]
    App,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::Setup => "setup",
            LogSource::App => "app",
        }
    }

    pub const ALL: [LogSource; 2] = [LogSource::Setup, LogSource::App];
}

/// 日志行
#[derive(Clone, Debug, Serialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub source: LogSource,
    pub stream: String, // stdout | stderr
    pub content: String,
}

impl LogLine {
    /// 创建新日志行
    pub fn new(source: LogSource, stream: &str, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            source,
            stream: stream.to_string(),
            content: content.into(),
        }
    }

    pub fn is_stderr(&self) -> bool {
        self.stream == "stderr"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_omits_empty_fields() {
        let json = serde_json::to_value(LaunchResponse::success("ok")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "message": "ok" }));
    }

    #[test]
    fn test_failure_with_error_and_output() {
        let resp = LaunchResponse::failure("Setup failed")
            .with_error("boom")
            .with_output("partial");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        assert_eq!(json["output"], "partial");
        assert!(json.get("pid").is_none());
    }

    #[test]
    fn test_log_source_serde() {
        let source: LogSource = serde_json::from_str("\"setup\"").unwrap();
        assert_eq!(source, LogSource::Setup);
        assert_eq!(LogSource::default(), LogSource::App);
    }

    #[test]
    fn test_log_line_creation() {
        let line = LogLine::new(LogSource::App, "stderr", "Traceback");
        assert!(line.is_stderr());
        assert_eq!(line.source.as_str(), "app");
    }
}
