//! 环境变量配置加载

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use constants::*;

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// 监听地址
    pub host: String,
    /// 服务监听端口
    pub port: u16,
    /// Python 解释器
    pub python: String,
    /// 应用目录（所有子进程的工作目录）
    pub app_dir: PathBuf,
    /// Gradio 应用脚本（相对于 app_dir）
    pub app_script: String,
    /// 依赖清单（相对于 app_dir）
    pub requirements: String,
    /// 可选的静态文件目录
    pub static_dir: PathBuf,
    /// 转发给子进程的 HOME
    pub home: Option<String>,
    /// 转发给应用的 PYTHONPATH
    pub python_path: Option<String>,
    /// 每个安装步骤的超时
    pub setup_timeout: Duration,
    /// 启动宽限期
    pub startup_grace: Duration,
    /// Gradio 健康探测地址
    pub gradio_url: String,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let host = env::var("LAUNCHER_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = parse_var("PORT").unwrap_or(DEFAULT_PORT);

        let python = env::var("LAUNCHER_PYTHON").unwrap_or_else(|_| DEFAULT_PYTHON.to_string());
        let app_dir = env::var("LAUNCHER_APP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        let app_script =
            env::var("LAUNCHER_APP_SCRIPT").unwrap_or_else(|_| DEFAULT_APP_SCRIPT.to_string());
        let requirements = env::var("LAUNCHER_REQUIREMENTS")
            .unwrap_or_else(|_| DEFAULT_REQUIREMENTS.to_string());
        let static_dir = env::var("LAUNCHER_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATIC_DIR));

        let home = non_empty_var("HOME");
        let python_path = non_empty_var("PYTHONPATH");

        let setup_timeout = Duration::from_secs(
            parse_var("LAUNCHER_SETUP_TIMEOUT_SECS").unwrap_or(SETUP_TIMEOUT_SECS),
        );
        let startup_grace = Duration::from_secs(
            parse_var("LAUNCHER_STARTUP_GRACE_SECS").unwrap_or(STARTUP_GRACE_SECS),
        );

        let gradio_url =
            env::var("LAUNCHER_GRADIO_URL").unwrap_or_else(|_| DEFAULT_GRADIO_URL.to_string());

        Self {
            host,
            port,
            python,
            app_dir,
            app_script,
            requirements,
            static_dir,
            home,
            python_path,
            setup_timeout,
            startup_grace,
            gradio_url,
        }
    }

    /// 监听地址 `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 应用的 PYTHONPATH：app_dir 在前，原有值在后
    pub fn app_python_path(&self) -> String {
        join_python_path(&self.app_dir, self.python_path.as_deref())
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            python: DEFAULT_PYTHON.to_string(),
            app_dir: PathBuf::from("."),
            app_script: DEFAULT_APP_SCRIPT.to_string(),
            requirements: DEFAULT_REQUIREMENTS.to_string(),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            home: None,
            python_path: None,
            setup_timeout: Duration::from_secs(SETUP_TIMEOUT_SECS),
            startup_grace: Duration::from_secs(STARTUP_GRACE_SECS),
            gradio_url: DEFAULT_GRADIO_URL.to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.is_empty())
}

/// app_dir 在前，按平台分隔符拼接已有的 PYTHONPATH
fn join_python_path(app_dir: &Path, existing: Option<&str>) -> String {
    let mut paths = vec![app_dir.to_path_buf()];
    if let Some(existing) = existing.filter(|s| !s.is_empty()) {
        paths.extend(env::split_paths(existing));
    }

    match env::join_paths(&paths) {
        Ok(joined) => joined.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, app_dir = %app_dir.display(), "Cannot join PYTHONPATH, using app directory only");
            app_dir.to_string_lossy().into_owned()
        }
    }
}

/// 常量
pub mod constants {
    pub const DEFAULT_HOST: &str = "0.0.0.0";
    pub const DEFAULT_PORT: u16 = 3000;
    pub const DEFAULT_PYTHON: &str = "python3";
    pub const DEFAULT_APP_SCRIPT: &str = "app.py";
    pub const DEFAULT_REQUIREMENTS: &str = "requirements.txt";
    pub const DEFAULT_STATIC_DIR: &str = "public";
    pub const DEFAULT_GRADIO_URL: &str = "http://127.0.0.1:7860";

    /// 单个安装步骤超时（秒）
    pub const SETUP_TIMEOUT_SECS: u64 = 1800; // 30 分钟

    /// 启动宽限期（秒）
    pub const STARTUP_GRACE_SECS: u64 = 5;

    /// 每个来源保留的日志行数
    pub const MAX_LOG_LINES: usize = 5000;

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
