//! 应用状态

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::EnvConfig;
use crate::domain::{LogSource, SetupReport};
use crate::services::gradio::GradioSupervisor;

use super::log_hub::LogHub;

/// 应用状态
pub struct AppState {
    /// 环境配置
    pub config: EnvConfig,
    /// 服务启动时间
    pub started_at: DateTime<Utc>,

    /// setup 互斥锁，同一时间只允许一次安装
    pub setup_lock: Mutex<()>,
    /// 最近一次（或正在进行的）setup 记录
    pub last_setup: Arc<RwLock<Option<SetupReport>>>,

    /// 日志中心
    pub log_hub: LogHub,
    /// Gradio 应用进程管理
    pub gradio: GradioSupervisor,

    /// 关闭令牌，用于停止 SSE 等长连接
    pub shutdown: CancellationToken,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(config: EnvConfig) -> Self {
        tracing::info!(
            bind = %config.bind_addr(),
            python = %config.python,
            app_dir = %config.app_dir.display(),
            app_script = %config.app_script,
            requirements = %config.requirements,
            startup_grace = ?config.startup_grace,
            "Loaded configuration"
        );

        let log_hub = LogHub::new();
        let gradio = GradioSupervisor::from_config(&config, log_hub.sink(LogSource::App));

        Self {
            started_at: Utc::now(),
            setup_lock: Mutex::new(()),
            last_setup: Arc::new(RwLock::new(None)),
            log_hub,
            gradio,
            shutdown: CancellationToken::new(),
            config,
        }
    }

    /// 是否有 setup 正在进行
    pub fn setup_in_progress(&self) -> bool {
        self.setup_lock.try_lock().is_err()
    }

    /// 最近一次 setup 记录
    pub async fn last_setup(&self) -> Option<SetupReport> {
        self.last_setup.read().await.clone()
    }

    /// 关闭：停止应用进程并通知长连接
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if self.gradio.stop().await {
            tracing::info!("Stopped Gradio app on shutdown");
        }
    }
}
