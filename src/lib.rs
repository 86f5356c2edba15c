//! ViDubb Launcher - 环境安装与 Gradio 应用启动器
//!
//! 提供静态页面和一个小型 HTTP 服务：安装 Python 依赖、启动/停止 Gradio 应用

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;
pub mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use crate::config::EnvConfig;
use crate::state::AppState;

/// 命令行覆盖项
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub port_override: Option<u16>,
    pub host_override: Option<String>,
    pub app_dir_override: Option<PathBuf>,
}

impl RuntimeConfig {
    /// 把命令行覆盖项应用到环境配置上
    pub fn apply(self, mut config: EnvConfig) -> EnvConfig {
        if let Some(port) = self.port_override {
            config.port = port;
        }
        if let Some(host) = self.host_override {
            config.host = host;
        }
        if let Some(app_dir) = self.app_dir_override {
            config.app_dir = app_dir;
        }
        config
    }
}

/// 初始化 tracing，默认 info 级别，可用 RUST_LOG 覆盖
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// 加载配置并运行启动器，直到收到关闭信号
pub async fn init_and_run_launcher_with_config(runtime: RuntimeConfig) -> anyhow::Result<()> {
    init_tracing();

    let config = runtime.apply(EnvConfig::from_env());
    let bind_addr = config.bind_addr();
    let state = Arc::new(AppState::new(config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        version = crate::config::env::constants::VERSION,
        "ViDubb launcher listening"
    );

    let app = api::router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Shutting down");
    state.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
