//! 健康检查和状态 API
//!
//! 包含 /health, /status 端点

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::config::env::constants::VERSION;
use crate::domain::SetupReport;
use crate::services::AppStatus;
use crate::state::AppState;

/// 健康检查响应
#[derive(Debug, Serialize)]
struct HealthResponse {
    success: bool,
    message: &'static str,
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// 状态响应
#[derive(Debug, Serialize)]
struct StatusResponse {
    version: &'static str,
    started_at: String,
    uptime_secs: i64,
    setup_in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_setup: Option<SetupReport>,
    app: AppStatus,
}

/// 创建健康检查路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
}

/// 健康检查，不检查任何依赖
///
/// GET /health
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        success: true,
        message: "ok",
        status: "ok",
        service: "vidubb-launcher",
        version: VERSION,
    })
}

/// 启动器状态：setup 进度和应用进程
///
/// GET /status
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    Json(StatusResponse {
        version: VERSION,
        started_at: state.started_at.to_rfc3339(),
        uptime_secs: (now - state.started_at).num_seconds(),
        setup_in_progress: state.setup_in_progress(),
        last_setup: state.last_setup().await,
        app: state.gradio.status().await,
    })
}
