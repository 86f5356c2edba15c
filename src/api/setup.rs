//! 环境安装 API
//!
//! POST /setup

use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;

use crate::domain::LaunchResponse;
use crate::error::{ApiError, ApiResult};
use crate::services::setup::{self, SetupError};
use crate::state::AppState;

/// 创建安装路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/setup", post(run_setup))
}

/// 升级 pip 并安装依赖清单
///
/// POST /setup
///
/// 安装在独立任务中运行，客户端断开不会中断 pip
async fn run_setup(State(state): State<Arc<AppState>>) -> ApiResult<Json<LaunchResponse>> {
    let task_state = state.clone();
    let outcome = tokio::spawn(async move { setup::execute(&task_state).await })
        .await
        .map_err(|e| ApiError::internal(format!("Setup task failed: {}", e)))?
        .map_err(|e| match e {
            SetupError::AlreadyRunning => ApiError::conflict(e.to_string()),
        })?;

    match outcome.failure {
        None => Ok(Json(
            LaunchResponse::success("Environment setup completed").with_output(outcome.output),
        )),
        Some(failure) => Err(ApiError::command_failed(
            format!("Environment setup failed at step: {}", failure.step),
            failure.error,
            Some(outcome.output).filter(|o| !o.is_empty()),
        )),
    }
}
