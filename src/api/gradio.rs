//! Gradio 应用 API
//!
//! 包含 /start-gradio, /stop-gradio 端点

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use std::sync::Arc;

use crate::domain::LaunchResponse;
use crate::error::{ApiError, ApiResult};
use crate::services::{LaunchError, LaunchOutcome};
use crate::state::AppState;

/// 创建应用管理路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/start-gradio", post(start_gradio))
        .route("/stop-gradio", post(stop_gradio))
}

/// 启动 Gradio 应用
///
/// POST /start-gradio
///
/// - 宽限期内退出：200 / 500，带输出
/// - 宽限期后仍在运行：202，带 pid
/// - 宽限期内被 /stop-gradio 停止：409
async fn start_gradio(
    State(state): State<Arc<AppState>>,
) -> ApiResult<(StatusCode, Json<LaunchResponse>)> {
    let task_state = state.clone();
    let outcome = tokio::spawn(async move { task_state.gradio.launch().await })
        .await
        .map_err(|e| ApiError::internal(format!("Launch task failed: {}", e)))?
        .map_err(|e| match e {
            LaunchError::AlreadyRunning => ApiError::conflict(e.to_string()),
            LaunchError::Command(e) => {
                ApiError::command_failed("Failed to start application", e.to_string(), None)
            }
        })?;

    launch_response(outcome)
}

fn launch_response(outcome: LaunchOutcome) -> ApiResult<(StatusCode, Json<LaunchResponse>)> {
    match outcome {
        LaunchOutcome::Started { pid, output } => {
            let mut resp = LaunchResponse::success("Application startup initiated").with_pid(pid);
            if !output.is_empty() {
                resp = resp.with_output(output);
            }
            Ok((StatusCode::ACCEPTED, Json(resp)))
        }
        LaunchOutcome::Stopped { .. } => Err(ApiError::conflict(
            "Application was stopped during startup",
        )),
        LaunchOutcome::Exited {
            success: true,
            stdout,
            ..
        } => Ok((
            StatusCode::OK,
            Json(LaunchResponse::success("Application exited").with_output(stdout)),
        )),
        LaunchOutcome::Exited {
            exit_code,
            stdout,
            stderr,
            ..
        } => {
            let message = match exit_code {
                Some(code) => format!("Application exited with code {}", code),
                None => "Application terminated by signal".to_string(),
            };
            let error = if stderr.trim().is_empty() {
                message.clone()
            } else {
                stderr
            };
            Err(ApiError::command_failed(
                message,
                error,
                Some(stdout).filter(|o| !o.is_empty()),
            ))
        }
    }
}

/// 停止 Gradio 应用
///
/// POST /stop-gradio
async fn stop_gradio(State(state): State<Arc<AppState>>) -> Json<LaunchResponse> {
    if state.gradio.stop().await {
        Json(LaunchResponse::success("Application stopped"))
    } else {
        Json(LaunchResponse::success("Application is not running"))
    }
}
