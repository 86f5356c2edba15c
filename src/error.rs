//! 统一错误处理
//!
//! `ApiError` 实现 `IntoResponse`，所有错误都以 `LaunchResponse` 的形状返回，
//! 前端页面只需要处理一种 JSON 结构

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::domain::launch::LaunchResponse;

/// 统一 API 错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 400 - 请求无效
    BadRequest(String),
    /// 409 - 冲突（如：setup 正在进行、应用已在运行）
    Conflict(String),
    /// 500 - 内部错误
    Internal(String),
    /// 500 - 子进程失败，附带捕获的输出
    CommandFailed {
        message: String,
        error: String,
        output: Option<String>,
    },
}

impl ApiError {
    /// 创建请求无效错误
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// 创建冲突错误
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 创建子进程失败错误
    pub fn command_failed(
        message: impl Into<String>,
        error: impl Into<String>,
        output: Option<String>,
    ) -> Self {
        Self::CommandFailed {
            message: message.into(),
            error: error.into(),
            output,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) | ApiError::CommandFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::BadRequest(msg) | ApiError::Conflict(msg) => LaunchResponse::failure(msg),
            ApiError::Internal(msg) => {
                LaunchResponse::failure("Internal error").with_error(msg)
            }
            ApiError::CommandFailed {
                message,
                error,
                output,
            } => {
                let resp = LaunchResponse::failure(message).with_error(error);
                match output {
                    Some(output) => resp.with_output(output),
                    None => resp,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(m) => write!(f, "Bad request: {}", m),
            ApiError::Conflict(m) => write!(f, "Conflict: {}", m),
            ApiError::Internal(m) => write!(f, "Internal error: {}", m),
            ApiError::CommandFailed { message, error, .. } => write!(f, "{}: {}", message, error),
        }
    }
}

impl std::error::Error for ApiError {}

/// 便捷类型别名
pub type ApiResult<T> = Result<T, ApiError>;
