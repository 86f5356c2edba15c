//! 日志 API
//!
//! 包含 /logs, /logs/stream 端点

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::{LogLine, LogSource};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// 日志查询参数
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// 日志来源，默认 app
    #[serde(default)]
    pub source: LogSource,
    /// 返回行数，默认 200
    #[serde(default = "default_tail")]
    pub tail: usize,
}

fn default_tail() -> usize {
    200
}

/// 日志流参数
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub source: LogSource,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub source: LogSource,
    pub lines: Vec<LogLine>,
}

/// 创建日志路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/logs", get(tail_logs))
        .route("/logs/stream", get(stream_logs))
}

/// 最近日志
///
/// GET /logs?source=app&tail=200
async fn tail_logs(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> ApiResult<Json<LogsResponse>> {
    let Query(query) = query.map_err(invalid_query)?;
    let lines = state.log_hub.tail(query.source, query.tail).await;
    Ok(Json(LogsResponse {
        source: query.source,
        lines,
    }))
}

/// 流式日志
///
/// GET /logs/stream?source=app
async fn stream_logs(
    State(state): State<Arc<AppState>>,
    query: Result<Query<StreamQuery>, QueryRejection>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let Query(query) = query.map_err(invalid_query)?;
    let mut rx = state.log_hub.subscribe(query.source);
    let shutdown = state.shutdown.clone();
    let source = query.source;

    let stream = async_stream::stream! {
        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = rx.recv() => received,
            };

            match received {
                Ok(log_line) => {
                    let json = serde_json::to_string(&log_line).unwrap_or_default();
                    yield Ok(Event::default().data(json));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(source = source.as_str(), lagged = n, "Log subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    ))
}

fn invalid_query(rejection: QueryRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}
