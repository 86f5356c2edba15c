//! API 模块
//!
//! HTTP handlers 和路由组装

pub mod gradio;
pub mod health;
pub mod logs;
pub mod page;
pub mod setup;

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::state::AppState;

/// 构建完整的 API 路由
pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        // Page
        .merge(page::router())
        // Health & Status
        .merge(health::router())
        // Setup
        .merge(setup::router())
        // Gradio app
        .merge(gradio::router())
        // Logs
        .merge(logs::router())
        // 其他路径回落到静态目录
        .fallback_service(static_files)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
