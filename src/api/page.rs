//! 启动页面
//!
//! GET / 返回内嵌的页面；静态目录里有 index.html 时优先使用

use axum::{extract::State, response::Html, routing::get, Router};
use std::sync::Arc;

use crate::state::AppState;

/// 内嵌的启动页面
pub const INDEX_HTML: &str = include_str!("../../static/index.html");

/// 创建页面路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(index))
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let custom = state.config.static_dir.join("index.html");
    match tokio::fs::read_to_string(&custom).await {
        Ok(page) => Html(page),
        Err(_) => Html(INDEX_HTML.to_string()),
    }
}
