//! 运行时状态模块
//!
//! 管理应用状态和日志通道

pub mod app_state;
pub mod log_hub;

pub use app_state::AppState;
pub use log_hub::{LogHub, LogSink};
