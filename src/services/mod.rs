//! 服务层模块
//!
//! 包含核心业务逻辑

pub mod gradio;
pub mod setup;

pub use gradio::{AppStatus, GradioSupervisor, LaunchError, LaunchOutcome};
pub use setup::{SetupError, SetupOutcome};
