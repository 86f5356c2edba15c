//! 领域模型模块
//!
//! 纯数据结构，不依赖 axum/tokio

pub mod launch;
pub mod setup;

pub use launch::{LaunchResponse, LogLine, LogSource};
pub use setup::{SetupReport, SetupStage, SetupStep, StageStatus};
