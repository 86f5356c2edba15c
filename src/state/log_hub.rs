//! 日志中心
//!
//! 每个来源（setup / app）一个有界环形缓冲区 + 广播通道，
//! 支持查询最近输出和 SSE 订阅

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::config::env::constants::MAX_LOG_LINES;
use crate::domain::{LogLine, LogSource};

/// 日志通道容量
const LOG_CHANNEL_CAPACITY: usize = 256;

/// 单个来源的日志写入端
///
/// 可克隆，交给子进程的输出读取任务使用
#[derive(Clone)]
pub struct LogSink {
    source: LogSource,
    sender: broadcast::Sender<LogLine>,
    buffer: Arc<RwLock<VecDeque<LogLine>>>,
    capacity: usize,
}

impl LogSink {
    fn new(source: LogSource, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        Self {
            source,
            sender,
            buffer: Arc::new(RwLock::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    /// 写入一行日志
    pub async fn push(&self, stream: &str, content: &str) {
        let line = LogLine::new(self.source, stream, content);

        {
            let mut buffer = self.buffer.write().await;
            buffer.push_back(line.clone());
            while buffer.len() > self.capacity {
                buffer.pop_front();
            }
        }

        // 没有订阅者时 send 返回错误，忽略
        let _ = self.sender.send(line);
    }

    pub async fn stdout(&self, content: &str) {
        self.push("stdout", content).await;
    }

    pub async fn stderr(&self, content: &str) {
        self.push("stderr", content).await;
    }

    /// 最近 `n` 行
    pub async fn tail(&self, n: usize) -> Vec<LogLine> {
        let buffer = self.buffer.read().await;
        let start = buffer.len().saturating_sub(n);
        buffer.iter().skip(start).cloned().collect()
    }

    /// 某个时间点之后的所有行
    pub async fn since(&self, since: DateTime<Utc>) -> Vec<LogLine> {
        let buffer = self.buffer.read().await;
        buffer
            .iter()
            .filter(|line| line.timestamp >= since)
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogLine> {
        self.sender.subscribe()
    }
}

/// 日志中心
pub struct LogHub {
    sinks: HashMap<LogSource, LogSink>,
}

impl LogHub {
    /// 创建新的日志中心
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_LINES)
    }

    /// 使用自定义缓冲区大小创建
    pub fn with_capacity(capacity: usize) -> Self {
        let sinks = LogSource::ALL
            .iter()
            .map(|source| (*source, LogSink::new(*source, capacity)))
            .collect();
        Self { sinks }
    }

    /// 获取来源的写入端
    pub fn sink(&self, source: LogSource) -> LogSink {
        self.sinks[&source].clone()
    }

    /// 订阅来源的日志
    pub fn subscribe(&self, source: LogSource) -> broadcast::Receiver<LogLine> {
        self.sinks[&source].subscribe()
    }

    /// 最近 `n` 行，`n` 限制在 1..=MAX_LOG_LINES
    pub async fn tail(&self, source: LogSource, n: usize) -> Vec<LogLine> {
        self.sinks[&source].tail(n.clamp(1, MAX_LOG_LINES)).await
    }
}

impl Default for LogHub {
    fn default() -> Self {
        Self::new()
    }
}
