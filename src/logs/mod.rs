//! 控制台日志模块
//!
//! 提供日志条目定义以及带回放能力的日志广播器

pub mod broadcaster;
pub mod entry;

// 重新导出主要类型
pub use broadcaster::{LogBroadcaster, Subscription, DEFAULT_LOG_CAPACITY};
pub use entry::{LogEntry, LogLevel};
