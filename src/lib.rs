//! Keep Alive - 托管平台保活服务
//!
//! 运行在会自动休眠的托管平台上，通过周期性自检保持进程活跃：
//! - 从反向代理转发头中学习对外地址
//! - 本地回环检测、外部自检与域名验证
//! - 带回放的实时日志控制台（SSE）
//! - 机器人健康状态上报

pub mod cli;
pub mod config;
pub mod core;
pub mod endpoint;
pub mod error;
pub mod health;
pub mod logging;
pub mod logs;
pub mod signal;
pub mod status;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use core::AppContext;
pub use error::KeepAliveError;
pub use logs::{LogBroadcaster, LogEntry, LogLevel};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
