//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口。托管平台通过环境变量传入端口与对外地址。

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Keep Alive - 托管平台保活服务
#[derive(Parser, Debug, Clone)]
#[command(
    name = "keep-alive",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（可选）",
        env = "KEEP_ALIVE_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 监听端口
    #[arg(short, long, value_name = "PORT", help = "监听端口", env = "PORT")]
    pub port: Option<u16>,

    /// 绑定地址
    #[arg(long, value_name = "ADDR", help = "绑定地址")]
    pub bind: Option<String>,

    /// 日志级别
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "KEEP_ALIVE_LOG_LEVEL"
    )]
    pub log_level: Option<LogLevel>,

    /// 以JSON格式输出进程日志
    #[arg(long, help = "以JSON格式输出日志")]
    pub json_logs: bool,

    /// Render 平台注入的对外地址
    #[arg(long, value_name = "URL", env = "RENDER_EXTERNAL_URL", hide = true)]
    pub render_external_url: Option<String>,

    /// Koyeb 平台注入的对外地址
    #[arg(long, value_name = "URL", env = "KOYEB_PUBLIC_URL", hide = true)]
    pub koyeb_public_url: Option<String>,
}

impl Args {
    /// 平台提供的初始对外地址
    ///
    /// 两者都存在时 Koyeb 优先，空字符串视为未设置。
    pub fn initial_endpoint(&self) -> Option<String> {
        [&self.koyeb_public_url, &self.render_external_url]
            .into_iter()
            .flatten()
            .map(|url| url.trim().trim_end_matches('/'))
            .find(|url| !url.is_empty())
            .map(str::to_string)
    }
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// 追踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}
