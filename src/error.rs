//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Keep Alive 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum KeepAliveError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 探测相关错误
    #[error("探测错误: {0}")]
    Probe(#[from] ProbeError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 探测错误类型
#[derive(Error, Debug)]
pub enum ProbeError {
    /// HTTP客户端错误
    #[error("HTTP客户端错误: {0}")]
    ClientError(#[from] reqwest::Error),

    /// 超时错误
    #[error("请求超时")]
    Timeout,

    /// 无效的目标地址
    #[error("无效的探测地址: {url}")]
    InvalidUrl { url: String },
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, KeepAliveError>;
