//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑。所有字段都有默认值，
//! 没有配置文件时也能直接运行。

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP 服务配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 自检调度配置
    #[serde(default)]
    pub pinger: PingerConfig,
    /// 控制台日志配置
    #[serde(default)]
    pub console: ConsoleConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 绑定地址
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// 初始对外地址（在观察到真实流量前使用）
    #[serde(default)]
    pub initial_endpoint: Option<String>,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// 自检调度配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PingerConfig {
    /// 本地回环检测间隔（秒）
    #[serde(default = "default_local_interval")]
    pub local_interval_seconds: u64,
    /// 外部自检间隔（秒）
    #[serde(default = "default_external_interval")]
    pub external_interval_seconds: u64,
    /// 域名验证间隔（秒）
    #[serde(default = "default_domain_check_interval")]
    pub domain_check_interval_seconds: u64,
    /// 普通探测请求超时（毫秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// 域名验证请求超时（毫秒）
    #[serde(default = "default_domain_check_timeout")]
    pub domain_check_timeout_ms: u64,
    /// 健康检查路径
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

/// 控制台日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsoleConfig {
    /// 回放缓冲区容量
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// `/logs/recent` 返回的条目数
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

// 默认值函数
fn default_port() -> u16 {
    8000
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_local_interval() -> u64 {
    120
}
fn default_external_interval() -> u64 {
    240
}
fn default_domain_check_interval() -> u64 {
    600
}
fn default_request_timeout() -> u64 {
    10_000
}
fn default_domain_check_timeout() -> u64 {
    3_000
}
fn default_health_path() -> String {
    "/health".to_string()
}
fn default_buffer_capacity() -> usize {
    200
}
fn default_recent_limit() -> usize {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            initial_endpoint: None,
            log_level: default_log_level(),
        }
    }
}

impl Default for PingerConfig {
    fn default() -> Self {
        Self {
            local_interval_seconds: default_local_interval(),
            external_interval_seconds: default_external_interval(),
            domain_check_interval_seconds: default_domain_check_interval(),
            request_timeout_ms: default_request_timeout(),
            domain_check_timeout_ms: default_domain_check_timeout(),
            health_path: default_health_path(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            recent_limit: default_recent_limit(),
        }
    }
}

impl ServerConfig {
    /// 解析监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| format!("无效的监听地址 {}:{}: {}", self.bind_address, self.port, e))
    }

    /// 本地回环健康检查地址
    pub fn loopback_url(&self, health_path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, health_path)
    }
}

/// 调度器使用的时间参数
#[derive(Debug, Clone, PartialEq)]
pub struct PingSchedule {
    /// 本地回环检测间隔
    pub local_interval: Duration,
    /// 外部自检间隔
    pub external_interval: Duration,
    /// 域名验证间隔
    pub domain_check_interval: Duration,
    /// 普通探测超时
    pub request_timeout: Duration,
    /// 域名验证超时
    pub domain_check_timeout: Duration,
    /// 本地回环健康检查地址
    pub local_url: String,
    /// 健康检查路径
    pub health_path: String,
}

impl PingSchedule {
    /// 从配置构建调度参数
    pub fn from_config(config: &Config) -> Self {
        let pinger = &config.pinger;
        Self {
            local_interval: Duration::from_secs(pinger.local_interval_seconds),
            external_interval: Duration::from_secs(pinger.external_interval_seconds),
            domain_check_interval: Duration::from_secs(pinger.domain_check_interval_seconds),
            request_timeout: Duration::from_millis(pinger.request_timeout_ms),
            domain_check_timeout: Duration::from_millis(pinger.domain_check_timeout_ms),
            local_url: config.server.loopback_url(&pinger.health_path),
            health_path: pinger.health_path.clone(),
        }
    }
}

/// 是否为 http(s) 地址
pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    // 验证服务配置
    if config.server.port == 0 {
        return Err("监听端口不能为0".to_string());
    }

    if config.server.bind_address.trim().is_empty() {
        return Err("绑定地址不能为空".to_string());
    }

    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.server.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.server.log_level, valid_log_levels
        ));
    }

    if let Some(ref endpoint) = config.server.initial_endpoint {
        if !is_http_url(endpoint) {
            return Err(format!("初始地址 {endpoint} 的URL格式无效"));
        }
    }

    // 验证调度配置
    let pinger = &config.pinger;
    if pinger.local_interval_seconds == 0 {
        return Err("本地检测间隔不能为0".to_string());
    }
    if pinger.external_interval_seconds == 0 {
        return Err("外部检测间隔不能为0".to_string());
    }
    if pinger.domain_check_interval_seconds == 0 {
        return Err("域名验证间隔不能为0".to_string());
    }
    if pinger.request_timeout_ms == 0 || pinger.domain_check_timeout_ms == 0 {
        return Err("请求超时时间不能为0".to_string());
    }
    if !pinger.health_path.starts_with('/') {
        return Err(format!(
            "健康检查路径必须以 / 开头: {}",
            pinger.health_path
        ));
    }

    // 验证控制台配置
    if config.console.buffer_capacity == 0 {
        return Err("日志缓冲区容量不能为0".to_string());
    }
    if config.console.recent_limit == 0 {
        return Err("最近日志条目数不能为0".to_string());
    }

    Ok(())
}
