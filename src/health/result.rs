//! 探测结果数据结构

use crate::error::ProbeError;
use std::time::Duration;

/// 单次探测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 收到了HTTP响应
    Status(u16),
    /// 传输层失败（连接拒绝、DNS、TLS、超时等）
    Failed(String),
}

impl ProbeOutcome {
    /// 是否为 HTTP 200
    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeOutcome::Status(200))
    }
}

impl From<Result<u16, ProbeError>> for ProbeOutcome {
    fn from(result: Result<u16, ProbeError>) -> Self {
        match result {
            Ok(code) => ProbeOutcome::Status(code),
            Err(e) => ProbeOutcome::Failed(describe_probe_error(&e)),
        }
    }
}

/// 带耗时的探测报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// 目标地址
    pub url: String,
    /// 探测结果
    pub outcome: ProbeOutcome,
    /// 耗时
    pub elapsed: Duration,
}

/// 格式化探测错误，使其更加清晰易读
pub fn describe_probe_error(error: &ProbeError) -> String {
    match error {
        ProbeError::Timeout => "Request timeout".to_string(),
        ProbeError::InvalidUrl { url } => format!("Invalid URL: {url}"),
        ProbeError::ClientError(e) => describe_request_error(e),
    }
}

fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        "Connection refused".to_string()
    } else if error.is_builder() {
        "Invalid request".to_string()
    } else {
        let error_str = error.to_string();
        if error_str.contains("dns") || error_str.contains("DNS") {
            "DNS resolution failed".to_string()
        } else if error_str.contains("certificate")
            || error_str.contains("tls")
            || error_str.contains("ssl")
        {
            "SSL/TLS certificate error".to_string()
        } else {
            format!("Request failed: {error_str}")
        }
    }
}
