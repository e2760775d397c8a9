//! HTTP探测器实现
//!
//! 提供自检请求功能。协议（HTTP/HTTPS）由目标地址前缀决定，
//! 失败不重试，超时按传输失败处理。

use crate::config::is_http_url;
use crate::error::{ProbeError, Result};
use crate::health::result::{ProbeOutcome, ProbeReport};
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// 探测器trait，定义探测接口
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// 执行一次探测
    ///
    /// # 参数
    /// * `method` - HTTP方法（GET 或 HEAD）
    /// * `url` - 目标地址
    /// * `timeout_duration` - 超时时间
    ///
    /// # 返回
    /// * `ProbeReport` - 探测报告，失败也以报告形式返回
    async fn probe(&self, method: Method, url: &str, timeout_duration: Duration) -> ProbeReport;

    /// GET 探测
    async fn get(&self, url: &str, timeout_duration: Duration) -> ProbeReport {
        self.probe(Method::GET, url, timeout_duration).await
    }

    /// HEAD 探测
    async fn head(&self, url: &str, timeout_duration: Duration) -> ProbeReport {
        self.probe(Method::HEAD, url, timeout_duration).await
    }
}

/// HTTP探测器实现
#[derive(Debug, Clone)]
pub struct HttpProbe {
    /// HTTP客户端
    client: Client,
}

impl HttpProbe {
    /// 创建新的HTTP探测器
    ///
    /// # 参数
    /// * `default_timeout` - 客户端级别的兜底超时
    pub fn new(default_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(default_timeout)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .map_err(ProbeError::ClientError)?;

        Ok(Self { client })
    }

    /// 执行单次请求并返回状态码
    async fn send(
        &self,
        method: Method,
        url: &str,
        timeout_duration: Duration,
    ) -> std::result::Result<u16, ProbeError> {
        if !is_http_url(url) {
            return Err(ProbeError::InvalidUrl {
                url: url.to_string(),
            });
        }

        let request = self.client.request(method, url).timeout(timeout_duration);

        match timeout(timeout_duration, request.send()).await {
            Ok(Ok(response)) => Ok(response.status().as_u16()),
            Ok(Err(e)) if e.is_timeout() => Err(ProbeError::Timeout),
            Ok(Err(e)) => Err(ProbeError::ClientError(e)),
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, method: Method, url: &str, timeout_duration: Duration) -> ProbeReport {
        let start_time = Instant::now();
        let outcome = ProbeOutcome::from(self.send(method, url, timeout_duration).await);

        ProbeReport {
            url: url.to_string(),
            outcome,
            elapsed: start_time.elapsed(),
        }
    }
}
