//! 对外地址学习模块
//!
//! 平台在反向代理之后运行，对外地址只能从转发头中得知。
//! 每个请求都会经过学习器，地址变化时重建外部自检任务。

use crate::health::PingScheduler;
use crate::logs::LogBroadcaster;
use crate::status::HealthState;
use axum::http::HeaderMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// 与地址推断相关的请求头
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForwardedHeaders {
    /// x-forwarded-proto
    #[serde(rename = "x-forwarded-proto", skip_serializing_if = "Option::is_none")]
    pub proto: Option<String>,
    /// x-forwarded-host
    #[serde(rename = "x-forwarded-host", skip_serializing_if = "Option::is_none")]
    pub forwarded_host: Option<String>,
    /// host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl ForwardedHeaders {
    /// 从请求头中提取
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            proto: header_text(headers, "x-forwarded-proto"),
            forwarded_host: header_text(headers, "x-forwarded-host"),
            host: header_text(headers, "host"),
        }
    }

    /// 推断对外地址
    ///
    /// 主机优先取 x-forwarded-host，缺失时回退到 Host。
    /// 协议或主机缺失时返回 None。
    pub fn candidate(&self) -> Option<String> {
        let proto = first_value(self.proto.as_deref())?;
        let host = first_value(self.forwarded_host.as_deref())
            .or_else(|| first_value(self.host.as_deref()))?;

        Some(format!("{proto}://{host}"))
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// 逗号分隔的多值头只取第一个
fn first_value(value: Option<&str>) -> Option<&str> {
    value
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// 对外地址学习器
#[derive(Clone)]
pub struct EndpointLearner {
    health: Arc<HealthState>,
    logs: Arc<LogBroadcaster>,
    scheduler: Arc<PingScheduler>,
}

impl EndpointLearner {
    /// 创建新的学习器
    pub fn new(
        health: Arc<HealthState>,
        logs: Arc<LogBroadcaster>,
        scheduler: Arc<PingScheduler>,
    ) -> Self {
        Self {
            health,
            logs,
            scheduler,
        }
    }

    /// 观察一次请求
    ///
    /// # 返回
    /// * `bool` - 是否学到了新地址
    pub fn observe(&self, headers: &ForwardedHeaders) -> bool {
        let Some(candidate) = headers.candidate() else {
            return false;
        };

        if !self.health.replace_endpoint(&candidate) {
            return false;
        }

        debug!("对外地址变化: {}", candidate);
        self.logs.info(format!("Learned domain: {candidate}"));
        self.scheduler.restart_external_task();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, PingSchedule};
    use crate::health::{ExternalTaskState, HttpProbe};
    use crate::logs::LogLevel;
    use axum::http::HeaderValue;
    use std::time::Duration;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn learner() -> (EndpointLearner, Arc<HealthState>, Arc<LogBroadcaster>, Arc<PingScheduler>) {
        let health = Arc::new(HealthState::new(None));
        let logs = Arc::new(LogBroadcaster::default());
        let scheduler = Arc::new(PingScheduler::new(
            PingSchedule::from_config(&Config::default()),
            Arc::clone(&health),
            Arc::clone(&logs),
            Arc::new(HttpProbe::new(Duration::from_secs(1)).unwrap()),
        ));
        let learner = EndpointLearner::new(
            Arc::clone(&health),
            Arc::clone(&logs),
            Arc::clone(&scheduler),
        );
        (learner, health, logs, scheduler)
    }

    #[test]
    fn test_candidate_prefers_forwarded_host() {
        let h = ForwardedHeaders::from_headers(&headers(&[
            ("x-forwarded-proto", "https"),
            ("x-forwarded-host", "svc.example"),
            ("host", "10.0.0.5:8000"),
        ]));
        assert_eq!(h.candidate().as_deref(), Some("https://svc.example"));
    }

    #[test]
    fn test_candidate_falls_back_to_host() {
        let h = ForwardedHeaders::from_headers(&headers(&[
            ("x-forwarded-proto", "https"),
            ("host", "svc.example"),
        ]));
        assert_eq!(h.candidate().as_deref(), Some("https://svc.example"));
    }

    #[test]
    fn test_candidate_requires_proto() {
        let h = ForwardedHeaders::from_headers(&headers(&[("host", "localhost:8000")]));
        assert!(h.candidate().is_none());

        let h = ForwardedHeaders::from_headers(&headers(&[
            ("x-forwarded-proto", ""),
            ("x-forwarded-host", "svc.example"),
        ]));
        assert!(h.candidate().is_none());
    }

    #[test]
    fn test_candidate_multi_valued() {
        let h = ForwardedHeaders::from_headers(&headers(&[
            ("x-forwarded-proto", "https,http"),
            ("x-forwarded-host", "svc.example, internal.local"),
        ]));
        assert_eq!(h.candidate().as_deref(), Some("https://svc.example"));
    }

    #[tokio::test]
    async fn test_observe_learns_and_schedules() {
        let (learner, health, logs, scheduler) = learner();
        assert_eq!(scheduler.external_state(), ExternalTaskState::Stopped);

        let h = ForwardedHeaders::from_headers(&headers(&[
            ("x-forwarded-proto", "https"),
            ("x-forwarded-host", "example.com"),
        ]));
        assert!(learner.observe(&h));

        assert_eq!(health.endpoint().as_deref(), Some("https://example.com"));
        assert_eq!(scheduler.external_state(), ExternalTaskState::Scheduled);
        assert_eq!(
            scheduler.external_target().as_deref(),
            Some("https://example.com/health")
        );

        let infos: Vec<_> = logs
            .recent_snapshot(100)
            .into_iter()
            .filter(|e| e.level == LogLevel::Info && e.msg.contains("example.com"))
            .collect();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].msg, "Learned domain: https://example.com");

        scheduler.stop();
    }

    #[tokio::test]
    async fn test_observe_same_value_is_noop() {
        let (learner, _, logs, scheduler) = learner();
        let h = ForwardedHeaders::from_headers(&headers(&[
            ("x-forwarded-proto", "https"),
            ("x-forwarded-host", "example.com"),
        ]));

        assert!(learner.observe(&h));
        let recorded = logs.len();
        assert!(!learner.observe(&h));

        assert_eq!(logs.len(), recorded);
        assert_eq!(scheduler.external_state(), ExternalTaskState::Scheduled);

        scheduler.stop();
    }

    #[tokio::test]
    async fn test_observe_without_headers() {
        let (learner, health, logs, scheduler) = learner();

        assert!(!learner.observe(&ForwardedHeaders::default()));

        assert!(health.endpoint().is_none());
        assert!(logs.is_empty());
        assert_eq!(scheduler.external_state(), ExternalTaskState::Stopped);
    }
}
