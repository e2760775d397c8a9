//! 运行状态管理模块
//!
//! 保存当前对外地址与机器人健康标志，供页面、健康端点和调度器读取

use crate::logs::LogBroadcaster;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// 只读状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    /// 当前检测到的对外地址
    pub endpoint: Option<String>,
    /// 机器人健康标志
    pub healthy: bool,
    /// 进程运行时间
    pub uptime: Duration,
}

/// 共享运行状态
#[derive(Debug)]
pub struct HealthState {
    /// 对外地址
    endpoint: RwLock<Option<String>>,
    /// 健康标志，默认 false（初始化中）
    healthy: AtomicBool,
    /// 启动时间
    started_at: Instant,
}

impl HealthState {
    /// 创建新的运行状态
    ///
    /// # 参数
    /// * `initial_endpoint` - 来自环境变量或配置的初始地址
    pub fn new(initial_endpoint: Option<String>) -> Self {
        Self {
            endpoint: RwLock::new(initial_endpoint.filter(|e| !e.is_empty())),
            healthy: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    /// 当前对外地址
    pub fn endpoint(&self) -> Option<String> {
        self.endpoint
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 替换对外地址
    ///
    /// 比较与赋值在同一临界区内完成。
    ///
    /// # 返回
    /// * `bool` - 地址是否发生变化
    pub fn replace_endpoint(&self, candidate: &str) -> bool {
        let mut endpoint = self.endpoint.write().unwrap_or_else(|e| e.into_inner());
        if endpoint.as_deref() == Some(candidate) {
            return false;
        }
        *endpoint = Some(candidate.to_string());
        true
    }

    /// 设置健康标志并记录状态变化
    pub fn set_health(&self, healthy: bool, logs: &LogBroadcaster) {
        self.healthy.store(healthy, Ordering::SeqCst);
        logs.info(format!("Bot Status: {}", Self::describe(healthy)));
    }

    /// 当前健康标志
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// 进程运行时间
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// 获取状态快照
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            endpoint: self.endpoint(),
            healthy: self.is_healthy(),
            uptime: self.uptime(),
        }
    }

    /// 状态描述文本
    pub fn describe(healthy: bool) -> &'static str {
        if healthy {
            "Connected"
        } else {
            "Disconnected"
        }
    }
}

/// 解析外部状态上报
///
/// 失败开放：只有 `healthy` 字段为字面量 `false` 时才视为不健康，
/// 缺失字段、缺失请求体或其他任意值都视为健康。
pub fn healthy_from_report(body: Option<&serde_json::Value>) -> bool {
    !matches!(
        body.and_then(|b| b.get("healthy")),
        Some(serde_json::Value::Bool(false))
    )
}

/// 将运行时间格式化为 `Hh Mm Ss`
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
