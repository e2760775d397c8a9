//! 自检调度器模块
//!
//! 管理三个相互独立的周期任务：
//! - 本地回环检测：保持进程内运行时活跃
//! - 外部自检：通过对外地址访问自身，地址变化时整体销毁并重建
//! - 域名验证：HEAD 请求，仅做观察记录
//!
//! 所有任务均为"发出即忘"策略：失败只记录，不立即重试，也不会终止进程。

use crate::config::PingSchedule;
use crate::health::probe::HealthProbe;
use crate::health::result::ProbeOutcome;
use crate::logs::LogBroadcaster;
use crate::status::HealthState;
use chrono::{SecondsFormat, Utc};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// 外部自检任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalTaskState {
    /// 尚未获知对外地址
    Stopped,
    /// 首次获知地址，定时器运行中
    Scheduled,
    /// 旧定时器已取消，新定时器运行中
    Rescheduled,
}

/// 定时任务句柄，drop 时取消任务
#[derive(Debug)]
pub struct TimerHandle {
    /// 任务代号
    generation: u64,
    /// 任务句柄
    task: JoinHandle<()>,
}

impl TimerHandle {
    fn new(generation: u64, task: JoinHandle<()>) -> Self {
        Self { generation, task }
    }

    /// 任务代号
    pub fn generation(&self) -> u64 {
        self.generation
    }

}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 外部自检任务槽位
#[derive(Debug)]
struct ExternalSlot {
    /// 当前定时器
    timer: Option<TimerHandle>,
    /// 当前探测地址
    target: Option<String>,
    /// 状态
    state: ExternalTaskState,
}

/// 存活计数守卫，随任务 future 一起销毁
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 自检调度器
pub struct PingScheduler {
    /// 调度参数
    schedule: PingSchedule,
    /// 共享运行状态
    health: Arc<HealthState>,
    /// 控制台日志
    logs: Arc<LogBroadcaster>,
    /// 探测器
    probe: Arc<dyn HealthProbe>,
    /// 外部自检槽位
    external: Mutex<ExternalSlot>,
    /// 外部自检当前代号，旧代号的定时器到期后不会发出请求
    current_generation: Arc<AtomicU64>,
    /// 存活的外部自检任务数
    active_external: Arc<AtomicUsize>,
    /// 本地检测与域名验证任务
    background: Mutex<Vec<TimerHandle>>,
}

impl PingScheduler {
    /// 创建新的自检调度器
    ///
    /// # 参数
    /// * `schedule` - 调度参数
    /// * `health` - 共享运行状态
    /// * `logs` - 控制台日志
    /// * `probe` - 探测器
    pub fn new(
        schedule: PingSchedule,
        health: Arc<HealthState>,
        logs: Arc<LogBroadcaster>,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        Self {
            schedule,
            health,
            logs,
            probe,
            external: Mutex::new(ExternalSlot {
                timer: None,
                target: None,
                state: ExternalTaskState::Stopped,
            }),
            current_generation: Arc::new(AtomicU64::new(0)),
            active_external: Arc::new(AtomicUsize::new(0)),
            background: Mutex::new(Vec::new()),
        }
    }

    fn external_slot(&self) -> MutexGuard<'_, ExternalSlot> {
        self.external.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn background_tasks(&self) -> MutexGuard<'_, Vec<TimerHandle>> {
        self.background.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 启动调度器
    ///
    /// 启动本地检测与域名验证；如果已知对外地址，同时启动外部自检。
    /// 重复调用会先取消已有的后台任务。
    pub fn start(&self) {
        info!("启动自检调度器");

        let local = self.spawn_local_task();
        let domain = self.spawn_domain_task();
        {
            let mut background = self.background_tasks();
            background.clear();
            background.push(local);
            background.push(domain);
        }

        self.logs
            .info(format!("Local pinger -> {}", self.schedule.local_url));

        if self.health.endpoint().is_some() {
            self.restart_external_task();
        }
    }

    /// 停止所有任务
    pub fn stop(&self) {
        info!("停止自检调度器");

        self.background_tasks().clear();

        let mut slot = self.external_slot();
        self.current_generation.fetch_add(1, Ordering::SeqCst);
        slot.timer = None;
        slot.target = None;
        slot.state = ExternalTaskState::Stopped;
    }

    /// 重建外部自检任务
    ///
    /// 对外地址未知时不做任何事。取消旧定时器与安装新定时器在同一临界区内
    /// 完成，任意时刻最多只有一个有效的外部自检定时器。
    pub fn restart_external_task(&self) {
        let url = {
            let mut slot = self.external_slot();

            let Some(endpoint) = self.health.endpoint() else {
                debug!("对外地址未知，跳过外部自检任务");
                return;
            };
            let url = join_health_url(&endpoint, &self.schedule.health_path);

            let generation = self.current_generation.fetch_add(1, Ordering::SeqCst) + 1;
            // 先取消旧定时器
            drop(slot.timer.take());

            let task = self.spawn_external_task(url.clone(), generation);
            slot.timer = Some(TimerHandle::new(generation, task));
            slot.target = Some(url.clone());
            slot.state = match slot.state {
                ExternalTaskState::Stopped => ExternalTaskState::Scheduled,
                ExternalTaskState::Scheduled | ExternalTaskState::Rescheduled => {
                    ExternalTaskState::Rescheduled
                }
            };
            url
        };

        self.logs.debug(format!("External pinger -> {url}"));
    }

    /// 外部自检任务状态
    pub fn external_state(&self) -> ExternalTaskState {
        self.external_slot().state
    }

    /// 外部自检当前目标地址
    pub fn external_target(&self) -> Option<String> {
        self.external_slot().target.clone()
    }

    /// 当前外部自检定时器代号
    pub fn external_generation(&self) -> Option<u64> {
        self.external_slot().timer.as_ref().map(TimerHandle::generation)
    }

    /// 仍存活的外部自检任务数
    pub fn active_external_timers(&self) -> usize {
        self.active_external.load(Ordering::SeqCst)
    }

    fn spawn_local_task(&self) -> TimerHandle {
        let probe = Arc::clone(&self.probe);
        let url = self.schedule.local_url.clone();
        let period = self.schedule.local_interval;
        let timeout = self.schedule.request_timeout;

        let task = tokio::spawn(async move {
            let mut ticker = periodic(period);
            loop {
                ticker.tick().await;
                local_check(probe.as_ref(), &url, timeout).await;
            }
        });
        TimerHandle::new(0, task)
    }

    fn spawn_domain_task(&self) -> TimerHandle {
        let probe = Arc::clone(&self.probe);
        let logs = Arc::clone(&self.logs);
        let health = Arc::clone(&self.health);
        let health_path = self.schedule.health_path.clone();
        let period = self.schedule.domain_check_interval;
        let timeout = self.schedule.domain_check_timeout;

        let task = tokio::spawn(async move {
            let mut ticker = periodic(period);
            loop {
                ticker.tick().await;
                domain_check(probe.as_ref(), &logs, &health, &health_path, timeout).await;
            }
        });
        TimerHandle::new(0, task)
    }

    fn spawn_external_task(&self, url: String, generation: u64) -> JoinHandle<()> {
        let probe = Arc::clone(&self.probe);
        let logs = Arc::clone(&self.logs);
        let current = Arc::clone(&self.current_generation);
        let guard = ActiveGuard::new(&self.active_external);
        let period = self.schedule.external_interval;
        let timeout = self.schedule.request_timeout;

        tokio::spawn(async move {
            let _guard = guard;
            let mut ticker = periodic(period);
            loop {
                ticker.tick().await;
                if current.load(Ordering::SeqCst) != generation {
                    debug!("外部自检定时器已被替换: {}", url);
                    break;
                }
                external_check(probe.as_ref(), &logs, &url, timeout).await;
            }
        })
    }
}

/// 首次触发在一个周期之后
fn periodic(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// 拼接健康检查地址
pub fn join_health_url(endpoint: &str, health_path: &str) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), health_path)
}

/// 本地回环检测，结果只写入进程日志
pub async fn local_check(probe: &dyn HealthProbe, url: &str, timeout: Duration) -> ProbeOutcome {
    let report = probe.get(url, timeout).await;
    match &report.outcome {
        ProbeOutcome::Status(code) => debug!(
            "本地检测完成: {} -> {} ({}ms)",
            url,
            code,
            report.elapsed.as_millis()
        ),
        ProbeOutcome::Failed(reason) => debug!("本地检测失败: {} ({})", url, reason),
    }
    report.outcome
}

/// 外部自检
///
/// 发送前记录 debug；200 记录 info，其他状态码记录 warn，传输失败记录 error。
/// 不修改健康标志。
pub async fn external_check(
    probe: &dyn HealthProbe,
    logs: &LogBroadcaster,
    url: &str,
    timeout: Duration,
) -> ProbeOutcome {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    logs.debug(format!("PING → {url} @ {now}"));

    let report = probe.get(url, timeout).await;
    match &report.outcome {
        ProbeOutcome::Status(200) => {
            logs.info("External ping OK");
        }
        ProbeOutcome::Status(code) => {
            logs.warn(format!("Non-200 status: {code}"));
        }
        ProbeOutcome::Failed(reason) => {
            logs.error(format!("External ping failed: {reason}"));
        }
    }
    report.outcome
}

/// 域名验证
///
/// 对外地址未知时返回 None，不发出请求。传输失败与超时记录 error。
pub async fn domain_check(
    probe: &dyn HealthProbe,
    logs: &LogBroadcaster,
    health: &HealthState,
    health_path: &str,
    timeout: Duration,
) -> Option<ProbeOutcome> {
    let endpoint = health.endpoint()?;
    let url = join_health_url(&endpoint, health_path);

    let report = probe.head(&url, timeout).await;
    match &report.outcome {
        ProbeOutcome::Status(200) => {
            logs.info(format!("Domain verified: {endpoint}"));
        }
        ProbeOutcome::Status(code) => {
            logs.warn(format!("Domain check returned: {code}"));
        }
        ProbeOutcome::Failed(reason) => {
            debug!("域名验证失败: {} ({})", url, reason);
            logs.error("Domain failed. Waiting for new whoami header...");
        }
    }
    Some(report.outcome)
}
