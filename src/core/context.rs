//! 应用上下文
//!
//! 进程内所有共享组件的集合，作为 axum 状态克隆到每个处理函数中

use crate::config::{Config, PingSchedule};
use crate::endpoint::EndpointLearner;
use crate::health::{HealthProbe, PingScheduler};
use crate::logs::LogBroadcaster;
use crate::status::HealthState;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;

/// 应用上下文
#[derive(Clone)]
pub struct AppContext {
    /// 生效的配置
    pub config: Arc<Config>,
    /// 运行状态
    pub health: Arc<HealthState>,
    /// 控制台日志
    pub logs: Arc<LogBroadcaster>,
    /// 自检调度器
    pub scheduler: Arc<PingScheduler>,
    /// 对外地址学习器
    pub learner: EndpointLearner,
    /// 关闭信号发送器
    shutdown: broadcast::Sender<()>,
}

impl AppContext {
    /// 创建应用上下文
    ///
    /// # 参数
    /// * `config` - 已验证的配置
    /// * `probe` - 调度器使用的探测器
    pub fn new(config: Config, probe: Arc<dyn HealthProbe>) -> Self {
        let health = Arc::new(HealthState::new(config.server.initial_endpoint.clone()));
        let logs = Arc::new(LogBroadcaster::new(config.console.buffer_capacity));
        let scheduler = Arc::new(PingScheduler::new(
            PingSchedule::from_config(&config),
            Arc::clone(&health),
            Arc::clone(&logs),
            probe,
        ));
        let learner = EndpointLearner::new(
            Arc::clone(&health),
            Arc::clone(&logs),
            Arc::clone(&scheduler),
        );
        let (shutdown, _) = broadcast::channel(1);

        Self {
            config: Arc::new(config),
            health,
            logs,
            scheduler,
            learner,
            shutdown,
        }
    }

    /// 关闭信号发送器
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// 订阅关闭信号
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// 收到关闭信号时完成的 future，用于结束长连接
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.subscribe_shutdown();
        async move {
            let _ = rx.recv().await;
        }
    }
}
