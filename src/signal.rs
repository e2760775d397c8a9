//! 信号处理模块
//!
//! 监听 SIGINT/SIGTERM（非 Unix 平台为 Ctrl+C），通过广播通道触发优雅关闭

use crate::error::Result;
use crate::logs::LogBroadcaster;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

#[cfg(unix)]
use signal_hook::consts::{SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook_tokio::Signals;

/// 设置信号处理器
///
/// # 参数
/// * `shutdown_tx` - 关闭信号发送器
/// * `logs` - 控制台日志，收到信号时记录一条
pub async fn setup_signal_handlers(
    shutdown_tx: broadcast::Sender<()>,
    logs: Arc<LogBroadcaster>,
) -> Result<()> {
    #[cfg(unix)]
    {
        setup_unix_signals(shutdown_tx, logs).await
    }
    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => request_shutdown("SIGINT", &logs, &shutdown_tx),
                Err(e) => error!("监听中断信号失败: {e}"),
            }
        });
        Ok(())
    }
}

/// Unix/Linux系统信号处理
#[cfg(unix)]
async fn setup_unix_signals(
    shutdown_tx: broadcast::Sender<()>,
    logs: Arc<LogBroadcaster>,
) -> Result<()> {
    use futures::stream::StreamExt;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    tokio::spawn(async move {
        if let Some(signal) = signals.next().await {
            request_shutdown(signal_name(signal), &logs, &shutdown_tx);
        }
    });

    Ok(())
}

#[cfg(unix)]
fn signal_name(signal: i32) -> &'static str {
    match signal {
        SIGTERM => "SIGTERM",
        SIGINT => "SIGINT",
        _ => "signal",
    }
}

/// 记录信号并广播关闭
pub fn request_shutdown(name: &str, logs: &LogBroadcaster, shutdown_tx: &broadcast::Sender<()>) {
    info!("接收到 {} 信号，开始优雅关闭...", name);
    logs.info(format!("{name} received, shutting down"));
    if let Err(e) = shutdown_tx.send(()) {
        error!("发送关闭信号失败: {e}");
    }
}
