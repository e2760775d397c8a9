//! 应用程序核心逻辑
//!
//! 负责配置加载、组件初始化、服务启动和关闭清理

use crate::cli::Args;
use crate::config::{is_http_url, validate_config, Config, ConfigLoader, TomlConfigLoader};
use crate::core::context::AppContext;
use crate::error::ConfigError;
use crate::health::HttpProbe;
use crate::logging::{LogConfig, LoggingSystem};
use crate::signal::setup_signal_handlers;
use crate::web::WebServer;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// 运行保活服务，直到收到关闭信号
///
/// # 参数
/// * `args` - 命令行参数
pub async fn run(args: Args) -> Result<()> {
    // 1. 加载配置并应用命令行覆盖
    let (config, ignored_hint) = prepare_config(&args).await?;

    // 2. 初始化日志系统
    let log_config = LogConfig::from_level_str(&config.server.log_level, args.json_logs);
    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("Keep Alive v{} 启动", crate::VERSION);
    if let Some(hint) = ignored_hint {
        warn!("平台提供的对外地址无效，已忽略: {}", hint);
    }

    // 3. 初始化共享组件
    let probe = HttpProbe::new(std::time::Duration::from_millis(
        config.pinger.request_timeout_ms,
    ))
    .context("创建HTTP探测器失败")?;

    let addr = config
        .server
        .socket_addr()
        .map_err(|e| anyhow::anyhow!(e))?;
    let ctx = AppContext::new(config, Arc::new(probe));

    // 4. 绑定端口
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("绑定监听地址失败: {addr}"))?;
    let port = listener.local_addr().context("读取监听地址失败")?.port();

    // 5. 信号处理
    setup_signal_handlers(ctx.shutdown_sender(), Arc::clone(&ctx.logs))
        .await
        .context("设置信号处理器失败")?;

    ctx.logs.info(format!("Server running on {port}"));
    ctx.logs.info(format!(
        "Initial URL: {}",
        ctx.health.endpoint().as_deref().unwrap_or("none")
    ));

    // 6. 启动调度器与Web服务器
    ctx.scheduler.start();

    let server = WebServer::new(ctx.clone());
    let result = server.serve(listener).await;

    // 7. 清理
    ctx.scheduler.stop();
    info!("服务已停止");

    result.context("Web服务器运行失败")
}

/// 加载配置、应用覆盖并验证
///
/// # 返回
/// * `(Config, Option<String>)` - 最终配置与被忽略的平台地址
async fn prepare_config(args: &Args) -> Result<(Config, Option<String>)> {
    let mut config = load_config(args).await?;
    let ignored_hint = apply_overrides(&mut config, args);
    validate_config(&config).map_err(ConfigError::ValidationError)?;
    Ok((config, ignored_hint))
}

/// 加载配置文件，未指定时使用默认配置
async fn load_config(args: &Args) -> Result<Config> {
    match &args.config {
        Some(path) => TomlConfigLoader::new(true)
            .load_from_file(path)
            .await
            .with_context(|| format!("加载配置文件失败: {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// 应用命令行与平台环境变量覆盖
///
/// 平台地址只是猜测值，不是 http(s) 地址时丢弃，不影响启动。
///
/// # 返回
/// * `Option<String>` - 被丢弃的平台地址
pub fn apply_overrides(config: &mut Config, args: &Args) -> Option<String> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = &args.bind {
        config.server.bind_address = bind.clone();
    }
    if let Some(level) = args.log_level {
        config.server.log_level = level.to_string();
    }
    match args.initial_endpoint() {
        Some(endpoint) if is_http_url(&endpoint) => {
            config.server.initial_endpoint = Some(endpoint);
            None
        }
        other => other,
    }
}
