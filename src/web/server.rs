//! Web服务器实现
//!
//! 提供路由组装和带优雅关闭的HTTP服务器

use super::{handlers, middleware::learn_endpoint};
use crate::core::AppContext;
use crate::error::Result;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// 创建路由
///
/// 地址学习中间件作用于所有路由。健康检查路径被改过时，`/health` 仍然可用。
pub fn create_router(ctx: AppContext) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/whoami", get(handlers::whoami))
        .route("/bot-status", post(handlers::bot_status))
        .route("/log", post(handlers::post_log))
        .route("/logs/recent", get(handlers::recent_logs))
        .route("/logs/stream", get(handlers::log_stream));

    let health_path = ctx.config.pinger.health_path.as_str();
    if health_path != "/health" {
        router = router.route(health_path, get(handlers::health));
    }

    router
        .layer(middleware::from_fn_with_state(ctx.clone(), learn_endpoint))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Web服务器
pub struct WebServer {
    /// 共享上下文
    ctx: AppContext,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// 在给定的监听器上提供服务，收到关闭信号后优雅退出
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        let router = create_router(self.ctx.clone());
        let shutdown = self.ctx.shutdown_signal();

        info!("Web服务器已启动: http://{}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("接收到关闭信号，正在关闭Web服务器...");
            })
            .await?;

        info!("Web服务器已关闭");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::health::{ExternalTaskState, HealthProbe, HttpProbe};
    use crate::logs::LogLevel;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn context() -> AppContext {
        let probe: Arc<dyn HealthProbe> = Arc::new(HttpProbe::new(Duration::from_secs(1)).unwrap());
        AppContext::new(Config::default(), probe)
    }

    async fn send(ctx: &AppContext, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(ctx.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1_000_000).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let ctx = context();
        let (status, body) = send(&ctx, Request::get("/health").body(Body::empty()).unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
        assert_eq!(body["bot"], json!(false));
        assert_eq!(body["detected"], Value::Null);
        assert!(body["uptime"].is_f64());
        assert!(body["ts"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_bot_status_fail_open() {
        let ctx = context();

        let (status, body) = send(&ctx, post_json("/bot-status", "{}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));
        assert!(ctx.health.is_healthy());

        send(&ctx, post_json("/bot-status", r#"{"healthy":false}"#)).await;
        assert!(!ctx.health.is_healthy());

        send(&ctx, post_json("/bot-status", r#"{"healthy":"no"}"#)).await;
        assert!(ctx.health.is_healthy());

        let messages: Vec<String> = ctx
            .logs
            .recent_snapshot(10)
            .into_iter()
            .map(|e| e.msg)
            .collect();
        assert_eq!(
            messages,
            vec![
                "Bot Status: Connected",
                "Bot Status: Disconnected",
                "Bot Status: Connected"
            ]
        );
    }

    #[tokio::test]
    async fn test_bot_status_without_body() {
        let ctx = context();
        let request = Request::post("/bot-status").body(Body::empty()).unwrap();

        let (status, _) = send(&ctx, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(ctx.health.is_healthy());
    }

    #[tokio::test]
    async fn test_post_log() {
        let ctx = context();

        let (status, body) = send(&ctx, post_json("/log", r#"{"level":"warn","msg":"disk low"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));

        let entries = ctx.logs.recent_snapshot(10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert_eq!(entries[0].msg, "disk low");
    }

    #[tokio::test]
    async fn test_post_log_unknown_level_kept_in_message() {
        let ctx = context();
        let (status, _) = send(&ctx, post_json("/log", r#"{"level":"fatal","msg":"x"}"#)).await;
        assert_eq!(status, StatusCode::OK);

        let entry = &ctx.logs.recent_snapshot(1)[0];
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.msg, "fatal x");

        send(&ctx, post_json("/log", r#"{"level":"","msg":"plain"}"#)).await;
        let entry = &ctx.logs.recent_snapshot(1)[0];
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.msg, "plain");
    }

    #[tokio::test]
    async fn test_post_log_missing_msg() {
        let ctx = context();

        for body in ["{}", r#"{"msg":""}"#, r#"{"msg":null}"#, "garbage"] {
            let (status, response) = send(&ctx, post_json("/log", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(response, json!({"ok": false, "error": "missing msg"}));
        }

        assert!(ctx.logs.is_empty());
    }

    #[tokio::test]
    async fn test_recent_logs_limit() {
        let ctx = context();
        for i in 0..150 {
            ctx.logs.info(format!("line {i}"));
        }

        let (status, body) =
            send(&ctx, Request::get("/logs/recent").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);

        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 100);
        assert_eq!(entries[0]["msg"], json!("line 50"));
        assert_eq!(entries[99]["msg"], json!("line 149"));
        assert_eq!(entries[99]["level"], json!("info"));
    }

    #[tokio::test]
    async fn test_whoami() {
        let ctx = context();
        let request = Request::get("/whoami")
            .header("x-forwarded-proto", "https")
            .header("x-forwarded-host", "svc.example")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&ctx, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["detected_url"], json!("https://svc.example"));
        assert_eq!(body["headers"]["x-forwarded-proto"], json!("https"));
        assert_eq!(body["headers"]["x-forwarded-host"], json!("svc.example"));

        ctx.scheduler.stop();
    }

    #[tokio::test]
    async fn test_learner_runs_on_every_route() {
        let ctx = context();
        let request = Request::get("/health")
            .header("x-forwarded-proto", "https")
            .header("x-forwarded-host", "example.com")
            .body(Body::empty())
            .unwrap();

        let (_, body) = send(&ctx, request).await;

        assert_eq!(body["detected"], json!("https://example.com"));
        assert_eq!(ctx.scheduler.external_state(), ExternalTaskState::Scheduled);
        let learned: Vec<_> = ctx
            .logs
            .recent_snapshot(10)
            .into_iter()
            .filter(|e| e.level == LogLevel::Info && e.msg.contains("example.com"))
            .collect();
        assert_eq!(learned.len(), 1);

        ctx.scheduler.stop();
    }

    #[tokio::test]
    async fn test_index_page() {
        let ctx = context();
        let response = create_router(ctx.clone())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 1_000_000).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Initializing"));
        assert!(html.contains("/logs/stream"));
    }

    #[tokio::test]
    async fn test_log_stream_replays_then_follows() {
        let ctx = context();
        ctx.logs.info("before subscribe");

        let response = create_router(ctx.clone())
            .oneshot(Request::get("/logs/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        assert_eq!(ctx.logs.subscriber_count(), 1);

        let mut body = response.into_body().into_data_stream();
        let mut received = String::new();
        while !received.contains("before subscribe") {
            let chunk = tokio::time::timeout(Duration::from_secs(2), body.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            received.push_str(&String::from_utf8_lossy(&chunk));
        }
        assert!(received.starts_with("data: {"));

        ctx.logs.warn("after subscribe");
        while !received.contains("after subscribe") {
            let chunk = tokio::time::timeout(Duration::from_secs(2), body.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            received.push_str(&String::from_utf8_lossy(&chunk));
        }

        drop(body);
        assert_eq!(ctx.logs.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_log_stream_ends_on_shutdown() {
        let ctx = context();
        let response = create_router(ctx.clone())
            .oneshot(Request::get("/logs/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mut body = response.into_body().into_data_stream();

        ctx.shutdown_sender().send(()).unwrap();

        let next = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_serve_shuts_down_gracefully() {
        let ctx = context();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(WebServer::new(ctx.clone()).serve(listener));

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{addr}/health"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        ctx.shutdown_sender().send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
