//! Web 路由处理函数
//!
//! 实现状态页面、健康端点、状态上报、日志写入与日志流

use super::{ApiError, ApiResponse};
use crate::core::AppContext;
use crate::endpoint::ForwardedHeaders;
use crate::logs::{LogEntry, LogLevel};
use crate::status::{format_uptime, healthy_from_report};
use askama::Template;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Json, Response};
use chrono::{SecondsFormat, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::error;

/// 状态页面模板
#[derive(Template)]
#[template(path = "status.html")]
struct StatusPage {
    uptime: String,
    detected: String,
    bot_label: &'static str,
    version: &'static str,
}

/// 状态页面
pub async fn index(State(ctx): State<AppContext>) -> Response {
    let snapshot = ctx.health.snapshot();

    let page = StatusPage {
        uptime: format_uptime(snapshot.uptime),
        detected: snapshot.endpoint.unwrap_or_else(|| "-".to_string()),
        bot_label: if snapshot.healthy {
            "Connected"
        } else {
            "Initializing"
        },
        version: crate::VERSION,
    };

    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("模板渲染失败: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "模板渲染失败").into_response()
        }
    }
}

/// 健康端点
pub async fn health(State(ctx): State<AppContext>) -> Json<Value> {
    let snapshot = ctx.health.snapshot();

    Json(json!({
        "ok": true,
        "uptime": snapshot.uptime.as_secs_f64(),
        "detected": snapshot.endpoint,
        "bot": snapshot.healthy,
        "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// 地址诊断
pub async fn whoami(State(ctx): State<AppContext>, headers: HeaderMap) -> Json<Value> {
    Json(json!({
        "detected_url": ctx.health.endpoint(),
        "headers": ForwardedHeaders::from_headers(&headers),
    }))
}

/// 机器人状态上报
///
/// 请求体缺失或不是合法 JSON 时按健康处理。
pub async fn bot_status(State(ctx): State<AppContext>, body: Bytes) -> ApiResponse {
    let report = parse_body(&body);
    let healthy = healthy_from_report(report.as_ref());
    ctx.health.set_health(healthy, &ctx.logs);

    ApiResponse::ok()
}

/// 外部模块写入控制台日志
///
/// 请求体 `{ "level": "info|warn|error|debug", "msg": ... }`
pub async fn post_log(
    State(ctx): State<AppContext>,
    body: Bytes,
) -> Result<ApiResponse, ApiError> {
    let report = parse_body(&body);

    let msg = report
        .as_ref()
        .and_then(|v| v.get("msg"))
        .and_then(message_text)
        .ok_or_else(|| ApiError::bad_request("missing msg"))?;
    let level_text = report
        .as_ref()
        .and_then(|v| v.get("level"))
        .and_then(message_text);
    let (level, msg) = resolve_level(level_text, msg);

    ctx.logs.record(level, msg);
    Ok(ApiResponse::ok())
}

/// 最近的日志
pub async fn recent_logs(State(ctx): State<AppContext>) -> Json<Vec<LogEntry>> {
    Json(ctx.logs.recent_snapshot(ctx.config.console.recent_limit))
}

/// 实时日志流
///
/// 先回放整个缓冲区，再推送新日志。连接断开时订阅随流一起释放。
pub async fn log_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (history, subscription) = ctx.logs.subscribe();

    let events = stream::iter(history)
        .chain(subscription)
        .map(|entry| Ok(entry_event(&entry)))
        .take_until(ctx.shutdown_signal());

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn entry_event(entry: &LogEntry) -> Event {
    Event::default()
        .json_data(entry)
        .unwrap_or_else(|_| Event::default().data(entry.to_line()))
}

fn parse_body(body: &Bytes) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice(body).ok()
}

/// 解析日志级别
///
/// 无法识别的级别按 info 记录，级别文本保留在消息开头。
fn resolve_level(level: Option<String>, msg: String) -> (LogLevel, String) {
    match level {
        None => (LogLevel::Info, msg),
        Some(text) => match text.parse() {
            Ok(level) => (level, msg),
            Err(_) => (LogLevel::Info, format!("{text} {msg}")),
        },
    }
}

/// 提取日志文本
///
/// 空值（null、空字符串、false、0）视为缺失，非字符串值记录其 JSON 文本。
fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}
