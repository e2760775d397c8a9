//! Web界面和API模块
//!
//! 提供状态页面、健康端点、日志接口和实时日志流

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::{create_router, WebServer};

/// 简单确认响应 `{ "ok": true }`
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    /// 是否成功
    pub ok: bool,
}

impl ApiResponse {
    /// 成功响应
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// API错误，序列化为 `{ "ok": false, "error": "..." }`
#[derive(Debug)]
pub struct ApiError {
    /// HTTP状态码
    pub status: StatusCode,
    /// 错误消息
    pub message: String,
}

impl ApiError {
    /// 创建 400 错误
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// 创建 500 错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    ok: bool,
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            ok: false,
            error: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
