//! Web中间件
//!
//! 每个请求在进入路由之前都会经过对外地址学习器

use crate::core::AppContext;
use crate::endpoint::ForwardedHeaders;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

/// 从转发头学习对外地址，不影响请求本身
pub async fn learn_endpoint(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Response {
    let headers = ForwardedHeaders::from_headers(request.headers());
    ctx.learner.observe(&headers);

    next.run(request).await
}
