//! Trace ID 中间件
//! 为每个请求生成或沿用 X-Trace-Id，并打开一个携带该 ID 的 span；
//! 请求处理期间可通过 `current_trace_id` 读取，错误响应体据此带上 trace_id

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

pub const TRACE_HEADER: &str = "X-Trace-Id";

tokio::task_local! {
    static TRACE_ID: String;
}

/// 当前请求的 trace_id（不在请求范围内时为 None）
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(|id| id.clone()).ok()
}

fn get_or_generate(req: &Request) -> String {
    req.headers()
        .get(TRACE_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub async fn trace_id_middleware(req: Request, next: Next) -> Response {
    let trace_id = get_or_generate(&req);
    let span = tracing::info_span!(
        "request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path()
    );

    let mut response = TRACE_ID
        .scope(trace_id.clone(), next.run(req).instrument(span))
        .await;

    if let Ok(header_value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_HEADER, header_value);
    }

    response
}
