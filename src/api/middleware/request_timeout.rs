//! 调用方截止时间
//!
//! `X-Request-Timeout-Ms` 给出本次请求愿意等待的毫秒数，
//! 请求内发起的账本变更取它与服务默认值中较小者。

use std::time::Duration;

use axum::{extract::Request, middleware::Next, response::Response};

use crate::{error::AppError, infrastructure::deadline::with_caller_timeout};

pub const TIMEOUT_HEADER: &str = "X-Request-Timeout-Ms";

fn parse_timeout(req: &Request) -> Result<Option<Duration>, AppError> {
    let Some(raw) = req.headers().get(TIMEOUT_HEADER) else {
        return Ok(None);
    };

    let millis = raw
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .ok_or_else(|| {
            AppError::bad_request(format!("{TIMEOUT_HEADER} must be a positive integer"))
        })?;

    Ok(Some(Duration::from_millis(millis)))
}

pub async fn request_timeout_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    match parse_timeout(&req)? {
        Some(timeout) => Ok(with_caller_timeout(timeout, next.run(req)).await),
        None => Ok(next.run(req).await),
    }
}
