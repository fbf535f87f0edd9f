//! JWT 自动提取中间件
//! 从 JWT Token 中提取 user_id 和 role

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{app_state::AppState, error::AppError, infrastructure::jwt};

/// JWT 认证上下文
#[derive(Debug, Clone)]
pub struct JwtAuthContext {
    pub user_id: String,
    pub role: String,
}

impl JwtAuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == jwt::ADMIN_ROLE
    }
}

/// 从 Authorization 头部提取 JWT Token 并解析 claims，
/// 认证上下文注入到 request extensions 中
pub async fn jwt_extractor_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // OPTIONS 请求直接放行
    if req.method() == axum::http::Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let path = req.uri().path().to_string();
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            tracing::warn!(path = %path, "JWT middleware: missing or malformed Authorization header");
            AppError::unauthorized("missing bearer token")
        })?;

    let claims = jwt::verify_token(token, &state.config.jwt.secret)
        .map_err(|_| AppError::unauthorized("invalid or expired token"))?;

    tracing::debug!(user_id = %claims.sub, path = %path, "JWT middleware: authenticated");

    req.extensions_mut().insert(JwtAuthContext {
        user_id: claims.sub,
        role: claims.role,
    });

    Ok(next.run(req).await)
}

/// Axum Extractor: 从 request extensions 中提取 JWT 认证上下文
#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for JwtAuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<JwtAuthContext>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("unauthenticated"))
    }
}
