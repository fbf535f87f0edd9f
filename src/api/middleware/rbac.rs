//! 基于角色的权限控制
//!
//! 管理端路由（资产注册、提现审批、充值确认）要求 admin 角色。

use axum::{extract::Request, middleware::Next, response::Response};

use super::jwt_extractor::JwtAuthContext;
use crate::error::AppError;

/// 权限检查：要求管理员角色
pub fn require_admin(auth: &JwtAuthContext) -> Result<(), AppError> {
    if !auth.is_admin() {
        tracing::warn!(user_id = %auth.user_id, role = %auth.role, "admin route denied");
        return Err(AppError::forbidden("admin role required"));
    }
    Ok(())
}

/// 管理端路由中间件（必须位于 JWT 中间件之后）
pub async fn require_admin_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    let auth = req
        .extensions()
        .get::<JwtAuthContext>()
        .ok_or_else(|| AppError::unauthorized("unauthenticated"))?;
    require_admin(auth)?;

    Ok(next.run(req).await)
}
