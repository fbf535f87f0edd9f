//! JWT Token 生成和验证模块
//!
//! 身份由上游认证服务签发，这里只校验 HS256 签名并读出 `sub` / `role`。

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const ADMIN_ROLE: &str = "admin";

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Subject (user ID)
    pub role: String, // User role
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
}

impl Claims {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.into(),
            role: role.into(),
            exp: (now + Duration::seconds(expires_in_secs)).timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// 生成JWT Token（本地联调与测试使用）
pub fn generate_token(claims: &Claims, secret: &str) -> Result<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| anyhow!("Failed to encode token: {}", e))
}

/// 验证JWT Token
pub fn verify_token(token: &str, secret: &str) -> Result<Claims> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 10; // 允许10秒时钟偏差

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "JWT: token verification failed");
        anyhow!("Token verification failed: {}", e)
    })?
    .claims;

    if claims.sub.trim().is_empty() {
        return Err(anyhow!("Token subject is empty"));
    }

    tracing::debug!(sub = %claims.sub, role = %claims.role, "JWT: claims decoded");
    Ok(claims)
}
