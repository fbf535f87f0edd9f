//! sqlx 错误翻译
//!
//! 驱动错误（唯一约束、外键、连接失败）只在这里出现，
//! 适配器对外只返回 `WalletError`。

use crate::domain::WalletError;

/// PostgreSQL unique_violation
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL foreign_key_violation
const FOREIGN_KEY_VIOLATION: &str = "23503";

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION))
}

/// 违反的约束名
pub(crate) fn constraint_name(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.constraint().map(str::to_string),
        _ => None,
    }
}

/// 未预期的存储错误：记录日志后折叠为 Internal
pub(crate) fn internal(context: &'static str) -> impl FnOnce(sqlx::Error) -> WalletError {
    move |err| {
        tracing::error!(error = %err, "{} failed", context);
        WalletError::Internal(format!("{context} failed"))
    }
}
