use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::{
    api::middleware::current_trace_id,
    domain::{ErrorKind, WalletError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppErrorCode {
    // HTTP 基础错误码
    BadRequest,
    Unauthorized,
    Forbidden,
    Internal,

    // 账本错误码（`WalletError::code()`）
    Ledger(&'static str),
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::BadRequest => "bad_request",
            AppErrorCode::Unauthorized => "unauthorized",
            AppErrorCode::Forbidden => "forbidden",
            AppErrorCode::Internal => "internal",
            AppErrorCode::Ledger(code) => *code,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    trace_id: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let trace_id = self.trace_id.or_else(current_trace_id);
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
            trace_id: trace_id.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    fn new(code: AppErrorCode, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status,
            trace_id: current_trace_id(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::BadRequest, StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Unauthorized, StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Forbidden, StatusCode::FORBIDDEN, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Internal, StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation | ErrorKind::InsufficientFunds => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // 内部错误不向调用方暴露细节
        let message = match err.kind() {
            ErrorKind::Internal => {
                tracing::error!(error = %err, "internal ledger error");
                "internal server error".to_string()
            }
            _ => err.to_string(),
        };

        Self::new(AppErrorCode::Ledger(err.code()), status, message)
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::bad_request(format!("invalid id: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_error_status_mapping() {
        let cases = [
            (WalletError::AssetNotFound, StatusCode::NOT_FOUND),
            (WalletError::AccountNotFound, StatusCode::NOT_FOUND),
            (WalletError::InvalidAmount, StatusCode::BAD_REQUEST),
            (WalletError::InsufficientBalance, StatusCode::BAD_REQUEST),
            (WalletError::DuplicateAsset, StatusCode::CONFLICT),
            (
                WalletError::InvalidTransition {
                    from: "confirmed".into(),
                    to: "failed".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                WalletError::NotImplemented("fiat withdrawal"),
                StatusCode::NOT_IMPLEMENTED,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn test_internal_message_is_hidden() {
        let err = AppError::from(WalletError::Internal("lock account row failed".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal server error");
        assert_eq!(err.code.as_str(), "internal");
    }

    #[test]
    fn test_ledger_code_passes_through() {
        let err = AppError::from(WalletError::InsufficientBalance);
        assert_eq!(err.code, AppErrorCode::Ledger("insufficient_balance"));
    }
}
