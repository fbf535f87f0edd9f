//! 提现 API（用户端）

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    api::{
        middleware::JwtAuthContext,
        response::{success_response, ApiResponse},
    },
    app_state::AppState,
    domain::{Amount, Withdrawal},
    error::AppError,
    service::WithdrawalRequest,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 请求/响应模型
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateWithdrawalRequest {
    pub asset_symbol: String,
    /// 金额（最小单位，十进制整数字符串）
    pub amount: String,
    pub to_address: String,
    /// 网络名称，省略时使用资产的默认网络
    pub network: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WithdrawalResponse {
    pub id: String,
    pub account_id: String,
    pub asset_id: String,
    pub network_id: Option<String>,
    pub status: String,
    pub amount: String,
    pub to_address: String,
    pub onchain_tx_id: Option<String>,
    pub network_fee: String,
    pub approved_by: Option<String>,
    pub failure_reason: Option<String>,
    pub priority: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(w: Withdrawal) -> Self {
        Self {
            id: w.id.to_string(),
            account_id: w.account_id.to_string(),
            asset_id: w.asset_id.to_string(),
            network_id: w.network_id.map(|id| id.to_string()),
            status: w.status.to_string(),
            amount: w.amount.to_string(),
            to_address: w.to_address,
            onchain_tx_id: w.onchain_tx_id,
            network_fee: w.network_fee.to_string(),
            approved_by: w.approved_by,
            failure_reason: w.failure_reason,
            priority: w.priority,
            created_at: w.created_at.to_rfc3339(),
            updated_at: w.updated_at.to_rfc3339(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POST /v1/withdrawals
///
/// 锁定资金并创建提现（状态 requested）
#[utoipa::path(
    post,
    path = "/v1/withdrawals",
    request_body = CreateWithdrawalRequest,
    responses(
        (status = 200, description = "Withdrawal requested", body = WithdrawalResponse),
        (status = 400, description = "Invalid amount, below minimum or insufficient balance"),
        (status = 404, description = "Asset or network not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_withdrawal(
    State(state): State<Arc<AppState>>,
    auth: JwtAuthContext,
    Json(req): Json<CreateWithdrawalRequest>,
) -> Result<Json<ApiResponse<WithdrawalResponse>>, AppError> {
    let amount: Amount = req.amount.parse()?;

    let withdrawal = state
        .wallet
        .request_withdrawal(WithdrawalRequest {
            user_id: auth.user_id,
            asset_symbol: req.asset_symbol,
            amount,
            to_address: req.to_address,
            network: req.network,
            priority: req.priority,
        })
        .await?;

    success_response(WithdrawalResponse::from(withdrawal))
}

/// GET /v1/withdrawals
#[utoipa::path(
    get,
    path = "/v1/withdrawals",
    responses((status = 200, description = "Caller's withdrawals, newest first", body = [WithdrawalResponse])),
    security(("bearer_auth" = []))
)]
pub async fn list_withdrawals(
    State(state): State<Arc<AppState>>,
    auth: JwtAuthContext,
) -> Result<Json<ApiResponse<Vec<WithdrawalResponse>>>, AppError> {
    let list = state.withdrawals.list_for_user(&auth.user_id).await?;
    success_response(list.into_iter().map(WithdrawalResponse::from).collect())
}

/// GET /v1/withdrawals/:id
#[utoipa::path(
    get,
    path = "/v1/withdrawals/{id}",
    params(("id" = String, Path, description = "Withdrawal id")),
    responses(
        (status = 200, description = "Withdrawal", body = WithdrawalResponse),
        (status = 404, description = "Withdrawal not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_withdrawal(
    State(state): State<Arc<AppState>>,
    auth: JwtAuthContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<WithdrawalResponse>>, AppError> {
    let id = Uuid::parse_str(&id)?;
    let withdrawal = state.withdrawals.get(&auth.user_id, id).await?;
    success_response(WithdrawalResponse::from(withdrawal))
}

/// POST /v1/withdrawals/:id/cancel
///
/// 广播前取消，锁定资金退回可用余额
#[utoipa::path(
    post,
    path = "/v1/withdrawals/{id}/cancel",
    params(("id" = String, Path, description = "Withdrawal id")),
    responses(
        (status = 200, description = "Withdrawal cancelled", body = WithdrawalResponse),
        (status = 409, description = "Withdrawal can no longer be cancelled")
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_withdrawal(
    State(state): State<Arc<AppState>>,
    auth: JwtAuthContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<WithdrawalResponse>>, AppError> {
    let id = Uuid::parse_str(&id)?;
    let withdrawal = state.withdrawals.cancel(&auth.user_id, id).await?;
    success_response(WithdrawalResponse::from(withdrawal))
}
