//! 内部转账 API

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::{
        middleware::JwtAuthContext,
        response::{success_response, ApiResponse},
    },
    app_state::AppState,
    domain::{Amount, InternalTransfer},
    error::AppError,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTransferRequest {
    /// 收款用户 ID
    pub to_user_id: String,
    pub asset_symbol: String,
    pub amount: String,
    /// 调用方幂等引用，重复提交返回 409
    pub reference_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransferResponse {
    pub id: String,
    pub from_account_id: String,
    pub to_account_id: String,
    pub asset_id: String,
    pub amount: String,
    pub reference_id: Option<String>,
    pub created_at: String,
}

impl From<InternalTransfer> for TransferResponse {
    fn from(t: InternalTransfer) -> Self {
        Self {
            id: t.id.to_string(),
            from_account_id: t.from_account_id.to_string(),
            to_account_id: t.to_account_id.to_string(),
            asset_id: t.asset_id.to_string(),
            amount: t.amount.to_string(),
            reference_id: t.reference_id,
            created_at: t.created_at.to_rfc3339(),
        }
    }
}

/// POST /v1/transfers
#[utoipa::path(
    post,
    path = "/v1/transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 200, description = "Transfer executed", body = TransferResponse),
        (status = 400, description = "Invalid amount, self transfer or insufficient balance"),
        (status = 409, description = "Duplicate reference id")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    auth: JwtAuthContext,
    Json(req): Json<CreateTransferRequest>,
) -> Result<Json<ApiResponse<TransferResponse>>, AppError> {
    let amount: Amount = req.amount.parse()?;

    let transfer = state
        .transfers
        .transfer(
            &auth.user_id,
            &req.to_user_id,
            &req.asset_symbol,
            amount,
            req.reference_id,
        )
        .await?;

    success_response(TransferResponse::from(transfer))
}
