//! 账户余额 API

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    api::{
        middleware::JwtAuthContext,
        response::{success_response, ApiResponse},
    },
    app_state::AppState,
    domain::{DepositAddress, UserAccount},
    error::AppError,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountResponse {
    pub account_id: String,
    pub asset_id: String,
    pub asset_symbol: String,
    /// 可用余额（最小单位，十进制字符串）
    pub balance: String,
    /// 提现中锁定的余额
    pub locked_balance: String,
    pub updated_at: String,
}

impl From<UserAccount> for AccountResponse {
    fn from(view: UserAccount) -> Self {
        let account = view.account;
        Self {
            account_id: account.id.to_string(),
            asset_id: account.asset_id.to_string(),
            asset_symbol: view.asset_symbol,
            balance: account.balance().to_string(),
            locked_balance: account.locked_balance().to_string(),
            updated_at: account.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DepositAddressResponse {
    pub account_id: String,
    pub address: String,
    pub derivation_path: String,
    pub memo_tag: Option<String>,
    pub created_at: String,
}

impl From<DepositAddress> for DepositAddressResponse {
    fn from(addr: DepositAddress) -> Self {
        Self {
            account_id: addr.account_id.to_string(),
            address: addr.address,
            derivation_path: addr.derivation_path,
            memo_tag: addr.memo_tag,
            created_at: addr.created_at.to_rfc3339(),
        }
    }
}

/// GET /v1/accounts
#[utoipa::path(
    get,
    path = "/v1/accounts",
    responses(
        (status = 200, description = "All accounts of the caller", body = [AccountResponse]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    auth: JwtAuthContext,
) -> Result<Json<ApiResponse<Vec<AccountResponse>>>, AppError> {
    let accounts = state.wallet.get_accounts(&auth.user_id).await?;
    success_response(accounts.into_iter().map(AccountResponse::from).collect())
}

/// GET /v1/accounts/:asset_symbol
#[utoipa::path(
    get,
    path = "/v1/accounts/{asset_symbol}",
    params(("asset_symbol" = String, Path, description = "Asset symbol, case-insensitive")),
    responses(
        (status = 200, description = "Account for the asset", body = AccountResponse),
        (status = 404, description = "Asset or account not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    auth: JwtAuthContext,
    Path(asset_symbol): Path<String>,
) -> Result<Json<ApiResponse<AccountResponse>>, AppError> {
    let account = state
        .wallet
        .get_account_by_asset(&auth.user_id, &asset_symbol)
        .await?;
    success_response(AccountResponse::from(account))
}

/// GET /v1/accounts/:asset_symbol/deposit-address
#[utoipa::path(
    get,
    path = "/v1/accounts/{asset_symbol}/deposit-address",
    params(("asset_symbol" = String, Path, description = "Asset symbol, case-insensitive")),
    responses(
        (status = 200, description = "Deposit address of the account", body = DepositAddressResponse),
        (status = 404, description = "Asset, account or address not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_deposit_address(
    State(state): State<Arc<AppState>>,
    auth: JwtAuthContext,
    Path(asset_symbol): Path<String>,
) -> Result<Json<ApiResponse<DepositAddressResponse>>, AppError> {
    let addr = state
        .deposits
        .get_deposit_address(&auth.user_id, &asset_symbol)
        .await?;
    success_response(DepositAddressResponse::from(addr))
}
