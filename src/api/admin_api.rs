//! 管理端 API：资产注册、提现推进、充值入账
//!
//! 路由挂在 require_admin_middleware 之后。

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    api::{
        account_api::DepositAddressResponse,
        asset_api::{AssetNetworkResponse, AssetResponse, NetworkResponse},
        middleware::JwtAuthContext,
        response::{success_response, ApiResponse},
        withdrawal_api::WithdrawalResponse,
    },
    app_state::AppState,
    domain::{Amount, AssetType, Deposit, WithdrawalStatus},
    error::AppError,
    service::{NetworkLinkSpec, NewAsset, ObservedDeposit},
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 请求/响应模型
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize, ToSchema)]
pub struct NetworkLinkRequest {
    /// 网络名称
    pub network: String,
    pub contract_address: Option<String>,
    #[serde(default = "zero")]
    pub min_withdrawal: String,
    #[serde(default = "zero")]
    pub withdrawal_fee: String,
}

fn zero() -> String {
    "0".to_string()
}

impl NetworkLinkRequest {
    fn into_link(self) -> Result<NetworkLinkSpec, AppError> {
        Ok(NetworkLinkSpec {
            network: self.network,
            contract_address: self.contract_address,
            min_withdrawal: self.min_withdrawal.parse::<Amount>()?,
            withdrawal_fee: self.withdrawal_fee.parse::<Amount>()?,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAssetRequest {
    pub symbol: String,
    pub name: String,
    /// CRYPTO | FIAT
    pub asset_type: String,
    pub precision: u8,
    #[serde(default)]
    pub networks: Vec<NetworkLinkRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateNetworkRequest {
    pub name: String,
    pub rpc_url: String,
    pub chain_id: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WithdrawalQueueQuery {
    /// 缺省为 requested
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BroadcastRequest {
    pub onchain_tx_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FailRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordDepositRequest {
    pub user_id: String,
    pub asset_symbol: String,
    pub amount: String,
    pub onchain_tx_id: String,
    pub from_address: String,
    #[serde(default)]
    pub confirmations: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignDepositAddressRequest {
    pub user_id: String,
    pub asset_symbol: String,
    pub address: String,
    #[serde(default)]
    pub derivation_path: String,
    pub memo_tag: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmDepositRequest {
    #[serde(default)]
    pub confirmations: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DepositResponse {
    pub id: String,
    pub account_id: String,
    pub asset_id: String,
    /// unconfirmed | confirmed
    pub status: String,
    pub amount: String,
    pub onchain_tx_id: String,
    pub from_address: String,
    pub confirmations: i32,
    pub created_at: String,
    pub confirmed_at: Option<String>,
}

impl From<Deposit> for DepositResponse {
    fn from(d: Deposit) -> Self {
        Self {
            id: d.id.to_string(),
            account_id: d.account_id.to_string(),
            asset_id: d.asset_id.to_string(),
            status: d.status.to_string(),
            amount: d.amount.to_string(),
            onchain_tx_id: d.onchain_tx_id,
            from_address: d.from_address,
            confirmations: d.confirmations,
            created_at: d.created_at.to_rfc3339(),
            confirmed_at: d.confirmed_at.map(|t| t.to_rfc3339()),
        }
    }
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Ok(Uuid::parse_str(raw)?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 资产 / 网络
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POST /v1/admin/assets
#[utoipa::path(
    post,
    path = "/v1/admin/assets",
    request_body = CreateAssetRequest,
    responses(
        (status = 200, description = "Asset created with its network links", body = AssetResponse),
        (status = 409, description = "Duplicate symbol or name")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_asset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAssetRequest>,
) -> Result<Json<ApiResponse<AssetResponse>>, AppError> {
    let asset_type: AssetType = req.asset_type.parse()?;
    let networks = req
        .networks
        .into_iter()
        .map(NetworkLinkRequest::into_link)
        .collect::<Result<Vec<_>, _>>()?;

    let asset = state
        .registry
        .create_asset(NewAsset {
            symbol: req.symbol,
            name: req.name,
            asset_type,
            precision: req.precision,
            networks,
        })
        .await?;

    success_response(AssetResponse::from(asset))
}

/// POST /v1/admin/networks
#[utoipa::path(
    post,
    path = "/v1/admin/networks",
    request_body = CreateNetworkRequest,
    responses(
        (status = 200, description = "Network created", body = NetworkResponse),
        (status = 409, description = "Duplicate network name")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_network(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateNetworkRequest>,
) -> Result<Json<ApiResponse<NetworkResponse>>, AppError> {
    let network = state
        .registry
        .create_network(&req.name, &req.rpc_url, req.chain_id)
        .await?;
    success_response(NetworkResponse::from(network))
}

/// POST /v1/admin/assets/:symbol/networks
#[utoipa::path(
    post,
    path = "/v1/admin/assets/{symbol}/networks",
    params(("symbol" = String, Path, description = "Asset symbol")),
    request_body = NetworkLinkRequest,
    responses(
        (status = 200, description = "Asset linked to network", body = AssetNetworkResponse),
        (status = 404, description = "Asset or network not found"),
        (status = 409, description = "Already linked")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_asset_network(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Json(req): Json<NetworkLinkRequest>,
) -> Result<Json<ApiResponse<AssetNetworkResponse>>, AppError> {
    let link = state
        .registry
        .add_asset_to_network(&symbol, req.into_link()?)
        .await?;
    success_response(AssetNetworkResponse::from(link))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 提现推进
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// GET /v1/admin/withdrawals?status=
///
/// 待处理队列：优先级降序，同优先级先到先处理
#[utoipa::path(
    get,
    path = "/v1/admin/withdrawals",
    params(WithdrawalQueueQuery),
    responses(
        (status = 200, description = "Withdrawals in the given status", body = [WithdrawalResponse]),
        (status = 400, description = "Unknown status")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_withdrawal_queue(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WithdrawalQueueQuery>,
) -> Result<Json<ApiResponse<Vec<WithdrawalResponse>>>, AppError> {
    let status = match query.status.as_deref() {
        Some(raw) => raw
            .parse::<WithdrawalStatus>()
            .map_err(|_| AppError::bad_request(format!("unknown withdrawal status: {raw}")))?,
        None => WithdrawalStatus::Requested,
    };
    let list = state.withdrawals.list_by_status(status).await?;
    success_response(list.into_iter().map(WithdrawalResponse::from).collect())
}

/// POST /v1/admin/withdrawals/:id/approve
#[utoipa::path(
    post,
    path = "/v1/admin/withdrawals/{id}/approve",
    params(("id" = String, Path, description = "Withdrawal id")),
    responses(
        (status = 200, description = "Withdrawal approved", body = WithdrawalResponse),
        (status = 409, description = "Illegal transition")
    ),
    security(("bearer_auth" = []))
)]
pub async fn approve_withdrawal(
    State(state): State<Arc<AppState>>,
    auth: JwtAuthContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<WithdrawalResponse>>, AppError> {
    let withdrawal = state
        .withdrawals
        .approve(parse_id(&id)?, &auth.user_id)
        .await?;
    success_response(WithdrawalResponse::from(withdrawal))
}

/// POST /v1/admin/withdrawals/:id/process
#[utoipa::path(
    post,
    path = "/v1/admin/withdrawals/{id}/process",
    params(("id" = String, Path, description = "Withdrawal id")),
    responses((status = 200, description = "Withdrawal processing", body = WithdrawalResponse)),
    security(("bearer_auth" = []))
)]
pub async fn process_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<WithdrawalResponse>>, AppError> {
    let withdrawal = state.withdrawals.start_processing(parse_id(&id)?).await?;
    success_response(WithdrawalResponse::from(withdrawal))
}

/// POST /v1/admin/withdrawals/:id/broadcast
#[utoipa::path(
    post,
    path = "/v1/admin/withdrawals/{id}/broadcast",
    params(("id" = String, Path, description = "Withdrawal id")),
    request_body = BroadcastRequest,
    responses((status = 200, description = "Withdrawal broadcasted", body = WithdrawalResponse)),
    security(("bearer_auth" = []))
)]
pub async fn broadcast_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<BroadcastRequest>,
) -> Result<Json<ApiResponse<WithdrawalResponse>>, AppError> {
    let withdrawal = state
        .withdrawals
        .mark_broadcasted(parse_id(&id)?, &req.onchain_tx_id)
        .await?;
    success_response(WithdrawalResponse::from(withdrawal))
}

/// POST /v1/admin/withdrawals/:id/confirm
#[utoipa::path(
    post,
    path = "/v1/admin/withdrawals/{id}/confirm",
    params(("id" = String, Path, description = "Withdrawal id")),
    responses((status = 200, description = "Withdrawal confirmed and settled", body = WithdrawalResponse)),
    security(("bearer_auth" = []))
)]
pub async fn confirm_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<WithdrawalResponse>>, AppError> {
    let withdrawal = state.withdrawals.confirm(parse_id(&id)?).await?;
    success_response(WithdrawalResponse::from(withdrawal))
}

/// POST /v1/admin/withdrawals/:id/fail
#[utoipa::path(
    post,
    path = "/v1/admin/withdrawals/{id}/fail",
    params(("id" = String, Path, description = "Withdrawal id")),
    request_body = FailRequest,
    responses((status = 200, description = "Withdrawal failed and reverted", body = WithdrawalResponse)),
    security(("bearer_auth" = []))
)]
pub async fn fail_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<FailRequest>,
) -> Result<Json<ApiResponse<WithdrawalResponse>>, AppError> {
    let withdrawal = state
        .withdrawals
        .fail(parse_id(&id)?, &req.reason)
        .await?;
    success_response(WithdrawalResponse::from(withdrawal))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 充值
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POST /v1/admin/deposits
#[utoipa::path(
    post,
    path = "/v1/admin/deposits",
    request_body = RecordDepositRequest,
    responses(
        (status = 200, description = "Deposit recorded (unconfirmed)", body = DepositResponse),
        (status = 409, description = "Transaction already recorded")
    ),
    security(("bearer_auth" = []))
)]
pub async fn record_deposit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecordDepositRequest>,
) -> Result<Json<ApiResponse<DepositResponse>>, AppError> {
    let amount: Amount = req.amount.parse()?;

    let deposit = state
        .deposits
        .record_deposit(ObservedDeposit {
            user_id: req.user_id,
            asset_symbol: req.asset_symbol,
            amount,
            onchain_tx_id: req.onchain_tx_id,
            from_address: req.from_address,
            confirmations: req.confirmations,
        })
        .await?;

    success_response(DepositResponse::from(deposit))
}

/// POST /v1/admin/deposits/:id/confirm
#[utoipa::path(
    post,
    path = "/v1/admin/deposits/{id}/confirm",
    params(("id" = String, Path, description = "Deposit id")),
    request_body = ConfirmDepositRequest,
    responses((status = 200, description = "Deposit confirmed and credited", body = DepositResponse)),
    security(("bearer_auth" = []))
)]
pub async fn confirm_deposit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ConfirmDepositRequest>,
) -> Result<Json<ApiResponse<DepositResponse>>, AppError> {
    let deposit = state
        .deposits
        .confirm_deposit(parse_id(&id)?, req.confirmations)
        .await?;
    success_response(DepositResponse::from(deposit))
}

/// POST /v1/admin/deposit-addresses
#[utoipa::path(
    post,
    path = "/v1/admin/deposit-addresses",
    request_body = AssignDepositAddressRequest,
    responses(
        (status = 200, description = "Address assigned to the account", body = DepositAddressResponse),
        (status = 409, description = "Account already has an address, or the address is taken")
    ),
    security(("bearer_auth" = []))
)]
pub async fn assign_deposit_address(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AssignDepositAddressRequest>,
) -> Result<Json<ApiResponse<DepositAddressResponse>>, AppError> {
    let addr = state
        .deposits
        .assign_deposit_address(
            &req.user_id,
            &req.asset_symbol,
            &req.address,
            &req.derivation_path,
            req.memo_tag,
        )
        .await?;
    success_response(DepositAddressResponse::from(addr))
}
