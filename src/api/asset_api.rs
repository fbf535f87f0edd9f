//! 资产 / 网络查询 API

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    domain::{Asset, AssetNetwork, Network},
    error::AppError,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct AssetNetworkResponse {
    pub network_id: String,
    pub contract_address: Option<String>,
    pub min_withdrawal: String,
    pub withdrawal_fee: String,
    pub is_active: bool,
}

impl From<AssetNetwork> for AssetNetworkResponse {
    fn from(link: AssetNetwork) -> Self {
        Self {
            network_id: link.network_id.to_string(),
            contract_address: link.contract_address,
            min_withdrawal: link.min_withdrawal.to_string(),
            withdrawal_fee: link.withdrawal_fee.to_string(),
            is_active: link.is_active,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssetResponse {
    pub id: String,
    pub symbol: String,
    pub name: String,
    /// CRYPTO | FIAT
    pub asset_type: String,
    pub precision: u8,
    pub is_active: bool,
    pub supported_networks: Vec<AssetNetworkResponse>,
}

impl From<Asset> for AssetResponse {
    fn from(asset: Asset) -> Self {
        Self {
            id: asset.id.to_string(),
            symbol: asset.symbol,
            name: asset.name,
            asset_type: asset.asset_type.to_string(),
            precision: asset.precision,
            is_active: asset.is_active,
            supported_networks: asset
                .supported_networks
                .into_iter()
                .map(AssetNetworkResponse::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NetworkResponse {
    pub id: String,
    pub name: String,
    /// EVM 链 ID，非 EVM 网络为 null
    pub chain_id: Option<i64>,
    pub rpc_url: String,
    pub is_active: bool,
}

impl From<Network> for NetworkResponse {
    fn from(n: Network) -> Self {
        Self {
            id: n.id.to_string(),
            name: n.name,
            chain_id: n.chain_id,
            rpc_url: n.rpc_url,
            is_active: n.is_active,
        }
    }
}

/// GET /v1/assets
#[utoipa::path(
    get,
    path = "/v1/assets",
    responses((status = 200, description = "All assets with their networks", body = [AssetResponse])),
    security(("bearer_auth" = []))
)]
pub async fn list_assets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<AssetResponse>>>, AppError> {
    let assets = state.registry.list_assets().await?;
    success_response(assets.into_iter().map(AssetResponse::from).collect())
}

/// GET /v1/networks
#[utoipa::path(
    get,
    path = "/v1/networks",
    responses((status = 200, description = "All networks", body = [NetworkResponse])),
    security(("bearer_auth" = []))
)]
pub async fn list_networks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<NetworkResponse>>>, AppError> {
    let networks = state.registry.list_networks().await?;
    success_response(networks.into_iter().map(NetworkResponse::from).collect())
}
