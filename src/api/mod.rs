//! HTTP 接口层
//!
//! - 公开：/healthz、/docs、/openapi.json
//! - 用户（JWT）：/v1/accounts、/v1/withdrawals、/v1/transfers、/v1/assets、/v1/networks
//! - 管理（JWT + admin 角色）：/v1/admin/*

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{app_state::AppState, infrastructure::db};

pub mod account_api;
pub mod admin_api;
pub mod asset_api;
pub mod middleware;
pub mod response;
pub mod transfer_api;
pub mod withdrawal_api;

use middleware::{
    jwt_extractor_middleware, request_timeout_middleware, require_admin_middleware,
    trace_id_middleware,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        account_api::list_accounts,
        account_api::get_account,
        account_api::get_deposit_address,
        withdrawal_api::create_withdrawal,
        withdrawal_api::list_withdrawals,
        withdrawal_api::get_withdrawal,
        withdrawal_api::cancel_withdrawal,
        transfer_api::create_transfer,
        asset_api::list_assets,
        asset_api::list_networks,
        admin_api::create_asset,
        admin_api::create_network,
        admin_api::add_asset_network,
        admin_api::list_withdrawal_queue,
        admin_api::approve_withdrawal,
        admin_api::process_withdrawal,
        admin_api::broadcast_withdrawal,
        admin_api::confirm_withdrawal,
        admin_api::fail_withdrawal,
        admin_api::record_deposit,
        admin_api::confirm_deposit,
        admin_api::assign_deposit_address,
    ),
    components(schemas(
        account_api::AccountResponse,
        account_api::DepositAddressResponse,
        withdrawal_api::CreateWithdrawalRequest,
        withdrawal_api::WithdrawalResponse,
        transfer_api::CreateTransferRequest,
        transfer_api::TransferResponse,
        asset_api::AssetResponse,
        asset_api::AssetNetworkResponse,
        asset_api::NetworkResponse,
        admin_api::CreateAssetRequest,
        admin_api::NetworkLinkRequest,
        admin_api::CreateNetworkRequest,
        admin_api::BroadcastRequest,
        admin_api::FailRequest,
        admin_api::RecordDepositRequest,
        admin_api::ConfirmDepositRequest,
        admin_api::DepositResponse,
        admin_api::AssignDepositAddressRequest,
    )),
    modifiers(&BearerAuth),
    tags((name = "krypton-wallet", description = "Custodial wallet ledger API"))
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// GET /healthz
///
/// 内存存储模式下只返回 ok；Postgres 模式下额外探测连接池
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Some(pool) = &state.pool {
        if let Err(e) = db::health_check(pool).await {
            tracing::error!(error = %e, "health check failed");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable" })),
            );
        }
    }
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/accounts", get(account_api::list_accounts))
        .route("/v1/accounts/:asset_symbol", get(account_api::get_account))
        .route(
            "/v1/accounts/:asset_symbol/deposit-address",
            get(account_api::get_deposit_address),
        )
        .route(
            "/v1/withdrawals",
            get(withdrawal_api::list_withdrawals).post(withdrawal_api::create_withdrawal),
        )
        .route("/v1/withdrawals/:id", get(withdrawal_api::get_withdrawal))
        .route(
            "/v1/withdrawals/:id/cancel",
            post(withdrawal_api::cancel_withdrawal),
        )
        .route("/v1/transfers", post(transfer_api::create_transfer))
        .route("/v1/assets", get(asset_api::list_assets))
        .route("/v1/networks", get(asset_api::list_networks))
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/admin/assets", post(admin_api::create_asset))
        .route("/v1/admin/networks", post(admin_api::create_network))
        .route(
            "/v1/admin/assets/:symbol/networks",
            post(admin_api::add_asset_network),
        )
        .route("/v1/admin/withdrawals", get(admin_api::list_withdrawal_queue))
        .route(
            "/v1/admin/withdrawals/:id/approve",
            post(admin_api::approve_withdrawal),
        )
        .route(
            "/v1/admin/withdrawals/:id/process",
            post(admin_api::process_withdrawal),
        )
        .route(
            "/v1/admin/withdrawals/:id/broadcast",
            post(admin_api::broadcast_withdrawal),
        )
        .route(
            "/v1/admin/withdrawals/:id/confirm",
            post(admin_api::confirm_withdrawal),
        )
        .route(
            "/v1/admin/withdrawals/:id/fail",
            post(admin_api::fail_withdrawal),
        )
        .route("/v1/admin/deposits", post(admin_api::record_deposit))
        .route(
            "/v1/admin/deposits/:id/confirm",
            post(admin_api::confirm_deposit),
        )
        .route(
            "/v1/admin/deposit-addresses",
            post(admin_api::assign_deposit_address),
        )
        .route_layer(from_fn(require_admin_middleware))
}

pub fn routes(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/healthz", get(healthz))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()));

    // 后加的 route_layer 在外层：先认证，再做角色检查
    let protected_routes = user_routes()
        .merge(admin_routes())
        .route_layer(from_fn_with_state(state.clone(), jwt_extractor_middleware));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(trace_id_middleware))
                .layer(from_fn(request_timeout_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
