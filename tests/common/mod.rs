//! 测试辅助模块
//! 内存存储的应用状态与常用夹具

#![allow(dead_code)]

use std::sync::Arc;

use krypton_wallet::{
    app_state::AppState,
    config::Config,
    domain::{Amount, Asset, AssetType, Withdrawal},
    service::{NetworkLinkSpec, NewAsset, ObservedDeposit, WithdrawalRequest},
};

pub const TEST_JWT_SECRET: &str = "test-secret-for-integration-tests-0123456789";

pub fn test_config() -> Config {
    let mut config = Config::from_env().expect("default config");
    config.jwt.secret = TEST_JWT_SECRET.to_string();
    config
}

/// 内存存储的应用状态
pub fn memory_state() -> Arc<AppState> {
    Arc::new(AppState::in_memory(Arc::new(test_config())))
}

/// 注册 ethereum 网络与 ETH 资产（最小提现 10，手续费 1）
pub async fn seed_eth(state: &AppState) -> Asset {
    state
        .registry
        .create_network("ethereum", "https://rpc.example.org", Some(1))
        .await
        .expect("create network");

    state
        .registry
        .create_asset(NewAsset {
            symbol: "eth".to_string(),
            name: "Ether".to_string(),
            asset_type: AssetType::Crypto,
            precision: 18,
            networks: vec![NetworkLinkSpec {
                network: "ethereum".to_string(),
                contract_address: None,
                min_withdrawal: Amount::from_u64(10),
                withdrawal_fee: Amount::from_u64(1),
            }],
        })
        .await
        .expect("create asset")
}

/// 通过充值 + 确认给用户入账
pub async fn fund(state: &AppState, user_id: &str, symbol: &str, amount: u64) {
    let deposit = state
        .deposits
        .record_deposit(ObservedDeposit {
            user_id: user_id.to_string(),
            asset_symbol: symbol.to_string(),
            amount: Amount::from_u64(amount),
            onchain_tx_id: format!("0x{}", uuid::Uuid::new_v4().simple()),
            from_address: "0xexternal".to_string(),
            confirmations: 0,
        })
        .await
        .expect("record deposit");

    state
        .deposits
        .confirm_deposit(deposit.id, 12)
        .await
        .expect("confirm deposit");
}

pub fn withdrawal_request(user_id: &str, symbol: &str, amount: u64) -> WithdrawalRequest {
    WithdrawalRequest {
        user_id: user_id.to_string(),
        asset_symbol: symbol.to_string(),
        amount: Amount::from_u64(amount),
        to_address: "0xdestination".to_string(),
        network: None,
        priority: 0,
    }
}

pub async fn request_withdrawal(
    state: &AppState,
    user_id: &str,
    symbol: &str,
    amount: u64,
) -> Withdrawal {
    state
        .wallet
        .request_withdrawal(withdrawal_request(user_id, symbol, amount))
        .await
        .expect("request withdrawal")
}

/// (available, locked)
pub async fn balances(state: &AppState, user_id: &str, symbol: &str) -> (Amount, Amount) {
    let view = state
        .wallet
        .get_account_by_asset(user_id, symbol)
        .await
        .expect("account");
    (view.account.balance(), view.account.locked_balance())
}
