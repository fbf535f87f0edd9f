//! PostgreSQL 集成测试
//!
//! 需要可用的数据库：
//! ```bash
//! TEST_DATABASE_URL=postgres://postgres@localhost:5432/krypton_wallet_test \
//!     cargo test --test pg_integration -- --ignored
//! ```

mod common;

use std::sync::Arc;

use common::*;
use krypton_wallet::{
    app_state::AppState,
    domain::{Account, Amount, AssetType, DepositAddress, LedgerOp, WalletError, WithdrawalStatus},
    repository::Repositories,
    service::{NetworkLinkSpec, NewAsset, ObservedDeposit},
};
use sqlx::PgPool;

fn test_database_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost:5432/krypton_wallet_test".into())
}

/// 每个测试使用独立 schema，互不干扰
async fn pg_pool() -> PgPool {
    let admin = PgPool::connect(&test_database_url())
        .await
        .expect("Failed to connect test database");
    let schema = format!("t_{}", uuid::Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin)
        .await
        .expect("create schema");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .after_connect({
            let schema = schema.clone();
            move |conn, _meta| {
                let schema = schema.clone();
                Box::pin(async move {
                    sqlx::query(&format!("SET search_path TO {schema}, public"))
                        .execute(conn)
                        .await?;
                    Ok(())
                })
            }
        })
        .connect(&test_database_url())
        .await
        .expect("Failed to create test pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    pool
}

async fn pg_state() -> Arc<AppState> {
    Arc::new(AppState::with_postgres(Arc::new(test_config()), pg_pool().await))
}

#[tokio::test]
#[ignore]
async fn test_pg_withdrawal_lifecycle() {
    let state = pg_state().await;
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 1000).await;

    let w = request_withdrawal(&state, "alice", "ETH", 300).await;
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(700), Amount::from_u64(300))
    );

    state.withdrawals.approve(w.id, "ops-1").await.unwrap();
    let w = state.withdrawals.fail(w.id, "rejected").await.unwrap();
    assert_eq!(w.status, WithdrawalStatus::Failed);
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(1000), Amount::ZERO)
    );

    let stored = state.withdrawals.find(w.id).await.unwrap();
    assert_eq!(stored.failure_reason.as_deref(), Some("rejected"));
}

#[tokio::test]
#[ignore]
async fn test_pg_concurrent_locks_never_overdraw() {
    let state = pg_state().await;
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 100).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let state = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            state
                .wallet
                .request_withdrawal(withdrawal_request("alice", "ETH", 30))
                .await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => assert_eq!(e, WalletError::InsufficientBalance),
        }
    }

    assert_eq!(ok, 3);
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(10), Amount::from_u64(90))
    );
}

#[tokio::test]
#[ignore]
async fn test_pg_duplicates_map_to_conflicts() {
    let state = pg_state().await;
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 100).await;

    let err = state
        .registry
        .create_network("ethereum", "https://rpc.example.org", Some(1))
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::DuplicateNetwork);

    state
        .transfers
        .transfer("alice", "bob", "ETH", Amount::from_u64(10), Some("ref-1".into()))
        .await
        .unwrap();
    let err = state
        .transfers
        .transfer("alice", "bob", "ETH", Amount::from_u64(10), Some("ref-1".into()))
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::DuplicateTransfer);
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(90), Amount::ZERO)
    );
}

#[tokio::test]
#[ignore]
async fn test_pg_default_policy_follows_link_order() {
    let state = pg_state().await;
    for name in ["tron", "ethereum", "bsc"] {
        state
            .registry
            .create_network(name, "https://rpc.example.org", None)
            .await
            .unwrap();
    }

    // 同一事务内写入的链接，默认策略必须是第一个写入的
    let orders = [
        ["tron", "ethereum", "bsc"],
        ["ethereum", "bsc", "tron"],
        ["bsc", "tron", "ethereum"],
        ["tron", "bsc", "ethereum"],
        ["bsc", "ethereum", "tron"],
    ];
    for (i, order) in orders.iter().enumerate() {
        let symbol = format!("TK{i}");
        let networks = order
            .iter()
            .enumerate()
            .map(|(pos, name)| NetworkLinkSpec {
                network: name.to_string(),
                contract_address: None,
                min_withdrawal: Amount::from_u64(if pos == 0 { 100 } else { 1 }),
                withdrawal_fee: Amount::ZERO,
            })
            .collect();
        state
            .registry
            .create_asset(NewAsset {
                symbol: symbol.clone(),
                name: format!("Token {i}"),
                asset_type: AssetType::Crypto,
                precision: 6,
                networks,
            })
            .await
            .unwrap();

        let asset = state.registry.get_asset(&symbol).await.unwrap();
        let mut stored_order = Vec::new();
        for link in &asset.supported_networks {
            let network = state
                .registry
                .list_networks()
                .await
                .unwrap()
                .into_iter()
                .find(|n| n.id == link.network_id)
                .unwrap();
            stored_order.push(network.name);
        }
        assert_eq!(stored_order, order.to_vec());

        fund(&state, "alice", &symbol, 1000).await;
        let err = state
            .wallet
            .request_withdrawal(withdrawal_request("alice", &symbol, 50))
            .await
            .unwrap_err();
        assert_eq!(err, WalletError::WithdrawalAmountTooLow);
    }
}

#[tokio::test]
#[ignore]
async fn test_pg_account_save_and_apply() {
    let pool = pg_pool().await;
    let state = AppState::with_postgres(Arc::new(test_config()), pool.clone());
    let asset = seed_eth(&state).await;
    let repos = Repositories::postgres(pool);

    let mut account = Account::new("dave", asset.id).unwrap();
    repos.accounts.save(&mut account).await.unwrap();
    assert!(!account.id.is_nil());
    assert_eq!(repos.accounts.find_by_id(account.id).await.unwrap().user_id, "dave");

    let mut duplicate = Account::new("dave", asset.id).unwrap();
    assert!(matches!(
        repos.accounts.save(&mut duplicate).await.unwrap_err(),
        WalletError::Internal(_)
    ));
    let mut orphan = Account::new("dave", uuid::Uuid::new_v4()).unwrap();
    assert_eq!(
        repos.accounts.save(&mut orphan).await.unwrap_err(),
        WalletError::AssetNotFound
    );

    let after = repos
        .accounts
        .apply(account.id, LedgerOp::Deposit(Amount::from_u64(100)))
        .await
        .unwrap();
    assert_eq!(after.balance(), Amount::from_u64(100));

    let err = repos
        .accounts
        .apply(account.id, LedgerOp::Settle(Amount::from_u64(1)))
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::InsufficientLockedBalance);
    let stored = repos.accounts.find_by_id(account.id).await.unwrap();
    assert_eq!(stored.balance(), Amount::from_u64(100));
    assert!(stored.locked_balance().is_zero());
}

#[tokio::test]
#[ignore]
async fn test_pg_concurrent_apply_lock_never_overdraws() {
    let pool = pg_pool().await;
    let state = AppState::with_postgres(Arc::new(test_config()), pool.clone());
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 100).await;
    let repos = Repositories::postgres(pool);
    let account_id = state
        .wallet
        .get_account_by_asset("alice", "ETH")
        .await
        .unwrap()
        .account
        .id;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let accounts = repos.accounts.clone();
        handles.push(tokio::spawn(async move {
            accounts
                .apply(account_id, LedgerOp::Lock(Amount::from_u64(60)))
                .await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => assert_eq!(e, WalletError::InsufficientBalance),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(40), Amount::from_u64(60))
    );
}

#[tokio::test]
#[ignore]
async fn test_pg_balances_beyond_128_bits() {
    let state = pg_state().await;
    seed_eth(&state).await;

    let huge: Amount = "1000000000000000000000000000000000000000".parse().unwrap();
    let deposit = state
        .deposits
        .record_deposit(ObservedDeposit {
            user_id: "whale".into(),
            asset_symbol: "ETH".into(),
            amount: huge.clone(),
            onchain_tx_id: "0xwhale".into(),
            from_address: "0xexternal".into(),
            confirmations: 0,
        })
        .await
        .unwrap();
    state.deposits.confirm_deposit(deposit.id, 12).await.unwrap();

    let w = request_withdrawal(&state, "whale", "ETH", 20).await;
    state.withdrawals.fail(w.id, "rejected").await.unwrap();

    assert_eq!(balances(&state, "whale", "ETH").await, (huge, Amount::ZERO));
}

#[tokio::test]
#[ignore]
async fn test_pg_deposit_address_per_account() {
    let pool = pg_pool().await;
    let state = AppState::with_postgres(Arc::new(test_config()), pool.clone());
    seed_eth(&state).await;

    let addr = state
        .deposits
        .assign_deposit_address("alice", "ETH", "0xa11ce", "m/44'/60'/0'/0/1", None)
        .await
        .unwrap();
    assert_eq!(
        state.deposits.get_deposit_address("alice", "eth").await.unwrap(),
        addr
    );

    let err = state
        .deposits
        .assign_deposit_address("alice", "ETH", "0xother", "m/44'/60'/0'/0/2", None)
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::DuplicateDepositAddress);

    let repos = Repositories::postgres(pool);
    let mut orphan = DepositAddress::new(uuid::Uuid::new_v4(), "0xnobody", "", None).unwrap();
    assert_eq!(
        repos.deposit_addresses.save(&mut orphan).await.unwrap_err(),
        WalletError::AccountNotFound
    );
}
