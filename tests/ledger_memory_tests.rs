//! 账本端到端测试（内存存储）
//!
//! 覆盖提现生命周期、并发锁定、内部转账与充值确认

mod common;

use std::sync::Arc;

use common::*;
use krypton_wallet::{
    domain::{Amount, AssetType, WalletError, WithdrawalStatus},
    service::{NetworkLinkSpec, NewAsset, ObservedDeposit},
};

#[tokio::test]
async fn test_withdrawal_fail_restores_balance() {
    let state = memory_state();
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 1000).await;

    let w = request_withdrawal(&state, "alice", "ETH", 300).await;
    assert_eq!(w.status, WithdrawalStatus::Requested);
    assert_eq!(w.network_fee, Amount::from_u64(1));
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(700), Amount::from_u64(300))
    );

    let w = state.withdrawals.approve(w.id, "ops-1").await.unwrap();
    assert_eq!(w.approved_by.as_deref(), Some("ops-1"));

    let w = state.withdrawals.fail(w.id, "node rejected").await.unwrap();
    assert_eq!(w.status, WithdrawalStatus::Failed);
    assert_eq!(w.failure_reason.as_deref(), Some("node rejected"));
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(1000), Amount::ZERO)
    );
}

#[tokio::test]
async fn test_withdrawal_confirm_settles_locked_funds() {
    let state = memory_state();
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 1000).await;

    let w = request_withdrawal(&state, "alice", "ETH", 400).await;
    state.withdrawals.approve(w.id, "ops-1").await.unwrap();
    state.withdrawals.start_processing(w.id).await.unwrap();
    state
        .withdrawals
        .mark_broadcasted(w.id, "0xbroadcast")
        .await
        .unwrap();
    let w = state.withdrawals.confirm(w.id).await.unwrap();

    assert_eq!(w.status, WithdrawalStatus::Confirmed);
    assert_eq!(w.onchain_tx_id.as_deref(), Some("0xbroadcast"));
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(600), Amount::ZERO)
    );

    // 重复确认不会再次结算
    let again = state.withdrawals.confirm(w.id).await.unwrap();
    assert_eq!(again.status, WithdrawalStatus::Confirmed);
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(600), Amount::ZERO)
    );
}

#[tokio::test]
async fn test_illegal_transitions_leave_balances_untouched() {
    let state = memory_state();
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 100).await;

    let w = request_withdrawal(&state, "alice", "ETH", 50).await;

    // Requested 不能直接确认
    let err = state.withdrawals.confirm(w.id).await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidTransition { .. }));

    state.withdrawals.fail(w.id, "rejected").await.unwrap();

    // 终态不可再审批
    let err = state.withdrawals.approve(w.id, "ops-1").await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidTransition { .. }));

    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(100), Amount::ZERO)
    );
}

#[tokio::test]
async fn test_broadcast_replay_with_different_tx_id_is_rejected() {
    let state = memory_state();
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 100).await;

    let w = request_withdrawal(&state, "alice", "ETH", 50).await;
    state.withdrawals.approve(w.id, "ops-1").await.unwrap();
    state.withdrawals.start_processing(w.id).await.unwrap();
    state.withdrawals.mark_broadcasted(w.id, "0xaaa").await.unwrap();

    // 相同 tx id 重放视为成功
    state.withdrawals.mark_broadcasted(w.id, "0xaaa").await.unwrap();

    let err = state
        .withdrawals
        .mark_broadcasted(w.id, "0xbbb")
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::TxIdMismatch);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_locks_never_overdraw() {
    let state = memory_state();
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 100).await;

    let a = {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state
                .wallet
                .request_withdrawal(withdrawal_request("alice", "ETH", 60))
                .await
        })
    };
    let b = {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state
                .wallet
                .request_withdrawal(withdrawal_request("alice", "ETH", 60))
                .await
        })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| matches!(r, Err(WalletError::InsufficientBalance)))
        .count();

    assert_eq!(ok, 1);
    assert_eq!(insufficient, 1);
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(40), Amount::from_u64(60))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_access_creates_single_account() {
    let state = memory_state();
    seed_eth(&state).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let state = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            state
                .deposits
                .record_deposit(ObservedDeposit {
                    user_id: "bob".to_string(),
                    asset_symbol: "ETH".to_string(),
                    amount: Amount::from_u64(5),
                    onchain_tx_id: format!("0xtx{i}"),
                    from_address: "0xexternal".to_string(),
                    confirmations: 0,
                })
                .await
        }));
    }

    let mut account_ids = Vec::new();
    for handle in handles {
        account_ids.push(handle.await.unwrap().unwrap().account_id);
    }
    account_ids.dedup();
    assert_eq!(account_ids.len(), 1);

    let accounts = state.wallet.get_accounts("bob").await.unwrap();
    assert_eq!(accounts.len(), 1);
}

#[tokio::test]
async fn test_withdrawal_below_network_minimum() {
    let state = memory_state();
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 100).await;

    let err = state
        .wallet
        .request_withdrawal(withdrawal_request("alice", "ETH", 5))
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::WithdrawalAmountTooLow);
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(100), Amount::ZERO)
    );
}

#[tokio::test]
async fn test_withdrawal_on_unlinked_network() {
    let state = memory_state();
    seed_eth(&state).await;
    state
        .registry
        .create_network("tron", "https://tron.example.org", None)
        .await
        .unwrap();
    fund(&state, "alice", "ETH", 100).await;

    let mut req = withdrawal_request("alice", "ETH", 50);
    req.network = Some("tron".to_string());
    let err = state.wallet.request_withdrawal(req).await.unwrap_err();
    assert_eq!(err, WalletError::AssetNotSupportedOnNetwork);

    let mut req = withdrawal_request("alice", "ETH", 50);
    req.network = Some("solana".to_string());
    let err = state.wallet.request_withdrawal(req).await.unwrap_err();
    assert_eq!(err, WalletError::NetworkNotFound);
}

#[tokio::test]
async fn test_fiat_withdrawal_not_implemented() {
    let state = memory_state();
    state
        .registry
        .create_asset(NewAsset {
            symbol: "usd".to_string(),
            name: "US Dollar".to_string(),
            asset_type: AssetType::Fiat,
            precision: 2,
            networks: vec![],
        })
        .await
        .unwrap();
    fund(&state, "alice", "USD", 1000).await;

    let err = state
        .wallet
        .request_withdrawal(withdrawal_request("alice", "USD", 100))
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::NotImplemented("fiat withdrawal"));
}

#[tokio::test]
async fn test_insufficient_balance_on_fresh_account() {
    let state = memory_state();
    seed_eth(&state).await;

    let err = state
        .wallet
        .request_withdrawal(withdrawal_request("carol", "ETH", 50))
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::InsufficientBalance);

    // 首次访问已创建零余额账户
    assert_eq!(
        balances(&state, "carol", "ETH").await,
        (Amount::ZERO, Amount::ZERO)
    );
}

#[tokio::test]
async fn test_cancel_rules() {
    let state = memory_state();
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 500).await;

    // 非所有者看不到，也取消不了
    let w = request_withdrawal(&state, "alice", "ETH", 100).await;
    let err = state.withdrawals.cancel("mallory", w.id).await.unwrap_err();
    assert_eq!(err, WalletError::WithdrawalNotFound);

    // 审批后仍可取消
    state.withdrawals.approve(w.id, "ops-1").await.unwrap();
    let cancelled = state.withdrawals.cancel("alice", w.id).await.unwrap();
    assert_eq!(cancelled.status, WithdrawalStatus::Failed);
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(500), Amount::ZERO)
    );

    // 处理中不可取消
    let w = request_withdrawal(&state, "alice", "ETH", 100).await;
    state.withdrawals.approve(w.id, "ops-1").await.unwrap();
    state.withdrawals.start_processing(w.id).await.unwrap();
    let err = state.withdrawals.cancel("alice", w.id).await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidTransition { .. }));
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(400), Amount::from_u64(100))
    );
}

#[tokio::test]
async fn test_withdrawal_queue_ordering() {
    let state = memory_state();
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 1000).await;

    let low = request_withdrawal(&state, "alice", "ETH", 10).await;
    let mut req = withdrawal_request("alice", "ETH", 20);
    req.priority = 5;
    let high = state.wallet.request_withdrawal(req).await.unwrap();

    let queue = state
        .withdrawals
        .list_by_status(WithdrawalStatus::Requested)
        .await
        .unwrap();
    let ids: Vec<_> = queue.iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![high.id, low.id]);

    let mine = state.withdrawals.list_for_user("alice").await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(state.withdrawals.list_for_user("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_internal_transfer_moves_available_balance() {
    let state = memory_state();
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 100).await;

    let t = state
        .transfers
        .transfer("alice", "bob", "eth", Amount::from_u64(30), Some("ref-1".into()))
        .await
        .unwrap();
    assert_eq!(t.amount, Amount::from_u64(30));
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(70), Amount::ZERO)
    );
    assert_eq!(
        balances(&state, "bob", "ETH").await,
        (Amount::from_u64(30), Amount::ZERO)
    );

    // 重复引用被拒绝，余额不变
    let err = state
        .transfers
        .transfer("alice", "bob", "ETH", Amount::from_u64(30), Some("ref-1".into()))
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::DuplicateTransfer);
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(70), Amount::ZERO)
    );
}

#[tokio::test]
async fn test_transfer_rejections() {
    let state = memory_state();
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 100).await;

    let err = state
        .transfers
        .transfer("alice", "alice", "ETH", Amount::from_u64(1), None)
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::CannotTransferToSameAccount);

    // 自转账优先于金额校验
    let err = state
        .transfers
        .transfer("alice", " alice ", "ETH", Amount::ZERO, None)
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::CannotTransferToSameAccount);

    let err = state
        .transfers
        .transfer("alice", "bob", "ETH", Amount::ZERO, None)
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::InvalidAmount);

    let err = state
        .transfers
        .transfer("alice", "bob", "ETH", Amount::from_u64(101), None)
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::InsufficientBalance);

    let err = state
        .transfers
        .transfer("nobody", "bob", "ETH", Amount::from_u64(1), None)
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::AccountNotFound);

    // 锁定资金不可转出
    request_withdrawal(&state, "alice", "ETH", 80).await;
    let err = state
        .transfers
        .transfer("alice", "bob", "ETH", Amount::from_u64(30), None)
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::InsufficientBalance);
}

#[tokio::test]
async fn test_deposit_confirmation_is_idempotent() {
    let state = memory_state();
    seed_eth(&state).await;

    let deposit = state
        .deposits
        .record_deposit(ObservedDeposit {
            user_id: "alice".to_string(),
            asset_symbol: "ETH".to_string(),
            amount: Amount::from_u64(250),
            onchain_tx_id: "0xdep".to_string(),
            from_address: "0xexternal".to_string(),
            confirmations: 1,
        })
        .await
        .unwrap();

    // 未确认前不计入余额
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::ZERO, Amount::ZERO)
    );

    state.deposits.confirm_deposit(deposit.id, 6).await.unwrap();
    let again = state.deposits.confirm_deposit(deposit.id, 12).await.unwrap();
    assert_eq!(again.confirmations, 12);
    assert_eq!(
        balances(&state, "alice", "ETH").await,
        (Amount::from_u64(250), Amount::ZERO)
    );

    // 同一链上交易不能重复登记
    let err = state
        .deposits
        .record_deposit(ObservedDeposit {
            user_id: "alice".to_string(),
            asset_symbol: "ETH".to_string(),
            amount: Amount::from_u64(250),
            onchain_tx_id: "0xdep".to_string(),
            from_address: "0xexternal".to_string(),
            confirmations: 1,
        })
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::DuplicateDeposit);
}

#[tokio::test]
async fn test_registry_rejects_duplicates_and_unknown_networks() {
    let state = memory_state();
    seed_eth(&state).await;

    let err = state
        .registry
        .create_network("ethereum", "https://other.example.org", Some(1))
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::DuplicateNetwork);

    let err = state
        .registry
        .create_asset(NewAsset {
            symbol: "ETH".to_string(),
            name: "Ether again".to_string(),
            asset_type: AssetType::Crypto,
            precision: 18,
            networks: vec![],
        })
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::DuplicateAsset);

    let err = state
        .registry
        .create_asset(NewAsset {
            symbol: "USDT".to_string(),
            name: "Tether".to_string(),
            asset_type: AssetType::Crypto,
            precision: 6,
            networks: vec![NetworkLinkSpec {
                network: "missing".to_string(),
                contract_address: Some("0xdac17f".to_string()),
                min_withdrawal: Amount::ZERO,
                withdrawal_fee: Amount::ZERO,
            }],
        })
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::NetworkNotFound);
    // 失败的创建不留下半成品
    assert_eq!(
        state.registry.get_asset("USDT").await.unwrap_err(),
        WalletError::AssetNotFound
    );

    let err = state
        .registry
        .add_asset_to_network(
            "ETH",
            NetworkLinkSpec {
                network: "ethereum".to_string(),
                contract_address: None,
                min_withdrawal: Amount::ZERO,
                withdrawal_fee: Amount::ZERO,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::DuplicateAssetNetwork);
}

#[tokio::test]
async fn test_balances_conserved_across_mixed_operations() {
    let state = memory_state();
    seed_eth(&state).await;
    fund(&state, "alice", "ETH", 1000).await;
    fund(&state, "bob", "ETH", 500).await;

    let w1 = request_withdrawal(&state, "alice", "ETH", 200).await;
    let w2 = request_withdrawal(&state, "bob", "ETH", 100).await;
    state
        .transfers
        .transfer("alice", "bob", "ETH", Amount::from_u64(300), None)
        .await
        .unwrap();
    state.withdrawals.fail(w2.id, "rejected").await.unwrap();
    state.withdrawals.approve(w1.id, "ops-1").await.unwrap();
    state.withdrawals.start_processing(w1.id).await.unwrap();
    state.withdrawals.mark_broadcasted(w1.id, "0x1").await.unwrap();
    state.withdrawals.confirm(w1.id).await.unwrap();

    let (a_avail, a_locked) = balances(&state, "alice", "ETH").await;
    let (b_avail, b_locked) = balances(&state, "bob", "ETH").await;
    assert_eq!((a_avail.clone(), a_locked), (Amount::from_u64(500), Amount::ZERO));
    assert_eq!((b_avail.clone(), b_locked), (Amount::from_u64(800), Amount::ZERO));

    // 1500 入账 - 200 已结算
    let total = &a_avail + &b_avail;
    assert_eq!(total, Amount::from_u64(1300));
}

#[tokio::test]
async fn test_balances_beyond_128_bits() {
    let state = memory_state();
    seed_eth(&state).await;

    // 1e12 枚 18 位精度代币，超过 u128 上限
    let supply: Amount = "1000000000000000000000000000000000000000".parse().unwrap();
    let deposit = state
        .deposits
        .record_deposit(ObservedDeposit {
            user_id: "whale".into(),
            asset_symbol: "ETH".into(),
            amount: supply.clone(),
            onchain_tx_id: "0xwhale".into(),
            from_address: "0xexternal".into(),
            confirmations: 0,
        })
        .await
        .unwrap();
    state.deposits.confirm_deposit(deposit.id, 12).await.unwrap();
    state.deposits.confirm_deposit(deposit.id, 12).await.unwrap();
    assert_eq!(balances(&state, "whale", "ETH").await, (supply.clone(), Amount::ZERO));

    let half: Amount = "500000000000000000000000000000000000000".parse().unwrap();
    state
        .transfers
        .transfer("whale", "bob", "ETH", half.clone(), None)
        .await
        .unwrap();

    let mut req = withdrawal_request("whale", "ETH", 0);
    req.amount = "499999999999999999999999999999999999999".parse().unwrap();
    let w = state.wallet.request_withdrawal(req).await.unwrap();
    state.withdrawals.approve(w.id, "ops-1").await.unwrap();
    state.withdrawals.start_processing(w.id).await.unwrap();
    state
        .withdrawals
        .mark_broadcasted(w.id, "0xbig")
        .await
        .unwrap();
    state.withdrawals.confirm(w.id).await.unwrap();

    assert_eq!(
        balances(&state, "whale", "ETH").await,
        (Amount::from_u64(1), Amount::ZERO)
    );
    let (bob, _) = balances(&state, "bob", "ETH").await;
    assert_eq!(&(&bob + &w.amount) + &Amount::from_u64(1), supply);
}

#[tokio::test]
async fn test_deposit_address_assignment() {
    let state = memory_state();
    seed_eth(&state).await;

    let err = state
        .deposits
        .get_deposit_address("alice", "ETH")
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::AccountNotFound);

    let addr = state
        .deposits
        .assign_deposit_address("alice", "eth", "0xa11ce", "m/44'/60'/0'/0/1", None)
        .await
        .unwrap();
    assert!(!addr.id.is_nil());
    assert_eq!(state.deposits.get_deposit_address("alice", "ETH").await.unwrap(), addr);

    // 账户已存在、尚未登记地址
    fund(&state, "bob", "ETH", 5).await;
    assert_eq!(
        state.deposits.get_deposit_address("bob", "ETH").await.unwrap_err(),
        WalletError::DepositAddressNotFound
    );

    // 同一地址不可分给两个账户
    let err = state
        .deposits
        .assign_deposit_address("bob", "ETH", "0xa11ce", "m/44'/60'/0'/0/2", None)
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::DuplicateDepositAddress);

    let err = state
        .deposits
        .assign_deposit_address("bob", "ETH", "  ", "", None)
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::AddressRequired);
}
