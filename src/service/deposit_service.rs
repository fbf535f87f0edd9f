//! 充值入账

use std::time::Duration;

use uuid::Uuid;

use crate::{
    domain::{normalize_symbol, Amount, Deposit, DepositAddress, WalletError, WalletResult},
    infrastructure::deadline::run_mutation,
    repository::Repositories,
};

/// 链上观察到的入账
#[derive(Debug, Clone)]
pub struct ObservedDeposit {
    pub user_id: String,
    pub asset_symbol: String,
    pub amount: Amount,
    pub onchain_tx_id: String,
    pub from_address: String,
    pub confirmations: i32,
}

#[derive(Clone)]
pub struct DepositService {
    repos: Repositories,
    timeout: Duration,
}

impl DepositService {
    pub fn new(repos: Repositories, timeout: Duration) -> Self {
        Self { repos, timeout }
    }

    /// 记录未确认充值；账户不存在时创建
    pub async fn record_deposit(&self, observed: ObservedDeposit) -> WalletResult<Deposit> {
        if observed.user_id.trim().is_empty() {
            return Err(WalletError::UserIdRequired);
        }

        let asset = self
            .repos
            .assets
            .find_asset_by_symbol(&normalize_symbol(&observed.asset_symbol))
            .await?;
        if !asset.is_active {
            return Err(WalletError::AssetInactive);
        }

        let account = self
            .repos
            .accounts
            .find_or_create(&observed.user_id, asset.id)
            .await?;
        let deposit = Deposit::new(
            account.id,
            asset.id,
            observed.amount,
            &observed.onchain_tx_id,
            &observed.from_address,
            observed.confirmations,
        )?;

        self.repos.deposits.record(&deposit).await?;
        Ok(deposit)
    }

    /// 确认并入账；重复确认不会重复入账
    pub async fn confirm_deposit(
        &self,
        deposit_id: Uuid,
        confirmations: i32,
    ) -> WalletResult<Deposit> {
        tracing::info!(deposit_id = %deposit_id, confirmations, "confirming deposit");

        let deposits = self.repos.deposits.clone();
        run_mutation(self.timeout, "confirm_deposit", async move {
            deposits.confirm(deposit_id, confirmations).await
        })
        .await
    }

    pub async fn get(&self, deposit_id: Uuid) -> WalletResult<Deposit> {
        self.repos.deposits.find_by_id(deposit_id).await
    }

    /// 为用户在该资产上的账户登记充值地址；账户不存在时创建
    pub async fn assign_deposit_address(
        &self,
        user_id: &str,
        asset_symbol: &str,
        address: &str,
        derivation_path: &str,
        memo_tag: Option<String>,
    ) -> WalletResult<DepositAddress> {
        tracing::info!(user_id, asset_symbol, "assigning deposit address");
        if user_id.trim().is_empty() {
            return Err(WalletError::UserIdRequired);
        }

        let asset = self
            .repos
            .assets
            .find_asset_by_symbol(&normalize_symbol(asset_symbol))
            .await?;
        let account = self.repos.accounts.find_or_create(user_id, asset.id).await?;

        let mut deposit_address =
            DepositAddress::new(account.id, address, derivation_path, memo_tag)?;
        self.repos.deposit_addresses.save(&mut deposit_address).await?;
        Ok(deposit_address)
    }

    pub async fn get_deposit_address(
        &self,
        user_id: &str,
        asset_symbol: &str,
    ) -> WalletResult<DepositAddress> {
        let asset = self
            .repos
            .assets
            .find_asset_by_symbol(&normalize_symbol(asset_symbol))
            .await?;
        let account = self.repos.accounts.find_account(user_id, asset.id).await?;
        self.repos.deposit_addresses.find_by_account_id(account.id).await
    }
}
