//! 内存存储
//!
//! 所有表共享一把 `tokio::sync::Mutex`，每个操作在锁内先校验再写入，
//! 与 Postgres 适配器的事务语义一致。用于测试和本地开发。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    AccountRepository, AssetRepository, DepositAddressRepository, DepositRepository,
    NetworkRepository, TransferRepository, WithdrawalRepository,
};
use crate::{
    domain::{
        Account, Asset, AssetNetwork, Deposit, DepositAddress, InternalTransfer, LedgerOp, Network,
        TransitionOutcome, UserAccount, WalletError, WalletResult, Withdrawal, WithdrawalStatus,
        WithdrawalTransition,
    },
    infrastructure::deadline::before_commit,
};

#[derive(Default)]
struct Tables {
    networks: HashMap<Uuid, Network>,
    assets: HashMap<Uuid, Asset>,
    accounts: HashMap<Uuid, Account>,
    account_index: HashMap<(String, Uuid), Uuid>,
    withdrawals: HashMap<Uuid, Withdrawal>,
    deposits: HashMap<Uuid, Deposit>,
    deposit_addresses: HashMap<Uuid, DepositAddress>,
    transfers: HashMap<Uuid, InternalTransfer>,
}

impl Tables {
    fn account(&self, id: Uuid) -> WalletResult<&Account> {
        self.accounts.get(&id).ok_or(WalletError::AccountNotFound)
    }

    fn check_link(&self, link: &AssetNetwork) -> WalletResult<()> {
        if !self.networks.contains_key(&link.network_id) {
            return Err(WalletError::NetworkNotFound);
        }
        Ok(())
    }

    fn insert_account(&mut self, mut account: Account) -> WalletResult<Account> {
        if !self.assets.contains_key(&account.asset_id) {
            return Err(WalletError::AssetNotFound);
        }
        account.id = Uuid::new_v4();
        self.account_index
            .insert((account.user_id.clone(), account.asset_id), account.id);
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 变更操作取锁；等锁受截止时间约束，拿到锁之后的写入是同步完成的
    async fn lock_for_write(&self) -> WalletResult<MutexGuard<'_, Tables>> {
        before_commit(async { Ok(self.tables.lock().await) }).await
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn save(&self, account: &mut Account) -> WalletResult<()> {
        let mut tables = self.tables.lock().await;
        let key = (account.user_id.clone(), account.asset_id);
        if tables.account_index.contains_key(&key) {
            return Err(WalletError::Internal("account already exists".into()));
        }

        let stored = tables.insert_account(account.clone())?;
        account.id = stored.id;
        Ok(())
    }

    async fn find_or_create(&self, user_id: &str, asset_id: Uuid) -> WalletResult<Account> {
        let fresh = Account::new(user_id, asset_id)?;

        let mut tables = self.tables.lock().await;
        let key = (fresh.user_id.clone(), asset_id);
        if let Some(id) = tables.account_index.get(&key).copied() {
            return tables.account(id).cloned();
        }
        tables.insert_account(fresh)
    }

    async fn find_account(&self, user_id: &str, asset_id: Uuid) -> WalletResult<Account> {
        let tables = self.tables.lock().await;
        let id = tables
            .account_index
            .get(&(user_id.to_string(), asset_id))
            .copied()
            .ok_or(WalletError::AccountNotFound)?;
        tables.account(id).cloned()
    }

    async fn find_by_id(&self, account_id: Uuid) -> WalletResult<Account> {
        self.tables.lock().await.account(account_id).cloned()
    }

    async fn find_user_accounts(&self, user_id: &str) -> WalletResult<Vec<UserAccount>> {
        let tables = self.tables.lock().await;
        let mut accounts: Vec<UserAccount> = tables
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .map(|a| {
                let asset = tables
                    .assets
                    .get(&a.asset_id)
                    .ok_or_else(|| WalletError::Internal("account references missing asset".into()))?;
                Ok(UserAccount {
                    account: a.clone(),
                    asset_symbol: asset.symbol.clone(),
                })
            })
            .collect::<WalletResult<_>>()?;

        accounts.sort_by(|a, b| a.asset_symbol.cmp(&b.asset_symbol));
        Ok(accounts)
    }

    async fn apply(&self, account_id: Uuid, op: LedgerOp) -> WalletResult<Account> {
        let mut tables = self.lock_for_write().await?;
        let account = tables
            .accounts
            .get_mut(&account_id)
            .ok_or(WalletError::AccountNotFound)?;
        account.apply(&op)?;
        Ok(account.clone())
    }
}

#[async_trait]
impl AssetRepository for MemoryStore {
    async fn save(&self, asset: &mut Asset) -> WalletResult<()> {
        let mut tables = self.lock_for_write().await?;
        if tables
            .assets
            .values()
            .any(|a| a.symbol == asset.symbol || a.name == asset.name)
        {
            return Err(WalletError::DuplicateAsset);
        }

        let mut seen = Vec::with_capacity(asset.supported_networks.len());
        for link in &asset.supported_networks {
            tables.check_link(link)?;
            if seen.contains(&link.network_id) {
                return Err(WalletError::DuplicateAssetNetwork);
            }
            seen.push(link.network_id);
        }

        let id = Uuid::new_v4();
        let mut stored = asset.clone();
        stored.id = id;
        for link in stored.supported_networks.iter_mut() {
            link.asset_id = id;
        }

        tables.assets.insert(id, stored.clone());
        *asset = stored;
        Ok(())
    }

    async fn add_asset_to_network(&self, link: &AssetNetwork) -> WalletResult<()> {
        let mut tables = self.tables.lock().await;
        tables.check_link(link)?;
        let asset = tables
            .assets
            .get_mut(&link.asset_id)
            .ok_or(WalletError::AssetNotFound)?;
        if asset
            .supported_networks
            .iter()
            .any(|n| n.network_id == link.network_id)
        {
            return Err(WalletError::DuplicateAssetNetwork);
        }

        asset.supported_networks.push(link.clone());
        Ok(())
    }

    async fn find_asset_by_symbol(&self, symbol: &str) -> WalletResult<Asset> {
        let tables = self.tables.lock().await;
        tables
            .assets
            .values()
            .find(|a| a.symbol == symbol)
            .cloned()
            .ok_or(WalletError::AssetNotFound)
    }

    async fn find_by_id(&self, asset_id: Uuid) -> WalletResult<Asset> {
        let tables = self.tables.lock().await;
        tables
            .assets
            .get(&asset_id)
            .cloned()
            .ok_or(WalletError::AssetNotFound)
    }

    async fn find_all_assets(&self) -> WalletResult<Vec<Asset>> {
        let tables = self.tables.lock().await;
        let mut assets: Vec<Asset> = tables.assets.values().cloned().collect();
        assets.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(assets)
    }
}

#[async_trait]
impl NetworkRepository for MemoryStore {
    async fn save(&self, network: &mut Network) -> WalletResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.networks.values().any(|n| n.name == network.name) {
            return Err(WalletError::DuplicateNetwork);
        }

        network.id = Uuid::new_v4();
        tables.networks.insert(network.id, network.clone());
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> WalletResult<Network> {
        let tables = self.tables.lock().await;
        tables
            .networks
            .values()
            .find(|n| n.name == name)
            .cloned()
            .ok_or(WalletError::NetworkNotFound)
    }

    async fn find_by_id(&self, network_id: Uuid) -> WalletResult<Network> {
        let tables = self.tables.lock().await;
        tables
            .networks
            .get(&network_id)
            .cloned()
            .ok_or(WalletError::NetworkNotFound)
    }

    async fn find_all_networks(&self) -> WalletResult<Vec<Network>> {
        let tables = self.tables.lock().await;
        let mut networks: Vec<Network> = tables.networks.values().cloned().collect();
        networks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(networks)
    }
}

#[async_trait]
impl WithdrawalRepository for MemoryStore {
    async fn create_with_lock(&self, withdrawal: &Withdrawal) -> WalletResult<Account> {
        let mut tables = self.lock_for_write().await?;
        let mut account = tables.account(withdrawal.account_id)?.clone();
        account.apply(&withdrawal.creation_op())?;

        tables.accounts.insert(account.id, account.clone());
        tables.withdrawals.insert(withdrawal.id, withdrawal.clone());
        Ok(account)
    }

    async fn find_by_id(&self, withdrawal_id: Uuid) -> WalletResult<Withdrawal> {
        let tables = self.tables.lock().await;
        tables
            .withdrawals
            .get(&withdrawal_id)
            .cloned()
            .ok_or(WalletError::WithdrawalNotFound)
    }

    async fn transition(
        &self,
        withdrawal_id: Uuid,
        transition: &WithdrawalTransition,
    ) -> WalletResult<Withdrawal> {
        let mut tables = self.lock_for_write().await?;
        let mut withdrawal = tables
            .withdrawals
            .get(&withdrawal_id)
            .cloned()
            .ok_or(WalletError::WithdrawalNotFound)?;

        let op = match withdrawal.apply_transition(transition)? {
            TransitionOutcome::AlreadyApplied => return Ok(withdrawal),
            TransitionOutcome::Applied(op) => op,
        };

        if let Some(op) = op {
            let mut account = tables.account(withdrawal.account_id)?.clone();
            account.apply(&op)?;
            tables.accounts.insert(account.id, account);
        }
        tables.withdrawals.insert(withdrawal.id, withdrawal.clone());
        Ok(withdrawal)
    }

    async fn list_by_account(&self, account_id: Uuid) -> WalletResult<Vec<Withdrawal>> {
        let tables = self.tables.lock().await;
        let mut list: Vec<Withdrawal> = tables
            .withdrawals
            .values()
            .filter(|w| w.account_id == account_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn list_by_user(&self, user_id: &str) -> WalletResult<Vec<Withdrawal>> {
        let tables = self.tables.lock().await;
        let mut list: Vec<Withdrawal> = tables
            .withdrawals
            .values()
            .filter(|w| {
                tables
                    .accounts
                    .get(&w.account_id)
                    .is_some_and(|a| a.user_id == user_id)
            })
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn list_by_status(&self, status: WithdrawalStatus) -> WalletResult<Vec<Withdrawal>> {
        let tables = self.tables.lock().await;
        let mut list: Vec<Withdrawal> = tables
            .withdrawals
            .values()
            .filter(|w| w.status == status)
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(list)
    }
}

#[async_trait]
impl DepositRepository for MemoryStore {
    async fn record(&self, deposit: &Deposit) -> WalletResult<()> {
        let mut tables = self.tables.lock().await;
        tables.account(deposit.account_id)?;
        if tables
            .deposits
            .values()
            .any(|d| d.asset_id == deposit.asset_id && d.onchain_tx_id == deposit.onchain_tx_id)
        {
            return Err(WalletError::DuplicateDeposit);
        }

        tables.deposits.insert(deposit.id, deposit.clone());
        Ok(())
    }

    async fn find_by_id(&self, deposit_id: Uuid) -> WalletResult<Deposit> {
        let tables = self.tables.lock().await;
        tables
            .deposits
            .get(&deposit_id)
            .cloned()
            .ok_or(WalletError::DepositNotFound)
    }

    async fn confirm(&self, deposit_id: Uuid, confirmations: i32) -> WalletResult<Deposit> {
        let mut tables = self.lock_for_write().await?;
        let mut deposit = tables
            .deposits
            .get(&deposit_id)
            .cloned()
            .ok_or(WalletError::DepositNotFound)?;

        if let Some(op) = deposit.confirm(confirmations) {
            let mut account = tables.account(deposit.account_id)?.clone();
            account.apply(&op)?;
            tables.accounts.insert(account.id, account);
        }
        tables.deposits.insert(deposit.id, deposit.clone());
        Ok(deposit)
    }
}

#[async_trait]
impl DepositAddressRepository for MemoryStore {
    async fn save(&self, address: &mut DepositAddress) -> WalletResult<()> {
        let mut tables = self.tables.lock().await;
        tables.account(address.account_id)?;
        if tables.deposit_addresses.values().any(|a| {
            a.account_id == address.account_id || a.address == address.address
        }) {
            return Err(WalletError::DuplicateDepositAddress);
        }

        address.id = Uuid::new_v4();
        tables.deposit_addresses.insert(address.id, address.clone());
        Ok(())
    }

    async fn find_by_account_id(&self, account_id: Uuid) -> WalletResult<DepositAddress> {
        let tables = self.tables.lock().await;
        tables
            .deposit_addresses
            .values()
            .find(|a| a.account_id == account_id)
            .cloned()
            .ok_or(WalletError::DepositAddressNotFound)
    }
}

#[async_trait]
impl TransferRepository for MemoryStore {
    async fn execute(&self, transfer: &InternalTransfer) -> WalletResult<()> {
        let mut tables = self.lock_for_write().await?;
        let mut from = tables.account(transfer.from_account_id)?.clone();
        let mut to = tables.account(transfer.to_account_id)?.clone();
        if from.asset_id != transfer.asset_id || to.asset_id != transfer.asset_id {
            return Err(WalletError::AccountNotFound);
        }
        if let Some(reference) = &transfer.reference_id {
            if tables
                .transfers
                .values()
                .any(|t| t.reference_id.as_ref() == Some(reference))
            {
                return Err(WalletError::DuplicateTransfer);
            }
        }

        from.apply(&transfer.debit_op())?;
        to.apply(&transfer.credit_op())?;

        tables.accounts.insert(from.id, from);
        tables.accounts.insert(to.id, to);
        tables.transfers.insert(transfer.id, transfer.clone());
        Ok(())
    }

    async fn find_by_id(&self, transfer_id: Uuid) -> WalletResult<InternalTransfer> {
        let tables = self.tables.lock().await;
        tables
            .transfers
            .get(&transfer_id)
            .cloned()
            .ok_or(WalletError::TransferNotFound)
    }
}
