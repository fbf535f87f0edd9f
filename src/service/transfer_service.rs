//! 用户间内部转账

use std::time::Duration;

use crate::{
    domain::{normalize_symbol, Amount, InternalTransfer, WalletError, WalletResult},
    infrastructure::deadline::run_mutation,
    repository::Repositories,
};

#[derive(Clone)]
pub struct TransferService {
    repos: Repositories,
    timeout: Duration,
}

impl TransferService {
    pub fn new(repos: Repositories, timeout: Duration) -> Self {
        Self { repos, timeout }
    }

    pub async fn transfer(
        &self,
        from_user: &str,
        to_user: &str,
        asset_symbol: &str,
        amount: Amount,
        reference_id: Option<String>,
    ) -> WalletResult<InternalTransfer> {
        tracing::info!(from_user, to_user, asset_symbol, amount = %amount, "internal transfer requested");

        if from_user.trim().is_empty() || to_user.trim().is_empty() {
            return Err(WalletError::UserIdRequired);
        }
        // 同一用户同一资产只有一个账户
        if from_user.trim() == to_user.trim() {
            return Err(WalletError::CannotTransferToSameAccount);
        }
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount);
        }

        let asset = self
            .repos
            .assets
            .find_asset_by_symbol(&normalize_symbol(asset_symbol))
            .await?;
        if !asset.is_active {
            return Err(WalletError::AssetInactive);
        }

        // 付款方必须已有账户，收款方首次收款时创建
        let from = self.repos.accounts.find_account(from_user, asset.id).await?;
        let to = self.repos.accounts.find_or_create(to_user, asset.id).await?;

        let transfer = InternalTransfer::new(from.id, to.id, asset.id, amount, reference_id)?;

        let transfers = self.repos.transfers.clone();
        let pending = transfer.clone();
        run_mutation(self.timeout, "internal_transfer", async move {
            transfers.execute(&pending).await
        })
        .await?;

        Ok(transfer)
    }
}
