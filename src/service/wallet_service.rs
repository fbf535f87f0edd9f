//! 钱包服务：账户查询与提现申请

use std::time::Duration;

use uuid::Uuid;

use crate::{
    domain::{
        normalize_symbol, Amount, AssetType, UserAccount, WalletError, WalletResult, Withdrawal,
    },
    infrastructure::deadline::run_mutation,
    repository::Repositories,
};

/// 提现申请参数
#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub user_id: String,
    pub asset_symbol: String,
    pub amount: Amount,
    pub to_address: String,
    /// 未指定时使用资产第一个启用的网络
    pub network: Option<String>,
    pub priority: i32,
}

#[derive(Clone)]
pub struct WalletService {
    repos: Repositories,
    timeout: Duration,
}

impl WalletService {
    pub fn new(repos: Repositories, timeout: Duration) -> Self {
        Self { repos, timeout }
    }

    pub async fn get_accounts(&self, user_id: &str) -> WalletResult<Vec<UserAccount>> {
        tracing::info!(user_id, "fetching all accounts for user");
        if user_id.trim().is_empty() {
            return Err(WalletError::UserIdRequired);
        }

        self.repos.accounts.find_user_accounts(user_id).await
    }

    pub async fn get_account_by_asset(
        &self,
        user_id: &str,
        asset_symbol: &str,
    ) -> WalletResult<UserAccount> {
        tracing::info!(user_id, asset_symbol, "fetching account for user by asset");
        if user_id.trim().is_empty() {
            return Err(WalletError::UserIdRequired);
        }

        let asset = self
            .repos
            .assets
            .find_asset_by_symbol(&normalize_symbol(asset_symbol))
            .await?;
        let account = self.repos.accounts.find_account(user_id, asset.id).await?;

        Ok(UserAccount {
            account,
            asset_symbol: asset.symbol,
        })
    }

    /// 锁定资金并创建 Requested 提现
    pub async fn request_withdrawal(&self, req: WithdrawalRequest) -> WalletResult<Withdrawal> {
        tracing::info!(
            user_id = %req.user_id,
            asset_symbol = %req.asset_symbol,
            amount = %req.amount,
            network = ?req.network,
            "withdrawal requested"
        );

        // 1. 输入校验
        if req.user_id.trim().is_empty() {
            return Err(WalletError::UserIdRequired);
        }
        if !req.amount.is_positive() {
            return Err(WalletError::InvalidAmount);
        }
        if req.to_address.trim().is_empty() {
            return Err(WalletError::WithdrawalAddressRequired);
        }

        // 2. 资产
        let asset = self
            .repos
            .assets
            .find_asset_by_symbol(&normalize_symbol(&req.asset_symbol))
            .await?;
        if !asset.is_active {
            return Err(WalletError::AssetInactive);
        }
        if asset.asset_type == AssetType::Fiat {
            return Err(WalletError::NotImplemented("fiat withdrawal"));
        }

        // 3. 网络策略（最小额 + 手续费）
        let network_id: Option<Uuid> = match req.network.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(self.repos.networks.find_by_name(name).await?.id),
            _ => None,
        };
        let policy = asset.withdrawal_policy(network_id)?;
        let (network_id, network_fee) = match policy {
            Some(link) => {
                link.check_withdrawal(&req.amount)?;
                (Some(link.network_id), link.withdrawal_fee.clone())
            }
            None => (None, Amount::ZERO),
        };

        // 4. 账户（首次访问时创建）
        let account = self
            .repos
            .accounts
            .find_or_create(&req.user_id, asset.id)
            .await?;

        // 5. 锁定 + 写入记录，同一事务
        let withdrawal = Withdrawal::new(
            account.id,
            asset.id,
            network_id,
            req.amount,
            &req.to_address,
            network_fee,
            req.priority,
        )?;

        let withdrawals = self.repos.withdrawals.clone();
        let pending = withdrawal.clone();
        run_mutation(self.timeout, "request_withdrawal", async move {
            withdrawals.create_with_lock(&pending).await
        })
        .await?;

        Ok(withdrawal)
    }
}
