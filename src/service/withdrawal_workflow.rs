//! 提现工作流
//!
//! 每个转换是一次独立的持久化操作；对账进程可以按存储状态安全重放。

use std::time::Duration;

use uuid::Uuid;

use crate::{
    domain::{WalletError, WalletResult, Withdrawal, WithdrawalStatus, WithdrawalTransition},
    infrastructure::deadline::run_mutation,
    repository::Repositories,
};

#[derive(Clone)]
pub struct WithdrawalWorkflow {
    repos: Repositories,
    timeout: Duration,
}

impl WithdrawalWorkflow {
    pub fn new(repos: Repositories, timeout: Duration) -> Self {
        Self { repos, timeout }
    }

    pub async fn approve(&self, withdrawal_id: Uuid, approved_by: &str) -> WalletResult<Withdrawal> {
        self.transition(
            withdrawal_id,
            WithdrawalTransition::Approve {
                approved_by: approved_by.to_string(),
            },
        )
        .await
    }

    pub async fn start_processing(&self, withdrawal_id: Uuid) -> WalletResult<Withdrawal> {
        self.transition(withdrawal_id, WithdrawalTransition::StartProcessing)
            .await
    }

    pub async fn mark_broadcasted(
        &self,
        withdrawal_id: Uuid,
        onchain_tx_id: &str,
    ) -> WalletResult<Withdrawal> {
        self.transition(
            withdrawal_id,
            WithdrawalTransition::Broadcast {
                onchain_tx_id: onchain_tx_id.to_string(),
            },
        )
        .await
    }

    /// 链上确认：结算锁定资金
    pub async fn confirm(&self, withdrawal_id: Uuid) -> WalletResult<Withdrawal> {
        self.transition(withdrawal_id, WithdrawalTransition::Confirm)
            .await
    }

    /// 任一非终态 -> Failed，退回锁定资金
    pub async fn fail(&self, withdrawal_id: Uuid, reason: &str) -> WalletResult<Withdrawal> {
        self.transition(
            withdrawal_id,
            WithdrawalTransition::Fail {
                reason: reason.to_string(),
            },
        )
        .await
    }

    /// 用户取消：仅所有者、仅广播前
    pub async fn cancel(&self, user_id: &str, withdrawal_id: Uuid) -> WalletResult<Withdrawal> {
        // 非所有者与不存在不做区分
        self.get(user_id, withdrawal_id).await?;
        self.transition(withdrawal_id, WithdrawalTransition::Cancel)
            .await
    }

    /// 用户视角的查询
    pub async fn get(&self, user_id: &str, withdrawal_id: Uuid) -> WalletResult<Withdrawal> {
        let withdrawal = self.repos.withdrawals.find_by_id(withdrawal_id).await?;
        let account = self.repos.accounts.find_by_id(withdrawal.account_id).await?;
        if account.user_id != user_id {
            return Err(WalletError::WithdrawalNotFound);
        }
        Ok(withdrawal)
    }

    pub async fn find(&self, withdrawal_id: Uuid) -> WalletResult<Withdrawal> {
        self.repos.withdrawals.find_by_id(withdrawal_id).await
    }

    pub async fn list_for_user(&self, user_id: &str) -> WalletResult<Vec<Withdrawal>> {
        if user_id.trim().is_empty() {
            return Err(WalletError::UserIdRequired);
        }
        self.repos.withdrawals.list_by_user(user_id).await
    }

    pub async fn list_by_status(&self, status: WithdrawalStatus) -> WalletResult<Vec<Withdrawal>> {
        self.repos.withdrawals.list_by_status(status).await
    }

    async fn transition(
        &self,
        withdrawal_id: Uuid,
        transition: WithdrawalTransition,
    ) -> WalletResult<Withdrawal> {
        tracing::info!(
            withdrawal_id = %withdrawal_id,
            transition = transition.name(),
            "applying withdrawal transition"
        );

        let withdrawals = self.repos.withdrawals.clone();
        run_mutation(self.timeout, transition.name(), async move {
            withdrawals.transition(withdrawal_id, &transition).await
        })
        .await
    }
}
