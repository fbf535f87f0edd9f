//! 提现状态机
//!
//! ```text
//! Requested -> Approved -> Processing -> Broadcasted -> Confirmed
//!     |            |            |              |
//!     +------------+------------+--------------+--> Failed
//! ```
//!
//! - 不允许跳过状态；Confirmed / Failed 为终态
//! - 取消只允许在 Requested / Approved（广播前）
//! - 重复应用当前状态是幂等的空操作，供对账进程安全重放

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    account::LedgerOp,
    amount::Amount,
    errors::{WalletError, WalletResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Requested,
    Approved,
    Processing,
    Broadcasted,
    Confirmed,
    Failed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Requested => "requested",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Broadcasted => "broadcasted",
            WithdrawalStatus::Confirmed => "confirmed",
            WithdrawalStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Confirmed | WithdrawalStatus::Failed)
    }

    /// 广播前允许用户取消
    pub fn can_cancel(&self) -> bool {
        matches!(self, WithdrawalStatus::Requested | WithdrawalStatus::Approved)
    }
}

impl FromStr for WithdrawalStatus {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(WithdrawalStatus::Requested),
            "approved" => Ok(WithdrawalStatus::Approved),
            "processing" => Ok(WithdrawalStatus::Processing),
            "broadcasted" => Ok(WithdrawalStatus::Broadcasted),
            "confirmed" => Ok(WithdrawalStatus::Confirmed),
            "failed" => Ok(WithdrawalStatus::Failed),
            other => Err(WalletError::Internal(format!(
                "unknown withdrawal status: {other}"
            ))),
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct WithdrawalStateMachine;

impl WithdrawalStateMachine {
    /// 验证状态转换是否合法（相同状态视为幂等，允许）
    pub fn validate_transition(from: WithdrawalStatus, to: WithdrawalStatus) -> WalletResult<()> {
        if from == to || Self::get_next_states(from).contains(&to) {
            return Ok(());
        }

        Err(WalletError::InvalidTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }

    pub fn get_next_states(current: WithdrawalStatus) -> Vec<WithdrawalStatus> {
        use WithdrawalStatus::*;

        match current {
            Requested => vec![Approved, Failed],
            Approved => vec![Processing, Failed],
            Processing => vec![Broadcasted, Failed],
            Broadcasted => vec![Confirmed, Failed],
            Confirmed | Failed => vec![],
        }
    }
}

/// 工作流触发的转换
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalTransition {
    Approve { approved_by: String },
    StartProcessing,
    Broadcast { onchain_tx_id: String },
    Confirm,
    Fail { reason: String },
    /// 用户取消：只允许在广播前，落到 Failed
    Cancel,
}

impl WithdrawalTransition {
    pub fn target(&self) -> WithdrawalStatus {
        match self {
            WithdrawalTransition::Approve { .. } => WithdrawalStatus::Approved,
            WithdrawalTransition::StartProcessing => WithdrawalStatus::Processing,
            WithdrawalTransition::Broadcast { .. } => WithdrawalStatus::Broadcasted,
            WithdrawalTransition::Confirm => WithdrawalStatus::Confirmed,
            WithdrawalTransition::Fail { .. } | WithdrawalTransition::Cancel => {
                WithdrawalStatus::Failed
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WithdrawalTransition::Approve { .. } => "approve",
            WithdrawalTransition::StartProcessing => "start_processing",
            WithdrawalTransition::Broadcast { .. } => "broadcast",
            WithdrawalTransition::Confirm => "confirm",
            WithdrawalTransition::Fail { .. } => "fail",
            WithdrawalTransition::Cancel => "cancel",
        }
    }
}

/// 转换结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// 状态已变更，附带需要在同一事务内执行的账本操作
    Applied(Option<LedgerOp>),
    /// 已处于目标状态，无副作用
    AlreadyApplied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub account_id: Uuid,
    pub asset_id: Uuid,
    pub network_id: Option<Uuid>,
    pub status: WithdrawalStatus,
    pub amount: Amount,
    pub to_address: String,
    pub onchain_tx_id: Option<String>,
    pub network_fee: Amount,
    pub approved_by: Option<String>,
    pub failure_reason: Option<String>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Withdrawal {
    /// 创建 Requested 状态的提现记录；资金锁定由存储层在同一事务内完成
    pub fn new(
        account_id: Uuid,
        asset_id: Uuid,
        network_id: Option<Uuid>,
        amount: Amount,
        to_address: &str,
        network_fee: Amount,
        priority: i32,
    ) -> WalletResult<Self> {
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount);
        }
        let to_address = to_address.trim();
        if to_address.is_empty() {
            return Err(WalletError::WithdrawalAddressRequired);
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            asset_id,
            network_id,
            status: WithdrawalStatus::Requested,
            amount,
            to_address: to_address.to_string(),
            onchain_tx_id: None,
            network_fee,
            approved_by: None,
            failure_reason: None,
            priority,
            created_at: now,
            updated_at: now,
        })
    }

    /// 创建时对账户执行的账本操作
    pub fn creation_op(&self) -> LedgerOp {
        LedgerOp::Lock(self.amount.clone())
    }

    /// 应用一次转换，返回调用方必须在同一事务内执行的账本操作
    pub fn apply_transition(
        &mut self,
        transition: &WithdrawalTransition,
    ) -> WalletResult<TransitionOutcome> {
        let target = transition.target();

        // 参数校验先于幂等判断，避免空值被当作成功重放
        match transition {
            WithdrawalTransition::Approve { approved_by } if approved_by.trim().is_empty() => {
                return Err(WalletError::ApproverRequired);
            }
            WithdrawalTransition::Broadcast { onchain_tx_id }
                if onchain_tx_id.trim().is_empty() =>
            {
                return Err(WalletError::TxIdRequired);
            }
            _ => {}
        }

        if self.status == target {
            if let WithdrawalTransition::Broadcast { onchain_tx_id } = transition {
                if self.onchain_tx_id.as_deref() != Some(onchain_tx_id.trim()) {
                    return Err(WalletError::TxIdMismatch);
                }
            }
            return Ok(TransitionOutcome::AlreadyApplied);
        }

        if matches!(transition, WithdrawalTransition::Cancel) && !self.status.can_cancel() {
            return Err(WalletError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: target.as_str().to_string(),
            });
        }

        WithdrawalStateMachine::validate_transition(self.status, target)?;

        let ledger_op = match transition {
            WithdrawalTransition::Approve { approved_by } => {
                self.approved_by = Some(approved_by.trim().to_string());
                None
            }
            WithdrawalTransition::StartProcessing => None,
            WithdrawalTransition::Broadcast { onchain_tx_id } => {
                self.onchain_tx_id = Some(onchain_tx_id.trim().to_string());
                None
            }
            WithdrawalTransition::Confirm => Some(LedgerOp::Settle(self.amount.clone())),
            WithdrawalTransition::Fail { reason } => {
                self.failure_reason = Some(reason.clone());
                Some(LedgerOp::Revert(self.amount.clone()))
            }
            WithdrawalTransition::Cancel => {
                self.failure_reason = Some("cancelled by user".to_string());
                Some(LedgerOp::Revert(self.amount.clone()))
            }
        };

        self.status = target;
        self.updated_at = Utc::now();
        Ok(TransitionOutcome::Applied(ledger_op))
    }
}
