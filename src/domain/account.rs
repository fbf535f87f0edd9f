//! 账户账本
//!
//! 每个 `(user_id, asset_id)` 一个账户，持有可用余额与锁定余额。
//! 每次变更都由当前余额对和增量计算出新的余额对后整体替换，
//! 内存中的账户不会出现半更新状态。

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{
    amount::Amount,
    errors::{WalletError, WalletResult},
};

/// 余额对
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balances {
    pub available: Amount,
    pub locked: Amount,
}

impl Balances {
    pub fn total(&self) -> Amount {
        &self.available + &self.locked
    }
}

/// 账本操作
///
/// `Lock` / `Settle` / `Revert` 在两个字段之间移动金额，
/// 只有 `Deposit` 与 `Debit`（内部转账出账腿）改变总额。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    Deposit(Amount),
    Lock(Amount),
    Settle(Amount),
    Revert(Amount),
    Debit(Amount),
}

impl LedgerOp {
    pub fn amount(&self) -> &Amount {
        match self {
            LedgerOp::Deposit(a)
            | LedgerOp::Lock(a)
            | LedgerOp::Settle(a)
            | LedgerOp::Revert(a)
            | LedgerOp::Debit(a) => a,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerOp::Deposit(_) => "deposit",
            LedgerOp::Lock(_) => "lock",
            LedgerOp::Settle(_) => "settle",
            LedgerOp::Revert(_) => "revert",
            LedgerOp::Debit(_) => "debit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub user_id: String,
    pub asset_id: Uuid,
    balances: Balances,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 带资产符号的账户视图
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub account: Account,
    pub asset_symbol: String,
}

impl Account {
    /// 新建零余额账户，ID 由存储层 `save` 分配
    pub fn new(user_id: &str, asset_id: Uuid) -> WalletResult<Self> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(WalletError::UserIdRequired);
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::nil(),
            user_id: user_id.to_string(),
            asset_id,
            balances: Balances {
                available: Amount::ZERO,
                locked: Amount::ZERO,
            },
            created_at: now,
            updated_at: now,
        })
    }

    /// 从持久化行重建账户，负余额视为存储损坏
    pub fn restore(
        id: Uuid,
        user_id: String,
        asset_id: Uuid,
        balance: Amount,
        locked_balance: Amount,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> WalletResult<Self> {
        if balance.is_negative() || locked_balance.is_negative() {
            tracing::error!(account_id = %id, "stored account has a negative balance");
            return Err(WalletError::Internal("corrupted account balances".into()));
        }

        Ok(Self {
            id,
            user_id,
            asset_id,
            balances: Balances {
                available: balance,
                locked: locked_balance,
            },
            created_at,
            updated_at,
        })
    }

    pub fn balance(&self) -> Amount {
        self.balances.available.clone()
    }

    pub fn locked_balance(&self) -> Amount {
        self.balances.locked.clone()
    }

    pub fn balances(&self) -> Balances {
        self.balances.clone()
    }

    /// 计算操作后的余额对，不修改账户
    pub fn preview(&self, op: &LedgerOp) -> WalletResult<Balances> {
        let amount = op.amount();
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount);
        }

        let Balances { available, locked } = &self.balances;
        let next = match op {
            LedgerOp::Deposit(_) => Balances {
                available: available + amount,
                locked: locked.clone(),
            },
            LedgerOp::Lock(_) => {
                if available < amount {
                    return Err(WalletError::InsufficientBalance);
                }
                Balances {
                    available: available - amount,
                    locked: locked + amount,
                }
            }
            LedgerOp::Settle(_) => {
                if locked < amount {
                    return Err(WalletError::InsufficientLockedBalance);
                }
                Balances {
                    available: available.clone(),
                    locked: locked - amount,
                }
            }
            LedgerOp::Revert(_) => {
                if locked < amount {
                    return Err(WalletError::InsufficientLockedBalance);
                }
                Balances {
                    available: available + amount,
                    locked: locked - amount,
                }
            }
            LedgerOp::Debit(_) => {
                if available < amount {
                    return Err(WalletError::InsufficientBalance);
                }
                Balances {
                    available: available - amount,
                    locked: locked.clone(),
                }
            }
        };

        Ok(next)
    }

    /// 应用操作：失败时账户保持不变
    pub fn apply(&mut self, op: &LedgerOp) -> WalletResult<Balances> {
        let next = self.preview(op)?;
        self.balances = next.clone();
        self.updated_at = Utc::now();
        Ok(next)
    }

    pub fn deposit(&mut self, amount: Amount) -> WalletResult<()> {
        self.apply(&LedgerOp::Deposit(amount)).map(|_| ())
    }

    /// 提现资金预留
    pub fn lock_balance(&mut self, amount: Amount) -> WalletResult<()> {
        self.apply(&LedgerOp::Lock(amount)).map(|_| ())
    }

    /// 提现链上确认后，锁定资金永久离开账户
    pub fn settle_withdrawal(&mut self, amount: Amount) -> WalletResult<()> {
        self.apply(&LedgerOp::Settle(amount)).map(|_| ())
    }

    /// 提现失败或取消，锁定资金退回可用余额
    pub fn revert_withdrawal(&mut self, amount: Amount) -> WalletResult<()> {
        self.apply(&LedgerOp::Revert(amount)).map(|_| ())
    }

    /// 内部转账出账（即时扣减，不经过锁定）
    pub fn debit(&mut self, amount: Amount) -> WalletResult<()> {
        self.apply(&LedgerOp::Debit(amount)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded(balance: u64) -> Account {
        let mut account = Account::new("user-1", Uuid::new_v4()).unwrap();
        if balance > 0 {
            account.deposit(Amount::from_u64(balance)).unwrap();
        }
        account
    }

    #[test]
    fn test_new_account_requires_user() {
        assert_eq!(
            Account::new("  ", Uuid::new_v4()).unwrap_err(),
            WalletError::UserIdRequired
        );
        let account = Account::new("u", Uuid::new_v4()).unwrap();
        assert!(account.balance().is_zero());
        assert!(account.locked_balance().is_zero());
    }

    #[test]
    fn test_deposit_rejects_non_positive() {
        let mut account = funded(0);
        assert_eq!(
            account.deposit(Amount::ZERO).unwrap_err(),
            WalletError::InvalidAmount
        );
        assert_eq!(
            account.deposit("-3".parse().unwrap()).unwrap_err(),
            WalletError::InvalidAmount
        );
        account.deposit(Amount::from_u64(5)).unwrap();
        assert_eq!(account.balance(), Amount::from_u64(5));
    }

    #[test]
    fn test_lock_moves_between_fields() {
        let mut account = funded(100);
        account.lock_balance(Amount::from_u64(60)).unwrap();
        assert_eq!(account.balance(), Amount::from_u64(40));
        assert_eq!(account.locked_balance(), Amount::from_u64(60));

        let err = account.lock_balance(Amount::from_u64(60)).unwrap_err();
        assert_eq!(err, WalletError::InsufficientBalance);
        // 失败不改变余额
        assert_eq!(account.balance(), Amount::from_u64(40));
        assert_eq!(account.locked_balance(), Amount::from_u64(60));
    }

    #[test]
    fn test_lock_then_settle_consumes_amount() {
        let mut account = funded(1000);
        let before = account.balances().total();

        account.lock_balance(Amount::from_u64(300)).unwrap();
        account.settle_withdrawal(Amount::from_u64(300)).unwrap();

        assert_eq!(account.balance(), Amount::from_u64(700));
        assert!(account.locked_balance().is_zero());
        assert_eq!(
            &before - &account.balances().total(),
            Amount::from_u64(300)
        );
    }

    #[test]
    fn test_lock_then_revert_restores_exactly() {
        let mut account = funded(1000);
        let before = account.balances();

        account.lock_balance(Amount::from_u64(300)).unwrap();
        account.revert_withdrawal(Amount::from_u64(300)).unwrap();

        assert_eq!(account.balances(), before);
    }

    #[test]
    fn test_settle_and_revert_guard_locked_balance() {
        let mut account = funded(100);
        account.lock_balance(Amount::from_u64(10)).unwrap();

        assert_eq!(
            account.settle_withdrawal(Amount::from_u64(11)).unwrap_err(),
            WalletError::InsufficientLockedBalance
        );
        assert_eq!(
            account.revert_withdrawal(Amount::from_u64(11)).unwrap_err(),
            WalletError::InsufficientLockedBalance
        );
        assert_eq!(
            account.settle_withdrawal(Amount::ZERO).unwrap_err(),
            WalletError::InvalidAmount
        );
    }

    #[test]
    fn test_debit_only_touches_available() {
        let mut account = funded(50);
        account.lock_balance(Amount::from_u64(20)).unwrap();
        account.debit(Amount::from_u64(30)).unwrap();
        assert!(account.balance().is_zero());
        assert_eq!(account.locked_balance(), Amount::from_u64(20));
        assert_eq!(
            account.debit(Amount::from_u64(1)).unwrap_err(),
            WalletError::InsufficientBalance
        );
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let account = funded(10);
        let next = account.preview(&LedgerOp::Lock(Amount::from_u64(4))).unwrap();
        assert_eq!(next.available, Amount::from_u64(6));
        assert_eq!(account.balance(), Amount::from_u64(10));
    }

    #[test]
    fn test_restore_rejects_negative() {
        let now = Utc::now();
        let err = Account::restore(
            Uuid::new_v4(),
            "u".into(),
            Uuid::new_v4(),
            "-1".parse().unwrap(),
            Amount::ZERO,
            now,
            now,
        )
        .unwrap_err();
        assert!(matches!(err, WalletError::Internal(_)));
    }
}
