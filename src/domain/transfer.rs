//! 内部转账：同一资产两个账户之间的即时划转

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{
    account::LedgerOp,
    amount::Amount,
    errors::{WalletError, WalletResult},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternalTransfer {
    pub id: Uuid,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub asset_id: Uuid,
    pub amount: Amount,
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InternalTransfer {
    pub fn new(
        from: Uuid,
        to: Uuid,
        asset_id: Uuid,
        amount: Amount,
        reference_id: Option<String>,
    ) -> WalletResult<Self> {
        if from == to {
            return Err(WalletError::CannotTransferToSameAccount);
        }
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            from_account_id: from,
            to_account_id: to,
            asset_id,
            amount,
            reference_id: reference_id
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            created_at: Utc::now(),
        })
    }

    /// 出账腿
    pub fn debit_op(&self) -> LedgerOp {
        LedgerOp::Debit(self.amount.clone())
    }

    /// 入账腿
    pub fn credit_op(&self) -> LedgerOp {
        LedgerOp::Deposit(self.amount.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_self_transfer_and_bad_amount() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let asset = Uuid::new_v4();

        assert_eq!(
            InternalTransfer::new(a, a, asset, Amount::from_u64(1), None).unwrap_err(),
            WalletError::CannotTransferToSameAccount
        );
        assert_eq!(
            InternalTransfer::new(a, b, asset, Amount::ZERO, None).unwrap_err(),
            WalletError::InvalidAmount
        );

        let t = InternalTransfer::new(a, b, asset, Amount::from_u64(9), Some(" ".into())).unwrap();
        assert!(t.reference_id.is_none());
        assert_eq!(t.debit_op(), LedgerOp::Debit(Amount::from_u64(9)));
        assert_eq!(t.credit_op(), LedgerOp::Deposit(Amount::from_u64(9)));
    }
}
