//! 链上充值记录
//!
//! Unconfirmed -> Confirmed，确认时对账户执行 Deposit。

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    account::LedgerOp,
    amount::Amount,
    errors::{WalletError, WalletResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Unconfirmed,
    Confirmed,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Unconfirmed => "unconfirmed",
            DepositStatus::Confirmed => "confirmed",
        }
    }
}

impl FromStr for DepositStatus {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unconfirmed" => Ok(DepositStatus::Unconfirmed),
            "confirmed" => Ok(DepositStatus::Confirmed),
            other => Err(WalletError::Internal(format!(
                "unknown deposit status: {other}"
            ))),
        }
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deposit {
    pub id: Uuid,
    pub account_id: Uuid,
    pub asset_id: Uuid,
    pub status: DepositStatus,
    pub amount: Amount,
    pub onchain_tx_id: String,
    pub from_address: String,
    pub confirmations: i32,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Deposit {
    pub fn new(
        account_id: Uuid,
        asset_id: Uuid,
        amount: Amount,
        onchain_tx_id: &str,
        from_address: &str,
        confirmations: i32,
    ) -> WalletResult<Self> {
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount);
        }
        let onchain_tx_id = onchain_tx_id.trim();
        if onchain_tx_id.is_empty() {
            return Err(WalletError::TxIdRequired);
        }
        let from_address = from_address.trim();
        if from_address.is_empty() {
            return Err(WalletError::AddressRequired);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            asset_id,
            status: DepositStatus::Unconfirmed,
            amount,
            onchain_tx_id: onchain_tx_id.to_string(),
            from_address: from_address.to_string(),
            confirmations: confirmations.max(0),
            created_at: Utc::now(),
            confirmed_at: None,
        })
    }

    /// 标记为已确认；返回需要入账的操作，已确认时返回 None（幂等）
    pub fn confirm(&mut self, confirmations: i32) -> Option<LedgerOp> {
        self.confirmations = self.confirmations.max(confirmations);
        if self.status == DepositStatus::Confirmed {
            return None;
        }

        self.status = DepositStatus::Confirmed;
        self.confirmed_at = Some(Utc::now());
        Some(LedgerOp::Deposit(self.amount.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Deposit {
        Deposit::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Amount::from_u64(250),
            "0xdeadbeef",
            "0xfrom",
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_validation() {
        let id = Uuid::new_v4();
        assert_eq!(
            Deposit::new(id, id, Amount::ZERO, "tx", "from", 0).unwrap_err(),
            WalletError::InvalidAmount
        );
        assert_eq!(
            Deposit::new(id, id, Amount::from_u64(1), " ", "from", 0).unwrap_err(),
            WalletError::TxIdRequired
        );
        assert_eq!(
            Deposit::new(id, id, Amount::from_u64(1), "tx", "", 0).unwrap_err(),
            WalletError::AddressRequired
        );
    }

    #[test]
    fn test_confirm_once() {
        let mut d = sample();
        assert_eq!(d.confirm(12), Some(LedgerOp::Deposit(Amount::from_u64(250))));
        assert_eq!(d.status, DepositStatus::Confirmed);
        assert!(d.confirmed_at.is_some());
        assert_eq!(d.confirm(20), None);
        assert_eq!(d.confirmations, 20);
    }
}
