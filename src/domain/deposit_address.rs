//! 账户的充值地址
//!
//! 地址由外部派生服务生成，这里只负责记录与查询；每个账户最多一个地址。

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::errors::{WalletError, WalletResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositAddress {
    pub id: Uuid,
    pub account_id: Uuid,
    pub address: String,
    /// 例如 m/44'/60'/0'/0/7
    pub derivation_path: String,
    /// XRP / EOS 一类链的 memo 或 tag
    pub memo_tag: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DepositAddress {
    /// ID 由存储层 `save` 分配
    pub fn new(
        account_id: Uuid,
        address: &str,
        derivation_path: &str,
        memo_tag: Option<String>,
    ) -> WalletResult<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(WalletError::AddressRequired);
        }

        Ok(Self {
            id: Uuid::nil(),
            account_id,
            address: address.to_string(),
            derivation_path: derivation_path.trim().to_string(),
            memo_tag: memo_tag
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_required() {
        let account = Uuid::new_v4();
        assert_eq!(
            DepositAddress::new(account, "  ", "m/0", None).unwrap_err(),
            WalletError::AddressRequired
        );

        let addr = DepositAddress::new(account, " 0xabc ", "m/44'/60'/0'/0/1", Some(" ".into()))
            .unwrap();
        assert_eq!(addr.address, "0xabc");
        assert!(addr.memo_tag.is_none());
        assert!(addr.id.is_nil());
    }
}
