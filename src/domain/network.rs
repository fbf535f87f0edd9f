//! 链 / 网络元数据

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::errors::{WalletError, WalletResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Network {
    pub id: Uuid,
    pub name: String,
    /// EVM 链 ID，非 EVM 网络为 None
    pub chain_id: Option<i64>,
    pub rpc_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Network {
    /// ID 由存储层 `save` 分配
    pub fn new(name: &str, rpc_url: &str, chain_id: Option<i64>) -> WalletResult<Self> {
        let name = name.trim();
        let rpc_url = rpc_url.trim();
        if name.is_empty() || rpc_url.is_empty() {
            return Err(WalletError::NetworkFieldsRequired);
        }

        Ok(Self {
            id: Uuid::nil(),
            name: name.to_string(),
            chain_id,
            rpc_url: rpc_url.to_string(),
            is_active: true,
            created_at: Utc::now(),
        })
    }

    pub fn is_evm(&self) -> bool {
        self.chain_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields() {
        assert_eq!(
            Network::new("", "https://rpc", None).unwrap_err(),
            WalletError::NetworkFieldsRequired
        );
        assert_eq!(
            Network::new("ethereum", " ", Some(1)).unwrap_err(),
            WalletError::NetworkFieldsRequired
        );

        let eth = Network::new("ethereum", "https://rpc.example", Some(1)).unwrap();
        assert!(eth.is_evm());
        assert!(eth.is_active);

        let btc = Network::new("bitcoin", "https://btc.example", None).unwrap();
        assert!(!btc.is_evm());
    }
}
