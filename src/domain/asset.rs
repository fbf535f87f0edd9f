//! 资产元数据与网络提现策略

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    amount::Amount,
    errors::{WalletError, WalletResult},
};

pub const MAX_PRECISION: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetType {
    Crypto,
    Fiat,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Crypto => "CRYPTO",
            AssetType::Fiat => "FIAT",
        }
    }
}

impl FromStr for AssetType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CRYPTO" => Ok(AssetType::Crypto),
            "FIAT" => Ok(AssetType::Fiat),
            _ => Err(WalletError::InvalidAssetType),
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 资产在某个网络上的提现策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetNetwork {
    pub asset_id: Uuid,
    pub network_id: Uuid,
    /// 例如 ERC-20 合约地址
    pub contract_address: Option<String>,
    pub min_withdrawal: Amount,
    pub withdrawal_fee: Amount,
    pub is_active: bool,
}

impl AssetNetwork {
    pub fn new(
        network_id: Uuid,
        contract_address: Option<String>,
        min_withdrawal: Amount,
        withdrawal_fee: Amount,
    ) -> WalletResult<Self> {
        if min_withdrawal.is_negative() || withdrawal_fee.is_negative() {
            return Err(WalletError::InvalidAmount);
        }

        Ok(Self {
            asset_id: Uuid::nil(),
            network_id,
            contract_address: contract_address
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            min_withdrawal,
            withdrawal_fee,
            is_active: true,
        })
    }

    /// 金额是否满足该网络的最小提现额
    pub fn check_withdrawal(&self, amount: &Amount) -> WalletResult<()> {
        if *amount < self.min_withdrawal {
            return Err(WalletError::WithdrawalAmountTooLow);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub id: Uuid,
    pub symbol: String,
    pub name: String,
    pub asset_type: AssetType,
    pub precision: u8,
    pub is_active: bool,
    /// 与资产一起原子持久化
    pub supported_networks: Vec<AssetNetwork>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 资产符号统一为大写
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

impl Asset {
    /// ID 由存储层 `save` 分配
    pub fn new(symbol: &str, name: &str, asset_type: AssetType, precision: u8) -> WalletResult<Self> {
        let symbol = normalize_symbol(symbol);
        let name = name.trim();
        if symbol.is_empty() || name.is_empty() {
            return Err(WalletError::AssetFieldsRequired);
        }
        if precision > MAX_PRECISION {
            return Err(WalletError::InvalidPrecision);
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::nil(),
            symbol,
            name: name.to_string(),
            asset_type,
            precision,
            is_active: true,
            supported_networks: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_network(mut self, link: AssetNetwork) -> Self {
        self.supported_networks.push(link);
        self
    }

    /// 选择提现使用的网络策略
    ///
    /// 指定网络时必须是已启用的支持网络；未指定时取第一个启用的网络；
    /// 资产没有任何网络时返回 None（不设最小额）。
    pub fn withdrawal_policy(&self, network_id: Option<Uuid>) -> WalletResult<Option<&AssetNetwork>> {
        match network_id {
            Some(id) => self
                .supported_networks
                .iter()
                .find(|n| n.network_id == id && n.is_active)
                .map(Some)
                .ok_or(WalletError::AssetNotSupportedOnNetwork),
            None => {
                if self.supported_networks.is_empty() {
                    return Ok(None);
                }
                self.supported_networks
                    .iter()
                    .find(|n| n.is_active)
                    .map(Some)
                    .ok_or(WalletError::AssetNotSupportedOnNetwork)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_asset_validation() {
        assert_eq!(
            Asset::new("", "Bitcoin", AssetType::Crypto, 8).unwrap_err(),
            WalletError::AssetFieldsRequired
        );
        assert_eq!(
            Asset::new("BTC", " ", AssetType::Crypto, 8).unwrap_err(),
            WalletError::AssetFieldsRequired
        );
        assert_eq!(
            Asset::new("BTC", "Bitcoin", AssetType::Crypto, 19).unwrap_err(),
            WalletError::InvalidPrecision
        );

        let asset = Asset::new(" usdt ", "Tether", AssetType::Crypto, 6).unwrap();
        assert_eq!(asset.symbol, "USDT");
        assert!(asset.is_active);
    }

    #[test]
    fn test_asset_type_parse() {
        assert_eq!("CRYPTO".parse::<AssetType>().unwrap(), AssetType::Crypto);
        assert_eq!("FIAT".parse::<AssetType>().unwrap(), AssetType::Fiat);
        assert_eq!(
            "STOCK".parse::<AssetType>().unwrap_err(),
            WalletError::InvalidAssetType
        );
    }

    #[test]
    fn test_withdrawal_policy_selection() {
        let eth = Uuid::new_v4();
        let tron = Uuid::new_v4();
        let mut inactive =
            AssetNetwork::new(eth, None, Amount::from_u64(50), Amount::from_u64(1)).unwrap();
        inactive.is_active = false;
        let active =
            AssetNetwork::new(tron, None, Amount::from_u64(10), Amount::from_u64(1)).unwrap();

        let asset = Asset::new("USDT", "Tether", AssetType::Crypto, 6)
            .unwrap()
            .with_network(inactive)
            .with_network(active);

        let chosen = asset.withdrawal_policy(None).unwrap().unwrap();
        assert_eq!(chosen.network_id, tron);

        assert_eq!(
            asset.withdrawal_policy(Some(eth)).unwrap_err(),
            WalletError::AssetNotSupportedOnNetwork
        );
        assert_eq!(
            asset.withdrawal_policy(Some(Uuid::new_v4())).unwrap_err(),
            WalletError::AssetNotSupportedOnNetwork
        );

        let bare = Asset::new("USD", "Dollar", AssetType::Fiat, 2).unwrap();
        assert!(bare.withdrawal_policy(None).unwrap().is_none());
    }

    #[test]
    fn test_minimum_withdrawal() {
        let link = AssetNetwork::new(
            Uuid::new_v4(),
            Some("0xdac17f958d2ee523a2206206994597c13d831ec7".into()),
            Amount::from_u64(100),
            Amount::ZERO,
        )
        .unwrap();
        assert_eq!(
            link.check_withdrawal(&Amount::from_u64(99)).unwrap_err(),
            WalletError::WithdrawalAmountTooLow
        );
        assert!(link.check_withdrawal(&Amount::from_u64(100)).is_ok());
    }
}
