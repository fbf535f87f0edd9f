//! 金额类型
//!
//! 所有余额都以资产最小单位的整数表示，持久化为十进制字符串，绝不使用浮点数。
//! 底层为任意精度整数，没有上限。

use std::{
    fmt,
    ops::{Add, Sub},
    str::FromStr,
};

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::{WalletError, WalletResult};

/// 最小单位整数金额
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(BigInt);

impl Amount {
    pub const ZERO: Amount = Amount(BigInt::ZERO);

    pub fn from_u64(value: u64) -> Self {
        Self(BigInt::from(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// 严格大于 0
    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// 解析持久化的余额字段，格式异常视为存储损坏
    pub fn from_stored(raw: &str) -> WalletResult<Amount> {
        raw.parse::<Amount>().map_err(|_| {
            tracing::error!(value = raw, "stored amount is not a base-10 integer");
            WalletError::Internal("corrupted amount in storage".into())
        })
    }
}

impl FromStr for Amount {
    type Err = WalletError;

    /// 只接受十进制整数字符串（可带前导 `-`），拒绝 `+`、小数点、指数和空白
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('-').unwrap_or(s);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WalletError::InvalidAmount);
        }
        BigInt::parse_bytes(s.as_bytes(), 10)
            .map(Amount)
            .ok_or(WalletError::InvalidAmount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl Add<&Amount> for &Amount {
    type Output = Amount;

    fn add(self, rhs: &Amount) -> Amount {
        Amount(&self.0 + &rhs.0)
    }
}

impl Sub<&Amount> for &Amount {
    type Output = Amount;

    fn sub(self, rhs: &Amount) -> Amount {
        Amount(&self.0 - &rhs.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integers_only() {
        assert_eq!("1000".parse::<Amount>().unwrap(), Amount::from_u64(1000));
        assert_eq!("0".parse::<Amount>().unwrap(), Amount::ZERO);
        assert!("-5".parse::<Amount>().unwrap().is_negative());

        assert!("1.5".parse::<Amount>().is_err());
        assert!("1e3".parse::<Amount>().is_err());
        assert!("+7".parse::<Amount>().is_err());
        assert!("-".parse::<Amount>().is_err());
        assert!("".parse::<Amount>().is_err());
        assert!(" 10".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
    }

    #[test]
    fn test_large_smallest_unit_values() {
        // 1,000,000 ETH in wei
        let raw = "1000000000000000000000000";
        let amount: Amount = raw.parse().unwrap();
        assert_eq!(amount.to_string(), raw);
    }

    #[test]
    fn test_values_beyond_128_bits() {
        // 1e12 个 18 位精度代币
        let supply: Amount = "1000000000000000000000000000000".parse().unwrap();
        let max_u128: Amount = "340282366920938463463374607431768211455".parse().unwrap();

        let sum = &max_u128 + &supply;
        assert_eq!(sum.to_string(), "340282366920938463463375607431768211455");
        assert_eq!(&sum - &supply, max_u128);

        let stored = sum.to_string();
        assert_eq!(Amount::from_stored(&stored).unwrap(), sum);
        assert!(sum > max_u128);
    }

    #[test]
    fn test_arithmetic_crosses_zero() {
        let small = Amount::from_u64(3);
        let big = Amount::from_u64(5);
        let diff = &small - &big;
        assert!(diff.is_negative());
        assert_eq!(diff.to_string(), "-2");
        assert_eq!(&diff + &big, small);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Amount::from_u64(42)).unwrap();
        assert_eq!(json, "\"42\"");
        let back: Amount = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(back, Amount::from_u64(42));
        assert!(serde_json::from_str::<Amount>("\"4.2\"").is_err());
    }

    #[test]
    fn test_from_stored_rejects_garbage() {
        assert!(Amount::from_stored("12x").is_err());
        assert_eq!(Amount::from_stored("12").unwrap(), Amount::from_u64(12));
    }
}
