//! Domain 模块
//!
//! 账本核心：余额算术、提现状态机、资产/网络元数据。不做任何 I/O。

pub mod account;
pub mod amount;
pub mod asset;
pub mod deposit;
pub mod deposit_address;
pub mod errors;
pub mod network;
pub mod transfer;
pub mod withdrawal;

// 重新导出常用类型
pub use account::{Account, Balances, LedgerOp, UserAccount};
pub use amount::Amount;
pub use asset::{normalize_symbol, Asset, AssetNetwork, AssetType};
pub use deposit::{Deposit, DepositStatus};
pub use deposit_address::DepositAddress;
pub use errors::{ErrorKind, WalletError, WalletResult};
pub use network::Network;
pub use transfer::InternalTransfer;
pub use withdrawal::{
    TransitionOutcome, Withdrawal, WithdrawalStateMachine, WithdrawalStatus, WithdrawalTransition,
};
