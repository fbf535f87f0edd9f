//! Krypton Wallet - 托管钱包账本服务
//!
//! 每个用户每种资产一个账户，余额分为可用与锁定两部分；
//! 提现先锁定资金，确认后结算，失败或取消时退回。

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;
pub mod service;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode};

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        domain::{Account, Amount, Asset, Withdrawal, WithdrawalStatus, WalletError},
        error::{AppError, AppErrorCode},
        repository::Repositories,
    };
}
