//! Repository 抽象层
//!
//! 每个存储契约一个 trait，`Pg*` 为 PostgreSQL 实现，`memory::MemoryStore` 为内存实现。

use std::sync::Arc;

use sqlx::PgPool;

pub mod account_repository;
pub mod asset_repository;
pub mod deposit_address_repository;
pub mod deposit_repository;
pub mod memory;
pub mod network_repository;
mod pg_errors;
pub mod transfer_repository;
pub mod withdrawal_repository;

pub use account_repository::{AccountRepository, PgAccountRepository};
pub use asset_repository::{AssetRepository, PgAssetRepository};
pub use deposit_address_repository::{DepositAddressRepository, PgDepositAddressRepository};
pub use deposit_repository::{DepositRepository, PgDepositRepository};
pub use memory::MemoryStore;
pub use network_repository::{NetworkRepository, PgNetworkRepository};
pub use transfer_repository::{PgTransferRepository, TransferRepository};
pub use withdrawal_repository::{PgWithdrawalRepository, WithdrawalRepository};

/// 服务层使用的全部存储
#[derive(Clone)]
pub struct Repositories {
    pub accounts: Arc<dyn AccountRepository>,
    pub assets: Arc<dyn AssetRepository>,
    pub networks: Arc<dyn NetworkRepository>,
    pub withdrawals: Arc<dyn WithdrawalRepository>,
    pub deposits: Arc<dyn DepositRepository>,
    pub deposit_addresses: Arc<dyn DepositAddressRepository>,
    pub transfers: Arc<dyn TransferRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            accounts: Arc::new(PgAccountRepository::new(pool.clone())),
            assets: Arc::new(PgAssetRepository::new(pool.clone())),
            networks: Arc::new(PgNetworkRepository::new(pool.clone())),
            withdrawals: Arc::new(PgWithdrawalRepository::new(pool.clone())),
            deposits: Arc::new(PgDepositRepository::new(pool.clone())),
            deposit_addresses: Arc::new(PgDepositAddressRepository::new(pool.clone())),
            transfers: Arc::new(PgTransferRepository::new(pool)),
        }
    }

    /// 所有契约共享同一个 `MemoryStore`
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            accounts: store.clone(),
            assets: store.clone(),
            networks: store.clone(),
            withdrawals: store.clone(),
            deposits: store.clone(),
            deposit_addresses: store.clone(),
            transfers: store,
        }
    }
}
