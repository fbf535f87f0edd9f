use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    config::Config,
    repository::Repositories,
    service::{DepositService, RegistryService, TransferService, WalletService, WithdrawalWorkflow},
};

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    /// 内存存储模式下为 None
    pub pool: Option<PgPool>,
    pub config: Arc<Config>,
    pub wallet: WalletService,
    pub withdrawals: WithdrawalWorkflow,
    pub registry: RegistryService,
    pub deposits: DepositService,
    pub transfers: TransferService,
}

impl AppState {
    pub fn new(config: Arc<Config>, repos: Repositories, pool: Option<PgPool>) -> Self {
        let timeout = config.ledger.operation_timeout();

        Self {
            pool,
            wallet: WalletService::new(repos.clone(), timeout),
            withdrawals: WithdrawalWorkflow::new(repos.clone(), timeout),
            registry: RegistryService::new(repos.clone(), timeout),
            deposits: DepositService::new(repos.clone(), timeout),
            transfers: TransferService::new(repos, timeout),
            config,
        }
    }

    /// PostgreSQL 存储
    pub fn with_postgres(config: Arc<Config>, pool: PgPool) -> Self {
        let repos = Repositories::postgres(pool.clone());
        Self::new(config, repos, Some(pool))
    }

    /// 内存存储（测试与本地联调）
    pub fn in_memory(config: Arc<Config>) -> Self {
        Self::new(config, Repositories::in_memory(), None)
    }
}
