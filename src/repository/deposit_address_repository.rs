// 充值地址数据访问 Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::pg_errors::{internal, is_foreign_key_violation, is_unique_violation};
use crate::domain::{DepositAddress, WalletError, WalletResult};

#[async_trait]
pub trait DepositAddressRepository: Send + Sync {
    /// 分配 ID；账户已有地址或地址已被占用时返回 DuplicateDepositAddress
    async fn save(&self, address: &mut DepositAddress) -> WalletResult<()>;

    async fn find_by_account_id(&self, account_id: Uuid) -> WalletResult<DepositAddress>;
}

#[derive(sqlx::FromRow)]
struct DepositAddressRow {
    id: Uuid,
    account_id: Uuid,
    address: String,
    derivation_path: String,
    memo_tag: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<DepositAddressRow> for DepositAddress {
    fn from(row: DepositAddressRow) -> Self {
        DepositAddress {
            id: row.id,
            account_id: row.account_id,
            address: row.address,
            derivation_path: row.derivation_path,
            memo_tag: row.memo_tag,
            created_at: row.created_at,
        }
    }
}

pub struct PgDepositAddressRepository {
    pool: PgPool,
}

impl PgDepositAddressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DepositAddressRepository for PgDepositAddressRepository {
    async fn save(&self, address: &mut DepositAddress) -> WalletResult<()> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO deposit_addresses (account_id, address, derivation_path, memo_tag, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(address.account_id)
        .bind(&address.address)
        .bind(&address.derivation_path)
        .bind(&address.memo_tag)
        .bind(address.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return WalletError::DuplicateDepositAddress;
            }
            if is_foreign_key_violation(&e) {
                return WalletError::AccountNotFound;
            }
            internal("insert deposit address")(e)
        })?;

        address.id = id;
        tracing::info!(
            deposit_address_id = %id,
            account_id = %address.account_id,
            "deposit address assigned"
        );
        Ok(())
    }

    async fn find_by_account_id(&self, account_id: Uuid) -> WalletResult<DepositAddress> {
        sqlx::query_as::<_, DepositAddressRow>(
            "SELECT id, account_id, address, derivation_path, memo_tag, created_at
             FROM deposit_addresses WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal("find deposit address"))?
        .map(DepositAddress::from)
        .ok_or(WalletError::DepositAddressNotFound)
    }
}
