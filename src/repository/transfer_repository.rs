// 内部转账数据访问 Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::account_repository::{lock_account_row, write_balances};
use super::pg_errors::{internal, is_unique_violation};
use crate::{
    domain::{Amount, InternalTransfer, WalletError, WalletResult},
    infrastructure::deadline::before_commit,
};

#[async_trait]
pub trait TransferRepository: Send + Sync {
    /// 出账、入账与转账记录同一事务；账户行按 ID 升序加锁
    async fn execute(&self, transfer: &InternalTransfer) -> WalletResult<()>;

    async fn find_by_id(&self, transfer_id: Uuid) -> WalletResult<InternalTransfer>;
}

#[derive(sqlx::FromRow)]
struct TransferRow {
    id: Uuid,
    from_account_id: Uuid,
    to_account_id: Uuid,
    asset_id: Uuid,
    amount: String,
    reference_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransferRow> for InternalTransfer {
    type Error = WalletError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        Ok(InternalTransfer {
            id: row.id,
            from_account_id: row.from_account_id,
            to_account_id: row.to_account_id,
            asset_id: row.asset_id,
            amount: Amount::from_stored(&row.amount)?,
            reference_id: row.reference_id,
            created_at: row.created_at,
        })
    }
}

pub struct PgTransferRepository {
    pool: PgPool,
}

impl PgTransferRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransferRepository for PgTransferRepository {
    async fn execute(&self, transfer: &InternalTransfer) -> WalletResult<()> {
        let tx = before_commit(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(internal("begin transfer transaction"))?;

            // 固定加锁顺序，两个方向相反的并发转账不会互相等待
            let (first, second) = if transfer.from_account_id < transfer.to_account_id {
                (transfer.from_account_id, transfer.to_account_id)
            } else {
                (transfer.to_account_id, transfer.from_account_id)
            };
            let first = lock_account_row(&mut tx, first).await?;
            let second = lock_account_row(&mut tx, second).await?;

            let (mut from, mut to) = if first.id == transfer.from_account_id {
                (first, second)
            } else {
                (second, first)
            };
            if from.asset_id != transfer.asset_id || to.asset_id != transfer.asset_id {
                return Err(WalletError::AccountNotFound);
            }

            from.apply(&transfer.debit_op())?;
            to.apply(&transfer.credit_op())?;
            write_balances(&mut tx, &from).await?;
            write_balances(&mut tx, &to).await?;

            sqlx::query(
                "INSERT INTO internal_transfers
                    (id, from_account_id, to_account_id, asset_id, amount, reference_id, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(transfer.id)
            .bind(transfer.from_account_id)
            .bind(transfer.to_account_id)
            .bind(transfer.asset_id)
            .bind(transfer.amount.to_string())
            .bind(&transfer.reference_id)
            .bind(transfer.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return WalletError::DuplicateTransfer;
                }
                internal("insert internal transfer")(e)
            })?;

            Ok::<_, WalletError>(tx)
        })
        .await?;

        tx.commit()
            .await
            .map_err(internal("commit transfer transaction"))?;

        tracing::info!(
            transfer_id = %transfer.id,
            from_account_id = %transfer.from_account_id,
            to_account_id = %transfer.to_account_id,
            amount = %transfer.amount,
            "internal transfer executed"
        );
        Ok(())
    }

    async fn find_by_id(&self, transfer_id: Uuid) -> WalletResult<InternalTransfer> {
        sqlx::query_as::<_, TransferRow>(
            "SELECT id, from_account_id, to_account_id, asset_id, amount, reference_id, created_at
             FROM internal_transfers WHERE id = $1",
        )
        .bind(transfer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal("find internal transfer"))?
        .ok_or(WalletError::TransferNotFound)?
        .try_into()
    }
}
