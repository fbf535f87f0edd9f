// 充值数据访问 Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::account_repository::{lock_account_row, write_balances};
use super::pg_errors::{internal, is_foreign_key_violation, is_unique_violation};
use crate::{
    domain::{Amount, Deposit, WalletError, WalletResult},
    infrastructure::deadline::before_commit,
};

#[async_trait]
pub trait DepositRepository: Send + Sync {
    /// 同一资产的 onchain_tx_id 只能记录一次
    async fn record(&self, deposit: &Deposit) -> WalletResult<()>;

    async fn find_by_id(&self, deposit_id: Uuid) -> WalletResult<Deposit>;

    /// 标记确认并入账，同一事务；已确认时不重复入账
    async fn confirm(&self, deposit_id: Uuid, confirmations: i32) -> WalletResult<Deposit>;
}

const DEPOSIT_COLUMNS: &str = "id, account_id, asset_id, status, amount, onchain_tx_id, \
     from_address, confirmations, created_at, confirmed_at";

#[derive(sqlx::FromRow)]
struct DepositRow {
    id: Uuid,
    account_id: Uuid,
    asset_id: Uuid,
    status: String,
    amount: String,
    onchain_tx_id: String,
    from_address: String,
    confirmations: i32,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
}

impl TryFrom<DepositRow> for Deposit {
    type Error = WalletError;

    fn try_from(row: DepositRow) -> Result<Self, Self::Error> {
        Ok(Deposit {
            id: row.id,
            account_id: row.account_id,
            asset_id: row.asset_id,
            status: row.status.parse()?,
            amount: Amount::from_stored(&row.amount)?,
            onchain_tx_id: row.onchain_tx_id,
            from_address: row.from_address,
            confirmations: row.confirmations,
            created_at: row.created_at,
            confirmed_at: row.confirmed_at,
        })
    }
}

pub struct PgDepositRepository {
    pool: PgPool,
}

impl PgDepositRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DepositRepository for PgDepositRepository {
    async fn record(&self, deposit: &Deposit) -> WalletResult<()> {
        sqlx::query(
            "INSERT INTO deposits
                (id, account_id, asset_id, status, amount, onchain_tx_id, from_address,
                 confirmations, created_at, confirmed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(deposit.id)
        .bind(deposit.account_id)
        .bind(deposit.asset_id)
        .bind(deposit.status.as_str())
        .bind(deposit.amount.to_string())
        .bind(&deposit.onchain_tx_id)
        .bind(&deposit.from_address)
        .bind(deposit.confirmations)
        .bind(deposit.created_at)
        .bind(deposit.confirmed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return WalletError::DuplicateDeposit;
            }
            if is_foreign_key_violation(&e) {
                return WalletError::AccountNotFound;
            }
            internal("insert deposit")(e)
        })?;

        tracing::info!(
            deposit_id = %deposit.id,
            account_id = %deposit.account_id,
            onchain_tx_id = %deposit.onchain_tx_id,
            amount = %deposit.amount,
            "deposit recorded"
        );
        Ok(())
    }

    async fn find_by_id(&self, deposit_id: Uuid) -> WalletResult<Deposit> {
        let sql = format!("SELECT {DEPOSIT_COLUMNS} FROM deposits WHERE id = $1");
        sqlx::query_as::<_, DepositRow>(&sql)
            .bind(deposit_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal("find deposit"))?
            .ok_or(WalletError::DepositNotFound)?
            .try_into()
    }

    async fn confirm(&self, deposit_id: Uuid, confirmations: i32) -> WalletResult<Deposit> {
        let (tx, deposit, credited) = before_commit(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(internal("begin deposit transaction"))?;

            let sql = format!("SELECT {DEPOSIT_COLUMNS} FROM deposits WHERE id = $1 FOR UPDATE");
            let mut deposit: Deposit = sqlx::query_as::<_, DepositRow>(&sql)
                .bind(deposit_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(internal("lock deposit row"))?
                .ok_or(WalletError::DepositNotFound)?
                .try_into()?;

            let credit = deposit.confirm(confirmations);
            let credited = credit.is_some();
            if let Some(op) = credit {
                let mut account = lock_account_row(&mut tx, deposit.account_id).await?;
                account.apply(&op)?;
                write_balances(&mut tx, &account).await?;
            }

            sqlx::query(
                "UPDATE deposits SET status = $1, confirmations = $2, confirmed_at = $3 WHERE id = $4",
            )
            .bind(deposit.status.as_str())
            .bind(deposit.confirmations)
            .bind(deposit.confirmed_at)
            .bind(deposit.id)
            .execute(&mut *tx)
            .await
            .map_err(internal("update deposit"))?;

            Ok::<_, WalletError>((tx, deposit, credited))
        })
        .await?;

        tx.commit()
            .await
            .map_err(internal("commit deposit transaction"))?;

        if credited {
            tracing::info!(
                deposit_id = %deposit.id,
                account_id = %deposit.account_id,
                amount = %deposit.amount,
                "deposit confirmed and credited"
            );
        } else {
            tracing::debug!(deposit_id = %deposit.id, "deposit already confirmed");
        }
        Ok(deposit)
    }
}
