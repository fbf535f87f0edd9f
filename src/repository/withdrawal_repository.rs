// 提现数据访问 Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::account_repository::{lock_account_row, write_balances};
use super::pg_errors::internal;
use crate::{
    domain::{
        Account, Amount, TransitionOutcome, WalletError, WalletResult, Withdrawal,
        WithdrawalStatus, WithdrawalTransition,
    },
    infrastructure::deadline::before_commit,
};

#[async_trait]
pub trait WithdrawalRepository: Send + Sync {
    /// 锁定资金并写入 Requested 记录，二者同一事务
    async fn create_with_lock(&self, withdrawal: &Withdrawal) -> WalletResult<Account>;

    async fn find_by_id(&self, withdrawal_id: Uuid) -> WalletResult<Withdrawal>;

    /// 状态变更与对应的账本操作同一事务；重放当前状态返回已存储记录
    async fn transition(
        &self,
        withdrawal_id: Uuid,
        transition: &WithdrawalTransition,
    ) -> WalletResult<Withdrawal>;

    async fn list_by_account(&self, account_id: Uuid) -> WalletResult<Vec<Withdrawal>>;

    async fn list_by_user(&self, user_id: &str) -> WalletResult<Vec<Withdrawal>>;

    /// 按优先级降序、创建时间升序
    async fn list_by_status(&self, status: WithdrawalStatus) -> WalletResult<Vec<Withdrawal>>;
}

const WITHDRAWAL_COLUMNS: &str = "w.id, w.account_id, w.asset_id, w.network_id, w.status, w.amount, \
     w.to_address, w.onchain_tx_id, w.network_fee, w.approved_by, w.failure_reason, w.priority, \
     w.created_at, w.updated_at";

#[derive(sqlx::FromRow)]
struct WithdrawalRow {
    id: Uuid,
    account_id: Uuid,
    asset_id: Uuid,
    network_id: Option<Uuid>,
    status: String,
    amount: String,
    to_address: String,
    onchain_tx_id: Option<String>,
    network_fee: String,
    approved_by: Option<String>,
    failure_reason: Option<String>,
    priority: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WithdrawalRow> for Withdrawal {
    type Error = WalletError;

    fn try_from(row: WithdrawalRow) -> Result<Self, Self::Error> {
        Ok(Withdrawal {
            id: row.id,
            account_id: row.account_id,
            asset_id: row.asset_id,
            network_id: row.network_id,
            status: row.status.parse()?,
            amount: Amount::from_stored(&row.amount)?,
            to_address: row.to_address,
            onchain_tx_id: row.onchain_tx_id,
            network_fee: Amount::from_stored(&row.network_fee)?,
            approved_by: row.approved_by,
            failure_reason: row.failure_reason,
            priority: row.priority,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

async fn lock_withdrawal_row(conn: &mut PgConnection, id: Uuid) -> WalletResult<Withdrawal> {
    let sql = format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals w WHERE w.id = $1 FOR UPDATE");
    sqlx::query_as::<_, WithdrawalRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(internal("lock withdrawal row"))?
        .ok_or(WalletError::WithdrawalNotFound)?
        .try_into()
}

pub struct PgWithdrawalRepository {
    pool: PgPool,
}

impl PgWithdrawalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_list(&self, sql: &str, bind: ListBind<'_>) -> WalletResult<Vec<Withdrawal>> {
        let query = sqlx::query_as::<_, WithdrawalRow>(sql);
        let query = match bind {
            ListBind::Id(id) => query.bind(id),
            ListBind::Text(text) => query.bind(text),
        };

        query
            .fetch_all(&self.pool)
            .await
            .map_err(internal("list withdrawals"))?
            .into_iter()
            .map(Withdrawal::try_from)
            .collect()
    }
}

enum ListBind<'a> {
    Id(Uuid),
    Text(&'a str),
}

/// 已写入、待提交的转换
enum Staged {
    Unchanged(Withdrawal),
    Changed {
        tx: Transaction<'static, Postgres>,
        withdrawal: Withdrawal,
        from: WithdrawalStatus,
    },
}

#[async_trait]
impl WithdrawalRepository for PgWithdrawalRepository {
    async fn create_with_lock(&self, withdrawal: &Withdrawal) -> WalletResult<Account> {
        let (tx, account) = before_commit(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(internal("begin withdrawal transaction"))?;

            let mut account = lock_account_row(&mut tx, withdrawal.account_id).await?;
            account.apply(&withdrawal.creation_op())?;
            write_balances(&mut tx, &account).await?;

            sqlx::query(
                "INSERT INTO withdrawals
                    (id, account_id, asset_id, network_id, status, amount, to_address, onchain_tx_id,
                     network_fee, approved_by, failure_reason, priority, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            )
            .bind(withdrawal.id)
            .bind(withdrawal.account_id)
            .bind(withdrawal.asset_id)
            .bind(withdrawal.network_id)
            .bind(withdrawal.status.as_str())
            .bind(withdrawal.amount.to_string())
            .bind(&withdrawal.to_address)
            .bind(&withdrawal.onchain_tx_id)
            .bind(withdrawal.network_fee.to_string())
            .bind(&withdrawal.approved_by)
            .bind(&withdrawal.failure_reason)
            .bind(withdrawal.priority)
            .bind(withdrawal.created_at)
            .bind(withdrawal.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(internal("insert withdrawal"))?;

            Ok::<_, WalletError>((tx, account))
        })
        .await?;

        tx.commit()
            .await
            .map_err(internal("commit withdrawal transaction"))?;

        tracing::info!(
            withdrawal_id = %withdrawal.id,
            account_id = %withdrawal.account_id,
            amount = %withdrawal.amount,
            "withdrawal requested, funds locked"
        );
        Ok(account)
    }

    async fn find_by_id(&self, withdrawal_id: Uuid) -> WalletResult<Withdrawal> {
        let sql = format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals w WHERE w.id = $1");
        sqlx::query_as::<_, WithdrawalRow>(&sql)
            .bind(withdrawal_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal("find withdrawal"))?
            .ok_or(WalletError::WithdrawalNotFound)?
            .try_into()
    }

    async fn transition(
        &self,
        withdrawal_id: Uuid,
        transition: &WithdrawalTransition,
    ) -> WalletResult<Withdrawal> {
        let staged = before_commit(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(internal("begin withdrawal transaction"))?;

            let mut withdrawal = lock_withdrawal_row(&mut tx, withdrawal_id).await?;
            let from = withdrawal.status;

            let ledger_op = match withdrawal.apply_transition(transition)? {
                TransitionOutcome::AlreadyApplied => {
                    tracing::debug!(
                        withdrawal_id = %withdrawal_id,
                        status = %from,
                        "withdrawal already in target state"
                    );
                    return Ok(Staged::Unchanged(withdrawal));
                }
                TransitionOutcome::Applied(op) => op,
            };

            if let Some(op) = ledger_op {
                let mut account = lock_account_row(&mut tx, withdrawal.account_id).await?;
                account.apply(&op)?;
                write_balances(&mut tx, &account).await?;
            }

            sqlx::query(
                "UPDATE withdrawals
                 SET status = $1, onchain_tx_id = $2, approved_by = $3, failure_reason = $4, updated_at = $5
                 WHERE id = $6",
            )
            .bind(withdrawal.status.as_str())
            .bind(&withdrawal.onchain_tx_id)
            .bind(&withdrawal.approved_by)
            .bind(&withdrawal.failure_reason)
            .bind(withdrawal.updated_at)
            .bind(withdrawal.id)
            .execute(&mut *tx)
            .await
            .map_err(internal("update withdrawal"))?;

            Ok::<_, WalletError>(Staged::Changed { tx, withdrawal, from })
        })
        .await?;

        let (tx, withdrawal, from) = match staged {
            Staged::Unchanged(withdrawal) => return Ok(withdrawal),
            Staged::Changed { tx, withdrawal, from } => (tx, withdrawal, from),
        };

        tx.commit()
            .await
            .map_err(internal("commit withdrawal transaction"))?;

        tracing::info!(
            withdrawal_id = %withdrawal_id,
            transition = transition.name(),
            from = %from,
            to = %withdrawal.status,
            "withdrawal status changed"
        );
        Ok(withdrawal)
    }

    async fn list_by_account(&self, account_id: Uuid) -> WalletResult<Vec<Withdrawal>> {
        let sql = format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals w
             WHERE w.account_id = $1
             ORDER BY w.created_at DESC"
        );
        self.fetch_list(&sql, ListBind::Id(account_id)).await
    }

    async fn list_by_user(&self, user_id: &str) -> WalletResult<Vec<Withdrawal>> {
        let sql = format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals w
             JOIN accounts a ON w.account_id = a.id
             WHERE a.user_id = $1
             ORDER BY w.created_at DESC"
        );
        self.fetch_list(&sql, ListBind::Text(user_id)).await
    }

    async fn list_by_status(&self, status: WithdrawalStatus) -> WalletResult<Vec<Withdrawal>> {
        let sql = format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals w
             WHERE w.status = $1
             ORDER BY w.priority DESC, w.created_at ASC"
        );
        self.fetch_list(&sql, ListBind::Text(status.as_str())).await
    }
}
