// 账户数据访问 Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::pg_errors::{internal, is_foreign_key_violation};
use crate::{
    domain::{Account, Amount, LedgerOp, UserAccount, WalletError, WalletResult},
    infrastructure::deadline::before_commit,
};

// ============ Repository Trait ============

/// 账本唯一的并发串行化点
///
/// 对同一账户的所有 `apply` 调用必须是可线性化的：
/// 不会出现两个并发操作都基于同一个旧余额计算的情况。
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// 持久化新账户并分配 ID（不做余额校验，账本已保证非负）
    async fn save(&self, account: &mut Account) -> WalletResult<()>;

    /// 原子的 get-or-create：并发首次访问同一 `(user_id, asset_id)` 只会产生一行
    async fn find_or_create(&self, user_id: &str, asset_id: Uuid) -> WalletResult<Account>;

    async fn find_account(&self, user_id: &str, asset_id: Uuid) -> WalletResult<Account>;

    async fn find_by_id(&self, account_id: Uuid) -> WalletResult<Account>;

    /// 用户全部账户（附带资产符号），同一会话内顺序稳定
    async fn find_user_accounts(&self, user_id: &str) -> WalletResult<Vec<UserAccount>>;

    /// 行锁内执行一次余额变更
    async fn apply(&self, account_id: Uuid, op: LedgerOp) -> WalletResult<Account>;
}

// ============ 行映射 ============

pub(crate) const ACCOUNT_COLUMNS: &str =
    "id, user_id, asset_id, balance, locked_balance, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct AccountRow {
    id: Uuid,
    user_id: String,
    asset_id: Uuid,
    balance: String,
    locked_balance: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = WalletError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Account::restore(
            row.id,
            row.user_id,
            row.asset_id,
            Amount::from_stored(&row.balance)?,
            Amount::from_stored(&row.locked_balance)?,
            row.created_at,
            row.updated_at,
        )
    }
}

#[derive(sqlx::FromRow)]
struct UserAccountRow {
    #[sqlx(flatten)]
    account: AccountRow,
    symbol: String,
}

/// `SELECT ... FOR UPDATE` 锁定账户行（必须在事务内调用）
pub(crate) async fn lock_account_row(
    conn: &mut PgConnection,
    account_id: Uuid,
) -> WalletResult<Account> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, AccountRow>(&sql)
        .bind(account_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(internal("lock account row"))?;

    row.ok_or(WalletError::AccountNotFound)?.try_into()
}

/// 写回余额对（必须持有行锁）
pub(crate) async fn write_balances(conn: &mut PgConnection, account: &Account) -> WalletResult<()> {
    sqlx::query(
        "UPDATE accounts SET balance = $1, locked_balance = $2, updated_at = $3 WHERE id = $4",
    )
    .bind(account.balance().to_string())
    .bind(account.locked_balance().to_string())
    .bind(account.updated_at)
    .bind(account.id)
    .execute(&mut *conn)
    .await
    .map_err(internal("update account balances"))?;

    Ok(())
}

// ============ PostgreSQL 实现 ============

pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn save(&self, account: &mut Account) -> WalletResult<()> {
        tracing::debug!(
            user_id = %account.user_id,
            asset_id = %account.asset_id,
            "saving a new account"
        );

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO accounts (user_id, asset_id, balance, locked_balance, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(&account.user_id)
        .bind(account.asset_id)
        .bind(account.balance().to_string())
        .bind(account.locked_balance().to_string())
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return WalletError::AssetNotFound;
            }
            internal("save account")(e)
        })?;

        account.id = id;
        Ok(())
    }

    async fn find_or_create(&self, user_id: &str, asset_id: Uuid) -> WalletResult<Account> {
        let fresh = Account::new(user_id, asset_id)?;

        // 条件插入：唯一约束是去重的唯一依据，冲突时回读已存在的行
        let sql = format!(
            "INSERT INTO accounts (user_id, asset_id, balance, locked_balance, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (user_id, asset_id) DO NOTHING
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(&fresh.user_id)
            .bind(fresh.asset_id)
            .bind(fresh.balance().to_string())
            .bind(fresh.locked_balance().to_string())
            .bind(fresh.created_at)
            .bind(fresh.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    return WalletError::AssetNotFound;
                }
                internal("find or create account")(e)
            })?;

        match inserted {
            Some(row) => {
                tracing::debug!(user_id = %fresh.user_id, asset_id = %asset_id, "account created");
                row.try_into()
            }
            None => self.find_account(&fresh.user_id, asset_id).await,
        }
    }

    async fn find_account(&self, user_id: &str, asset_id: Uuid) -> WalletResult<Account> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = $1 AND asset_id = $2");
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(user_id)
            .bind(asset_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal("find account"))?;

        row.ok_or(WalletError::AccountNotFound)?.try_into()
    }

    async fn find_by_id(&self, account_id: Uuid) -> WalletResult<Account> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal("find account by id"))?;

        row.ok_or(WalletError::AccountNotFound)?.try_into()
    }

    async fn find_user_accounts(&self, user_id: &str) -> WalletResult<Vec<UserAccount>> {
        let rows = sqlx::query_as::<_, UserAccountRow>(
            "SELECT a.id, a.user_id, a.asset_id, a.balance, a.locked_balance,
                    a.created_at, a.updated_at, s.symbol
             FROM accounts a JOIN assets s ON a.asset_id = s.id
             WHERE a.user_id = $1
             ORDER BY s.symbol",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal("query user accounts"))?;

        rows.into_iter()
            .map(|row| {
                Ok(UserAccount {
                    account: row.account.try_into()?,
                    asset_symbol: row.symbol,
                })
            })
            .collect()
    }

    async fn apply(&self, account_id: Uuid, op: LedgerOp) -> WalletResult<Account> {
        let (tx, account) = before_commit(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(internal("begin account transaction"))?;

            let mut account = lock_account_row(&mut tx, account_id).await?;
            account.apply(&op)?;
            write_balances(&mut tx, &account).await?;
            Ok::<_, WalletError>((tx, account))
        })
        .await?;

        tx.commit()
            .await
            .map_err(internal("commit account transaction"))?;

        tracing::info!(
            account_id = %account_id,
            op = op.as_str(),
            amount = %op.amount(),
            balance = %account.balance(),
            locked_balance = %account.locked_balance(),
            "ledger operation applied"
        );
        Ok(account)
    }
}
