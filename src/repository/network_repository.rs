// 网络数据访问 Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::pg_errors::{internal, is_unique_violation};
use crate::domain::{Network, WalletError, WalletResult};

#[async_trait]
pub trait NetworkRepository: Send + Sync {
    async fn save(&self, network: &mut Network) -> WalletResult<()>;

    async fn find_by_name(&self, name: &str) -> WalletResult<Network>;

    async fn find_by_id(&self, network_id: Uuid) -> WalletResult<Network>;

    async fn find_all_networks(&self) -> WalletResult<Vec<Network>>;
}

const NETWORK_COLUMNS: &str = "id, name, chain_id, rpc_url, is_active, created_at";

#[derive(sqlx::FromRow)]
struct NetworkRow {
    id: Uuid,
    name: String,
    chain_id: Option<i64>,
    rpc_url: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<NetworkRow> for Network {
    fn from(row: NetworkRow) -> Self {
        Network {
            id: row.id,
            name: row.name,
            chain_id: row.chain_id,
            rpc_url: row.rpc_url,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

pub struct PgNetworkRepository {
    pool: PgPool,
}

impl PgNetworkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NetworkRepository for PgNetworkRepository {
    async fn save(&self, network: &mut Network) -> WalletResult<()> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO networks (name, chain_id, rpc_url, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(&network.name)
        .bind(network.chain_id)
        .bind(&network.rpc_url)
        .bind(network.is_active)
        .bind(network.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return WalletError::DuplicateNetwork;
            }
            internal("insert network")(e)
        })?;

        network.id = id;
        tracing::info!(network_id = %id, name = %network.name, "network created");
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> WalletResult<Network> {
        let sql = format!("SELECT {NETWORK_COLUMNS} FROM networks WHERE name = $1");
        sqlx::query_as::<_, NetworkRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal("find network by name"))?
            .map(Network::from)
            .ok_or(WalletError::NetworkNotFound)
    }

    async fn find_by_id(&self, network_id: Uuid) -> WalletResult<Network> {
        let sql = format!("SELECT {NETWORK_COLUMNS} FROM networks WHERE id = $1");
        sqlx::query_as::<_, NetworkRow>(&sql)
            .bind(network_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal("find network by id"))?
            .map(Network::from)
            .ok_or(WalletError::NetworkNotFound)
    }

    async fn find_all_networks(&self) -> WalletResult<Vec<Network>> {
        let sql = format!("SELECT {NETWORK_COLUMNS} FROM networks ORDER BY name");
        let rows = sqlx::query_as::<_, NetworkRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(internal("list networks"))?;

        Ok(rows.into_iter().map(Network::from).collect())
    }
}
