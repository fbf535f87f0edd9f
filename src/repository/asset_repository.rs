// 资产数据访问 Repository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::pg_errors::{constraint_name, internal, is_foreign_key_violation, is_unique_violation};
use crate::{
    domain::{Amount, Asset, AssetNetwork, AssetType, WalletError, WalletResult},
    infrastructure::deadline::before_commit,
};

#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// 资产行与全部 `supported_networks` 行在同一事务内写入，任一失败整体回滚；
    /// 读取时链接保持写入顺序
    async fn save(&self, asset: &mut Asset) -> WalletResult<()>;

    async fn add_asset_to_network(&self, link: &AssetNetwork) -> WalletResult<()>;

    async fn find_asset_by_symbol(&self, symbol: &str) -> WalletResult<Asset>;

    async fn find_by_id(&self, asset_id: Uuid) -> WalletResult<Asset>;

    async fn find_all_assets(&self) -> WalletResult<Vec<Asset>>;
}

const ASSET_COLUMNS: &str =
    "id, symbol, name, asset_type, decimals, is_active, created_at, updated_at";
const LINK_COLUMNS: &str =
    "asset_id, network_id, contract_address, min_withdrawal, withdrawal_fee, is_active";

#[derive(sqlx::FromRow)]
struct AssetRow {
    id: Uuid,
    symbol: String,
    name: String,
    asset_type: String,
    decimals: i16,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssetRow {
    fn into_asset(self, supported_networks: Vec<AssetNetwork>) -> WalletResult<Asset> {
        let asset_type: AssetType = self.asset_type.parse().map_err(|_| {
            tracing::error!(asset_id = %self.id, "stored asset has unknown type");
            WalletError::Internal("corrupted asset type".into())
        })?;
        let precision = u8::try_from(self.decimals)
            .map_err(|_| WalletError::Internal("corrupted asset precision".into()))?;

        Ok(Asset {
            id: self.id,
            symbol: self.symbol,
            name: self.name,
            asset_type,
            precision,
            is_active: self.is_active,
            supported_networks,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AssetNetworkRow {
    asset_id: Uuid,
    network_id: Uuid,
    contract_address: Option<String>,
    min_withdrawal: String,
    withdrawal_fee: String,
    is_active: bool,
}

impl TryFrom<AssetNetworkRow> for AssetNetwork {
    type Error = WalletError;

    fn try_from(row: AssetNetworkRow) -> Result<Self, Self::Error> {
        Ok(AssetNetwork {
            asset_id: row.asset_id,
            network_id: row.network_id,
            contract_address: row.contract_address,
            min_withdrawal: Amount::from_stored(&row.min_withdrawal)?,
            withdrawal_fee: Amount::from_stored(&row.withdrawal_fee)?,
            is_active: row.is_active,
        })
    }
}

/// 链接写入失败的错误翻译
fn link_error(err: sqlx::Error) -> WalletError {
    if is_unique_violation(&err) {
        return WalletError::DuplicateAssetNetwork;
    }
    if is_foreign_key_violation(&err) {
        return match constraint_name(&err) {
            Some(name) if name.contains("asset_id") => WalletError::AssetNotFound,
            _ => WalletError::NetworkNotFound,
        };
    }
    internal("insert asset network")(err)
}

async fn insert_link(conn: &mut PgConnection, link: &AssetNetwork) -> WalletResult<()> {
    sqlx::query(
        "INSERT INTO asset_networks
            (asset_id, network_id, contract_address, min_withdrawal, withdrawal_fee, is_active)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(link.asset_id)
    .bind(link.network_id)
    .bind(&link.contract_address)
    .bind(link.min_withdrawal.to_string())
    .bind(link.withdrawal_fee.to_string())
    .bind(link.is_active)
    .execute(&mut *conn)
    .await
    .map_err(link_error)?;

    Ok(())
}

pub struct PgAssetRepository {
    pool: PgPool,
}

impl PgAssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_links(&self, asset_ids: &[Uuid]) -> WalletResult<HashMap<Uuid, Vec<AssetNetwork>>> {
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM asset_networks
             WHERE asset_id = ANY($1)
             ORDER BY position"
        );
        let rows = sqlx::query_as::<_, AssetNetworkRow>(&sql)
            .bind(asset_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(internal("load asset networks"))?;

        let mut links: HashMap<Uuid, Vec<AssetNetwork>> = HashMap::new();
        for row in rows {
            let link = AssetNetwork::try_from(row)?;
            links.entry(link.asset_id).or_default().push(link);
        }
        Ok(links)
    }

    async fn hydrate(&self, rows: Vec<AssetRow>) -> WalletResult<Vec<Asset>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut links = self.load_links(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let networks = links.remove(&row.id).unwrap_or_default();
                row.into_asset(networks)
            })
            .collect()
    }
}

#[async_trait]
impl AssetRepository for PgAssetRepository {
    async fn save(&self, asset: &mut Asset) -> WalletResult<()> {
        tracing::debug!(symbol = %asset.symbol, networks = asset.supported_networks.len(), "saving a new asset");

        let mut links = asset.supported_networks.clone();
        let (tx, id) = before_commit(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(internal("begin asset transaction"))?;

            let id: Uuid = sqlx::query_scalar(
                "INSERT INTO assets (symbol, name, asset_type, decimals, is_active, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 RETURNING id",
            )
            .bind(&asset.symbol)
            .bind(&asset.name)
            .bind(asset.asset_type.as_str())
            .bind(i16::from(asset.precision))
            .bind(asset.is_active)
            .bind(asset.created_at)
            .bind(asset.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return WalletError::DuplicateAsset;
                }
                internal("insert asset")(e)
            })?;

            // 逐条插入，position 按插入顺序递增
            for link in links.iter_mut() {
                link.asset_id = id;
                insert_link(&mut tx, link).await?;
            }

            Ok::<_, WalletError>((tx, id))
        })
        .await?;

        tx.commit().await.map_err(internal("commit asset transaction"))?;

        asset.id = id;
        asset.supported_networks = links;
        tracing::info!(asset_id = %id, symbol = %asset.symbol, "asset created");
        Ok(())
    }

    async fn add_asset_to_network(&self, link: &AssetNetwork) -> WalletResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(internal("acquire connection"))?;
        insert_link(&mut conn, link).await?;

        tracing::info!(asset_id = %link.asset_id, network_id = %link.network_id, "asset linked to network");
        Ok(())
    }

    async fn find_asset_by_symbol(&self, symbol: &str) -> WalletResult<Asset> {
        let sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE symbol = $1");
        let row = sqlx::query_as::<_, AssetRow>(&sql)
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal("find asset by symbol"))?
            .ok_or(WalletError::AssetNotFound)?;

        self.hydrate(vec![row])
            .await?
            .pop()
            .ok_or(WalletError::AssetNotFound)
    }

    async fn find_by_id(&self, asset_id: Uuid) -> WalletResult<Asset> {
        let sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = $1");
        let row = sqlx::query_as::<_, AssetRow>(&sql)
            .bind(asset_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal("find asset by id"))?
            .ok_or(WalletError::AssetNotFound)?;

        self.hydrate(vec![row])
            .await?
            .pop()
            .ok_or(WalletError::AssetNotFound)
    }

    async fn find_all_assets(&self) -> WalletResult<Vec<Asset>> {
        let sql = format!("SELECT {ASSET_COLUMNS} FROM assets ORDER BY symbol");
        let rows = sqlx::query_as::<_, AssetRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(internal("list assets"))?;

        self.hydrate(rows).await
    }
}
