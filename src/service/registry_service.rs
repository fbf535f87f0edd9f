//! 资产 / 网络注册表（管理端）

use std::time::Duration;

use crate::{
    domain::{normalize_symbol, Amount, Asset, AssetNetwork, AssetType, Network, WalletResult},
    infrastructure::deadline::run_mutation,
    repository::Repositories,
};

/// 创建资产时一并写入的网络链接
#[derive(Debug, Clone)]
pub struct NetworkLinkSpec {
    pub network: String,
    pub contract_address: Option<String>,
    pub min_withdrawal: Amount,
    pub withdrawal_fee: Amount,
}

#[derive(Debug, Clone)]
pub struct NewAsset {
    pub symbol: String,
    pub name: String,
    pub asset_type: AssetType,
    pub precision: u8,
    pub networks: Vec<NetworkLinkSpec>,
}

#[derive(Clone)]
pub struct RegistryService {
    repos: Repositories,
    timeout: Duration,
}

impl RegistryService {
    pub fn new(repos: Repositories, timeout: Duration) -> Self {
        Self { repos, timeout }
    }

    async fn resolve_link(&self, spec: &NetworkLinkSpec) -> WalletResult<AssetNetwork> {
        let network = self.repos.networks.find_by_name(spec.network.trim()).await?;
        AssetNetwork::new(
            network.id,
            spec.contract_address.clone(),
            spec.min_withdrawal.clone(),
            spec.withdrawal_fee.clone(),
        )
    }

    /// 资产与其网络链接原子创建
    pub async fn create_asset(&self, input: NewAsset) -> WalletResult<Asset> {
        let mut asset = Asset::new(&input.symbol, &input.name, input.asset_type, input.precision)?;
        for spec in &input.networks {
            asset = asset.with_network(self.resolve_link(spec).await?);
        }

        let assets = self.repos.assets.clone();
        run_mutation(self.timeout, "create_asset", async move {
            assets.save(&mut asset).await?;
            Ok(asset)
        })
        .await
    }

    pub async fn create_network(
        &self,
        name: &str,
        rpc_url: &str,
        chain_id: Option<i64>,
    ) -> WalletResult<Network> {
        let mut network = Network::new(name, rpc_url, chain_id)?;
        self.repos.networks.save(&mut network).await?;
        Ok(network)
    }

    pub async fn add_asset_to_network(
        &self,
        asset_symbol: &str,
        spec: NetworkLinkSpec,
    ) -> WalletResult<AssetNetwork> {
        let asset = self
            .repos
            .assets
            .find_asset_by_symbol(&normalize_symbol(asset_symbol))
            .await?;
        let mut link = self.resolve_link(&spec).await?;
        link.asset_id = asset.id;

        self.repos.assets.add_asset_to_network(&link).await?;
        Ok(link)
    }

    pub async fn get_asset(&self, symbol: &str) -> WalletResult<Asset> {
        self.repos
            .assets
            .find_asset_by_symbol(&normalize_symbol(symbol))
            .await
    }

    pub async fn list_assets(&self) -> WalletResult<Vec<Asset>> {
        self.repos.assets.find_all_assets().await
    }

    pub async fn list_networks(&self) -> WalletResult<Vec<Network>> {
        self.repos.networks.find_all_networks().await
    }
}
