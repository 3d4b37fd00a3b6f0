//! THORNode API, RPC, and Nine Realms client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::ClientError;

/// A network node as reported by the THORNode API.
#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub observe_chains: Vec<ChainHeight>,
}

/// Latest block height a node has observed on one external chain.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainHeight {
    pub chain: String,
    #[serde(default)]
    pub height: i64,
}

/// Invariant status as reported by the THORNode API.
#[derive(Debug, Clone, Deserialize)]
pub struct InvariantResponse {
    pub invariant: String,
    pub broken: bool,
    #[serde(default)]
    pub msg: Vec<String>,
}

/// An Asgard vault in the solvency snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct Vault {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub addresses: Vec<VaultAddress>,
    #[serde(default)]
    pub coins: Vec<VaultCoin>,
    #[serde(default)]
    pub pub_key: String,
    #[serde(rename = "type", default)]
    pub vault_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultAddress {
    pub chain: String,
    pub address: String,
}

/// One coin balance in a vault; amounts arrive as decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultCoin {
    pub asset: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub chain_amount: String,
}

/// A published container image and its current content hash.
#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub repo: String,
    pub tag: String,
    #[serde(default)]
    pub hash: String,
}

/// A transaction awaiting outbound processing.
#[derive(Debug, Clone, Deserialize)]
pub struct TxOutItem {
    #[serde(default)]
    pub in_hash: Option<String>,
    pub coin: OutboundCoin,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutboundCoin {
    pub asset: String,
    pub amount: String,
}

/// Details for an observed inbound transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct TxDetails {
    #[serde(default)]
    pub finalised_height: Option<i64>,
}

#[derive(Deserialize)]
struct InvariantsResponse {
    invariants: Vec<String>,
}

#[derive(Deserialize)]
struct RpcStatus {
    result: RpcStatusResult,
}

#[derive(Deserialize)]
struct RpcStatusResult {
    sync_info: RpcSyncInfo,
}

#[derive(Deserialize)]
struct RpcSyncInfo {
    latest_block_height: String,
}

/// The data-fetching capability the monitors poll each cycle. Any call
/// failing means the whole check cycle fails.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThornodeDataSource: Send + Sync {
    async fn get_latest_height(&self) -> Result<i64, ClientError>;
    async fn get_nodes(&self) -> Result<Vec<Node>, ClientError>;
    async fn get_invariants(&self) -> Result<Vec<String>, ClientError>;
    async fn get_invariant(&self, invariant: &str) -> Result<InvariantResponse, ClientError>;
    async fn get_asgard_vaults(&self) -> Result<Vec<Vault>, ClientError>;
    async fn get_images(&self) -> Result<Vec<Image>, ClientError>;
    async fn get_pending_outbounds(&self) -> Result<Vec<TxOutItem>, ClientError>;
    async fn get_tx_details(&self, in_hash: &str) -> Result<TxDetails, ClientError>;
}

/// Live client over the THORNode HTTP API, its RPC endpoint, and the
/// Nine Realms API.
pub struct ThornodeClient {
    client: Client,
    api_url: String,
    rpc_url: String,
    ninerealms_url: String,
}

impl ThornodeClient {
    pub fn new(
        api_url: String,
        rpc_url: String,
        ninerealms_url: String,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(Self {
            client,
            api_url,
            rpc_url,
            ninerealms_url,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ClientError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::Api(format!(
                "request to {} failed with status {}",
                url,
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ThornodeDataSource for ThornodeClient {
    /// Returns the latest THORChain block height from the RPC endpoint.
    async fn get_latest_height(&self) -> Result<i64, ClientError> {
        let status: RpcStatus = self.get_json(format!("{}/status", self.rpc_url)).await?;
        status
            .result
            .sync_info
            .latest_block_height
            .parse::<i64>()
            .map_err(|e| ClientError::Parse(format!("invalid latest block height: {}", e)))
    }

    async fn get_nodes(&self) -> Result<Vec<Node>, ClientError> {
        self.get_json(format!("{}/thorchain/nodes", self.api_url))
            .await
    }

    async fn get_invariants(&self) -> Result<Vec<String>, ClientError> {
        let response: InvariantsResponse = self
            .get_json(format!("{}/thorchain/invariants", self.api_url))
            .await?;
        Ok(response.invariants)
    }

    async fn get_invariant(&self, invariant: &str) -> Result<InvariantResponse, ClientError> {
        self.get_json(format!("{}/thorchain/invariant/{}", self.api_url, invariant))
            .await
    }

    async fn get_asgard_vaults(&self) -> Result<Vec<Vault>, ClientError> {
        self.get_json(format!("{}/thorchain/solvency/asgard", self.ninerealms_url))
            .await
    }

    async fn get_images(&self) -> Result<Vec<Image>, ClientError> {
        self.get_json(format!("{}/thorchain/security/images", self.ninerealms_url))
            .await
    }

    async fn get_pending_outbounds(&self) -> Result<Vec<TxOutItem>, ClientError> {
        self.get_json(format!("{}/thorchain/queue/outbound", self.api_url))
            .await
    }

    async fn get_tx_details(&self, in_hash: &str) -> Result<TxDetails, ClientError> {
        self.get_json(format!("{}/thorchain/tx/details/{}", self.api_url, in_hash))
            .await
    }
}
