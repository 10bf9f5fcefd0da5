use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use ethers::abi::Abi;
use ethers::prelude::*;
use ethers::utils::to_checksum;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{DeployFactory, PendingDeployment};
use crate::error::DeployChain;

type DeployClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Configuration parameters for EVM contract deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmDeployConfig {
    /// RPC endpoint URL
    pub rpc_url: String,

    /// Per-request HTTP timeout
    pub rpc_timeout: Duration,

    /// Blocks to wait on top of the inclusion block
    pub confirmations: usize,

    /// How often the provider polls for the receipt
    pub poll_interval: Duration,
}

impl Default for EvmDeployConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            rpc_timeout: Duration::from_secs(30),
            confirmations: 1,
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl EvmDeployConfig {
    pub fn new(rpc_url: &str) -> Self {
        Self::default().with_rpc_url(rpc_url)
    }

    pub fn with_rpc_url(mut self, rpc_url: &str) -> Self {
        self.rpc_url = rpc_url.to_string();
        self
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    pub fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Compiled contract as emitted by Hardhat (`artifacts/**/<Name>.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct ContractArtifact {
    #[serde(rename = "contractName", default)]
    pub contract_name: String,
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let artifact: Self = serde_json::from_str(json).context("malformed contract artifact")?;
        if artifact.bytecode.is_empty() {
            return Err(anyhow!(
                "artifact for {} has no bytecode (abstract contract or interface?)",
                artifact.contract_name
            ));
        }
        Ok(artifact)
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&json)
    }
}

/// Deploys a contract whose constructor takes the deployer as its first issuer.
pub struct EvmContractFactory {
    client: Arc<DeployClient>,
    config: EvmDeployConfig,
}

impl EvmContractFactory {
    /// Connects to the RPC endpoint and binds `private_key` to its chain.
    pub async fn connect(config: EvmDeployConfig, private_key: &str) -> anyhow::Result<Self> {
        let url = Url::parse(&config.rpc_url)
            .with_context(|| format!("invalid RPC URL {}", config.rpc_url))?;
        let http = Http::new_with_client(
            url,
            Client::builder()
                .timeout(config.rpc_timeout)
                .build()
                .context("failed to create HTTP client")?,
        );
        let provider = Provider::new(http).interval(config.poll_interval);

        let wallet: LocalWallet = private_key
            .trim()
            .parse()
            .map_err(|e: WalletError| anyhow!("invalid deployer key: {}", e))?;
        let client = SignerMiddleware::new_with_provider_chain(provider, wallet)
            .await
            .map_err(|e| anyhow!("failed to reach {}: {}", config.rpc_url, e))?;

        debug!("EVM deployer bound to chain {}", client.signer().chain_id());
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    pub fn config(&self) -> &EvmDeployConfig {
        &self.config
    }

    pub fn chain_id(&self) -> u64 {
        self.client.signer().chain_id()
    }
}

#[async_trait]
impl DeployFactory for EvmContractFactory {
    type Params = ContractArtifact;

    fn chain(&self) -> DeployChain {
        DeployChain::Ethereum
    }

    fn network(&self) -> String {
        self.chain_id().to_string()
    }

    fn deployer(&self) -> String {
        to_checksum(&self.client.address(), None)
    }

    async fn deploy(&self, artifact: ContractArtifact) -> anyhow::Result<PendingDeployment> {
        info!("Deploying contract {}", artifact.contract_name);
        let factory = ContractFactory::new(artifact.abi, artifact.bytecode, Arc::clone(&self.client));
        let deployment = factory
            .deploy(self.client.address())
            .map_err(|e| anyhow!("failed to encode constructor: {}", e))?
            .confirmations(self.config.confirmations);

        let pending: PendingDeployment = Box::pin(async move {
            let (contract, receipt) = deployment
                .send_with_receipt()
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
            debug!(
                "Deployment transaction {:?} included in block {:?}",
                receipt.transaction_hash, receipt.block_number
            );
            Ok(to_checksum(&contract.address(), None))
        });
        Ok(pending)
    }
}
