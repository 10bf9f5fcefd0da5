// Administrative deployment: submit, wait for confirmation, persist a record

pub mod evm;
mod record;
pub mod solana;

pub use evm::{ContractArtifact, EvmContractFactory, EvmDeployConfig};
pub use record::{record_file_name, DeployedAddress, DeploymentRecord};
pub use solana::{SolanaDeployConfig, SolanaProgramLoader};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use tracing::{error, info};

use crate::error::{DeployChain, DeployError};

/// Resolves to the deployed address once the chain has confirmed it.
pub type PendingDeployment = BoxFuture<'static, anyhow::Result<String>>;

/// Chain-specific deployment call, driven by a deployer key rather than a
/// wallet session.
#[async_trait]
pub trait DeployFactory: Send + Sync {
    /// What gets deployed (contract artifact, program binary, ..)
    type Params: Send + 'static;

    fn chain(&self) -> DeployChain;

    /// Network label written into the record.
    fn network(&self) -> String;

    /// Address or public key paying for the deployment.
    fn deployer(&self) -> String;

    /// Submits the deployment and hands back the confirmation wait.
    async fn deploy(&self, params: Self::Params) -> anyhow::Result<PendingDeployment>;
}

/// Runs deployments and writes one record file per chain into `out_dir`.
#[derive(Debug, Clone)]
pub struct DeploymentRecorder {
    out_dir: PathBuf,
}

impl DeploymentRecorder {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn record_path(&self, chain: DeployChain) -> PathBuf {
        self.out_dir.join(record_file_name(chain))
    }

    /// Deploys through `factory`, waits for confirmation and overwrites the
    /// chain's record file.
    ///
    /// Nothing is written unless the deployment is confirmed.
    pub async fn record_deployment<F: DeployFactory>(
        &self,
        factory: &F,
        params: F::Params,
    ) -> Result<DeploymentRecord, DeployError> {
        let chain = factory.chain();
        let started = Utc::now();
        let deployer = factory.deployer();
        info!("Deploying to {} as {}", chain, deployer);

        let pending = factory
            .deploy(params)
            .await
            .map_err(|e| DeployError::failed(chain, e))?;
        let address = pending.await.map_err(|e| {
            error!("{} deployment was not confirmed: {:#}", chain, e);
            DeployError::failed(chain, e)
        })?;
        info!("{} deployment confirmed at {}", chain, address);

        // Keep the timestamp strictly after the start even on a coarse clock.
        let finished = Utc::now().max(started + chrono::Duration::microseconds(1));
        let record = DeploymentRecord::new(
            factory.network(),
            DeployedAddress::for_chain(chain, address),
            deployer,
            finished,
        );

        let path = self.record_path(chain);
        tokio::fs::create_dir_all(&self.out_dir).await?;
        record.write_atomic(&path).await?;
        info!("Deployment record written to {}", path.display());
        Ok(record)
    }
}
