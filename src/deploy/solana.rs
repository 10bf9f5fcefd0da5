use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    bpf_loader_upgradeable::{self, UpgradeableLoaderState},
    commitment_config::{CommitmentConfig, CommitmentLevel},
    instruction::Instruction,
    signature::{read_keypair_file, Keypair, Signer},
    signer::signers::Signers,
    transaction::Transaction,
};
use tracing::{debug, info};

use super::{DeployFactory, PendingDeployment};
use crate::error::DeployChain;

/// Payload size of one loader `Write` instruction, leaving room for the
/// transaction header and signature inside the 1232-byte packet limit.
pub const DEFAULT_WRITE_CHUNK: usize = 900;

/// Configuration parameters for Solana program deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolanaDeployConfig {
    /// RPC endpoint URL
    pub rpc_url: String,

    /// Commitment level every transaction is confirmed at
    pub commitment: CommitmentLevel,

    /// Program bytes written per buffer transaction
    pub chunk_size: usize,

    /// Network label written into the deployment record
    pub network_label: String,
}

impl Default for SolanaDeployConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            commitment: CommitmentLevel::Confirmed,
            chunk_size: DEFAULT_WRITE_CHUNK,
            network_label: "solana".to_string(),
        }
    }
}

impl SolanaDeployConfig {
    pub fn new(rpc_url: &str) -> Self {
        Self::default().with_rpc_url(rpc_url)
    }

    pub fn devnet() -> Self {
        Self::new("https://api.devnet.solana.com")
    }

    pub fn with_rpc_url(mut self, rpc_url: &str) -> Self {
        self.rpc_url = rpc_url.to_string();
        self
    }

    pub fn with_commitment(mut self, commitment: CommitmentLevel) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_network_label(mut self, label: &str) -> Self {
        self.network_label = label.to_string();
        self
    }
}

/// Loads a BPF program through the upgradeable loader, with the payer as
/// upgrade authority.
pub struct SolanaProgramLoader {
    client: Arc<RpcClient>,
    payer: Arc<Keypair>,
    config: SolanaDeployConfig,
}

impl SolanaProgramLoader {
    pub fn new(config: SolanaDeployConfig, payer: Keypair) -> Self {
        let client = RpcClient::new_with_commitment(
            config.rpc_url.clone(),
            CommitmentConfig {
                commitment: config.commitment,
            },
        );
        Self {
            client: Arc::new(client),
            payer: Arc::new(payer),
            config,
        }
    }

    pub fn from_keypair_file(config: SolanaDeployConfig, path: &Path) -> anyhow::Result<Self> {
        let payer = read_keypair_file(path)
            .map_err(|e| anyhow!("failed to read keypair {}: {}", path.display(), e))?;
        Ok(Self::new(config, payer))
    }

    pub fn config(&self) -> &SolanaDeployConfig {
        &self.config
    }
}

#[async_trait]
impl DeployFactory for SolanaProgramLoader {
    type Params = Vec<u8>;

    fn chain(&self) -> DeployChain {
        DeployChain::Solana
    }

    fn network(&self) -> String {
        self.config.network_label.clone()
    }

    fn deployer(&self) -> String {
        self.payer.pubkey().to_string()
    }

    async fn deploy(&self, program: Vec<u8>) -> anyhow::Result<PendingDeployment> {
        if program.is_empty() {
            return Err(anyhow!("program binary is empty"));
        }
        if self.config.chunk_size == 0 {
            return Err(anyhow!("write chunk size must be positive"));
        }

        let client = Arc::clone(&self.client);
        let payer = Arc::clone(&self.payer);
        let chunk_size = self.config.chunk_size;
        let program_keypair = Keypair::new();
        info!(
            "Loading {} byte program as {}",
            program.len(),
            program_keypair.pubkey()
        );

        let pending: PendingDeployment = Box::pin(async move {
            let buffer = Keypair::new();
            let program_len = program.len();

            // The buffer is later drained into the program data account, so it
            // is funded for that account's size.
            let buffer_lamports = client
                .get_minimum_balance_for_rent_exemption(UpgradeableLoaderState::size_of_programdata(
                    program_len,
                ))
                .await?;
            let create = bpf_loader_upgradeable::create_buffer(
                &payer.pubkey(),
                &buffer.pubkey(),
                &payer.pubkey(),
                buffer_lamports,
                program_len,
            )?;
            send(&client, &create, &payer, &[payer.as_ref(), &buffer]).await?;
            debug!("Created program buffer {}", buffer.pubkey());

            for (offset, chunk) in write_chunks(&program, chunk_size)? {
                let write = bpf_loader_upgradeable::write(
                    &buffer.pubkey(),
                    &payer.pubkey(),
                    offset,
                    chunk.to_vec(),
                );
                send(&client, &[write], &payer, &[payer.as_ref()]).await?;
            }
            debug!("Wrote {} bytes to buffer", program_len);

            let program_lamports = client
                .get_minimum_balance_for_rent_exemption(UpgradeableLoaderState::size_of_program())
                .await?;
            #[allow(deprecated)]
            let deploy = bpf_loader_upgradeable::deploy_with_max_program_len(
                &payer.pubkey(),
                &program_keypair.pubkey(),
                &buffer.pubkey(),
                &payer.pubkey(),
                program_lamports,
                program_len,
            )?;
            send(&client, &deploy, &payer, &[payer.as_ref(), &program_keypair]).await?;

            Ok(program_keypair.pubkey().to_string())
        });
        Ok(pending)
    }
}

async fn send<T: Signers + ?Sized>(
    client: &RpcClient,
    instructions: &[Instruction],
    payer: &Keypair,
    signers: &T,
) -> anyhow::Result<()> {
    let blockhash = client
        .get_latest_blockhash()
        .await
        .context("failed to fetch a recent blockhash")?;
    let transaction =
        Transaction::new_signed_with_payer(instructions, Some(&payer.pubkey()), signers, blockhash);
    let signature = client.send_and_confirm_transaction(&transaction).await?;
    debug!("Confirmed {}", signature);
    Ok(())
}

/// Splits `program` into loader writes as `(offset, bytes)` pairs.
fn write_chunks(program: &[u8], chunk_size: usize) -> anyhow::Result<Vec<(u32, &[u8])>> {
    program
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, chunk)| {
            u32::try_from(index * chunk_size)
                .map(|offset| (offset, chunk))
                .map_err(|_| anyhow!("program too large for the loader"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_chunks_cover_program() {
        let program: Vec<u8> = (0..=255u8).cycle().take(2_000).collect();
        let chunks = write_chunks(&program, 900).unwrap();

        let offsets: Vec<u32> = chunks.iter().map(|(offset, _)| *offset).collect();
        assert_eq!(offsets, vec![0, 900, 1800]);
        assert_eq!(chunks[2].1.len(), 200);
        let joined: Vec<u8> = chunks.iter().flat_map(|(_, bytes)| bytes.iter().copied()).collect();
        assert_eq!(joined, program);
    }

    #[test]
    fn test_config_defaults() {
        let config = SolanaDeployConfig::devnet().with_network_label("solana-devnet");
        assert_eq!(config.rpc_url, "https://api.devnet.solana.com");
        assert_eq!(config.commitment, CommitmentLevel::Confirmed);
        assert_eq!(config.chunk_size, DEFAULT_WRITE_CHUNK);
        assert_eq!(config.network_label, "solana-devnet");
    }

    #[test]
    fn test_config_from_json() {
        let config: SolanaDeployConfig = serde_json::from_str(
            r#"{
                "rpc_url": "https://api.mainnet-beta.solana.com",
                "commitment": "finalized",
                "chunk_size": 512,
                "network_label": "solana-mainnet"
            }"#,
        )
        .unwrap();
        assert_eq!(config.commitment, CommitmentLevel::Finalized);
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.network_label, "solana-mainnet");
    }

    #[tokio::test]
    async fn test_loader_identity_and_empty_program() {
        let payer = Keypair::new();
        let expected = payer.pubkey().to_string();
        let loader = SolanaProgramLoader::new(SolanaDeployConfig::default(), payer);

        assert_eq!(loader.deployer(), expected);
        assert_eq!(loader.network(), "solana");
        assert_eq!(loader.chain(), DeployChain::Solana);
        assert!(loader.deploy(Vec::new()).await.is_err());
    }
}
