use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DeployChain, DeployError};

/// On-chain location of a deployment, keyed by what the chain calls it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployedAddress {
    #[serde(rename = "contractAddress")]
    Contract(String),
    #[serde(rename = "programId")]
    Program(String),
}

impl DeployedAddress {
    pub fn for_chain(chain: DeployChain, address: String) -> Self {
        match chain {
            DeployChain::Ethereum => DeployedAddress::Contract(address),
            DeployChain::Solana => DeployedAddress::Program(address),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DeployedAddress::Contract(address) | DeployedAddress::Program(address) => address,
        }
    }
}

/// Result of one deployment run. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub network: String,
    #[serde(flatten)]
    pub address: DeployedAddress,
    pub deployer: String,
    /// RFC 3339, UTC, microsecond precision
    pub timestamp: String,
}

impl DeploymentRecord {
    pub fn new(network: String, address: DeployedAddress, deployer: String, at: DateTime<Utc>) -> Self {
        Self {
            network,
            address,
            deployer,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }

    pub fn timestamp(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(&self.timestamp).map(|at| at.with_timezone(&Utc))
    }

    /// Reads a record written by [`write_atomic`](Self::write_atomic).
    pub async fn load(path: &Path) -> Result<Self, DeployError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Replaces `path` with this record. The file is either the old one or
    /// the complete new one, never partial.
    pub async fn write_atomic(&self, path: &Path) -> Result<(), DeployError> {
        let mut encoded = serde_json::to_vec_pretty(self)?;
        encoded.push(b'\n');

        let staging = staging_path(path);
        let written = match tokio::fs::write(&staging, &encoded).await {
            Ok(()) => tokio::fs::rename(&staging, path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                debug!("Could not remove {}: {}", staging.display(), cleanup);
            }
            return Err(e.into());
        }
        Ok(())
    }
}

pub fn record_file_name(chain: DeployChain) -> &'static str {
    match chain {
        DeployChain::Ethereum => "ethereum_deployment.json",
        DeployChain::Solana => "solana_deployment.json",
    }
}

// Unique per write, so overlapping runs never share a staging file.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    path.with_file_name(name)
}
