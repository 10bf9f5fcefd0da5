use std::fmt;

use serde::{Deserialize, Serialize};

/// Wallet families this crate can bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    /// EVM chain reached through a MetaMask-style injected provider.
    Evm,
    /// Solana reached through a Phantom-style injected provider.
    Solana,
}

impl WalletKind {
    /// Name of the browser extension users are asked to install.
    pub fn wallet_name(&self) -> &'static str {
        match self {
            WalletKind::Evm => "MetaMask",
            WalletKind::Solana => "Phantom",
        }
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wallet_name())
    }
}

/// Account and network obtained from a successful connect.
///
/// `account` is never empty; an empty address from a provider is treated as
/// "not connected" instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionResult {
    account: String,
    network: String,
}

impl ConnectionResult {
    /// Returns `None` when `account` is empty.
    pub fn new(account: impl Into<String>, network: impl Into<String>) -> Option<Self> {
        let account = account.into();
        if account.trim().is_empty() {
            return None;
        }
        Some(Self {
            account,
            network: network.into(),
        })
    }

    /// Chain-native address or public key.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Decimal chain id for EVM, the cluster label for Solana.
    pub fn network(&self) -> &str {
        &self.network
    }

    pub(crate) fn with_account(&self, account: String) -> Option<Self> {
        Self::new(account, self.network.clone())
    }

    pub(crate) fn with_network(&self, network: String) -> Self {
        Self {
            account: self.account.clone(),
            network,
        }
    }
}

/// Signature produced by a wallet.
///
/// The two schemes differ in length and encoding, so they are kept apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "chain", rename_all = "lowercase")]
pub enum SignatureResult {
    /// `personal_sign` output as a `0x`-prefixed hex string.
    Evm { signature: String },
    /// Raw ed25519 signature bytes and the signing key.
    Solana {
        #[serde(rename = "signatureBytes")]
        signature_bytes: Vec<u8>,
        #[serde(rename = "publicKey")]
        public_key: String,
    },
}

impl SignatureResult {
    pub fn kind(&self) -> WalletKind {
        match self {
            SignatureResult::Evm { .. } => WalletKind::Evm,
            SignatureResult::Solana { .. } => WalletKind::Solana,
        }
    }
}

/// Chain-agnostic change notification published by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ChangeEvent {
    /// Full list of authorized accounts, in provider order. Empty means the
    /// wallet revoked access.
    AccountChanged { accounts: Vec<String> },
    ChainChanged {
        #[serde(rename = "chainId")]
        chain_id: String,
    },
}

/// Connection state held by a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connected(ConnectionResult),
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected(_))
    }

    pub fn connection(&self) -> Option<&ConnectionResult> {
        match self {
            SessionState::Connected(result) => Some(result),
            SessionState::Disconnected => None,
        }
    }
}
