use serde::{Deserialize, Serialize};

/// Fired with the new public key, or `null` when the wallet switches to an
/// account this site is not trusted by.
pub const EVENT_ACCOUNT_CHANGED: &str = "accountChanged";

pub const EVENT_DISCONNECT: &str = "disconnect";

/// Display encoding Phantom shows the message in.
pub const DEFAULT_MESSAGE_ENCODING: &str = "utf8";

/// Configuration parameters for the Solana wallet adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolanaAdapterConfig {
    /// Network label reported in connection results (default: "solana")
    pub network_label: String,

    /// Encoding hint passed to `signMessage` (default: "utf8")
    pub message_encoding: String,
}

impl Default for SolanaAdapterConfig {
    fn default() -> Self {
        Self {
            network_label: "solana".to_string(),
            message_encoding: DEFAULT_MESSAGE_ENCODING.to_string(),
        }
    }
}

impl SolanaAdapterConfig {
    pub fn mainnet() -> Self {
        Self::default().with_network_label("solana-mainnet")
    }

    pub fn devnet() -> Self {
        Self::default().with_network_label("solana-devnet")
    }

    pub fn with_network_label(mut self, label: &str) -> Self {
        self.network_label = label.to_string();
        self
    }

    pub fn with_message_encoding(mut self, encoding: &str) -> Self {
        self.message_encoding = encoding.to_string();
        self
    }
}
