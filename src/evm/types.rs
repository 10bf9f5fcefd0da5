// EIP-1193 method and event names, adapter configuration

use serde::{Deserialize, Serialize};

/// Prompts the user to authorize accounts.
pub const METHOD_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";

/// Lists already-authorized accounts without prompting.
pub const METHOD_ACCOUNTS: &str = "eth_accounts";

/// Decimal network id of the active chain.
pub const METHOD_NET_VERSION: &str = "net_version";

pub const METHOD_PERSONAL_SIGN: &str = "personal_sign";

pub const EVENT_ACCOUNTS_CHANGED: &str = "accountsChanged";

pub const EVENT_CHAIN_CHANGED: &str = "chainChanged";

/// Configuration parameters for the EVM wallet adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmAdapterConfig {
    /// Label used in logs for the injected object
    pub namespace_label: String,
    /// Only accept a provider that sets `isMetaMask`. Useful when several
    /// extensions fight over `window.ethereum`.
    pub require_metamask_marker: bool,
}

impl Default for EvmAdapterConfig {
    fn default() -> Self {
        Self {
            namespace_label: "ethereum".to_string(),
            require_metamask_marker: false,
        }
    }
}

impl EvmAdapterConfig {
    /// Accept only MetaMask itself.
    pub fn metamask_only() -> Self {
        Self {
            require_metamask_marker: true,
            ..Self::default()
        }
    }

    pub fn with_namespace_label(mut self, label: &str) -> Self {
        self.namespace_label = label.to_string();
        self
    }

    pub fn with_metamask_marker(mut self, required: bool) -> Self {
        self.require_metamask_marker = required;
        self
    }
}
