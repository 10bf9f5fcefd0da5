use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::WalletKind;

/// EIP-1193 code for "the user rejected the request". Phantom reuses it.
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-1193 code for "the requested method/account is not authorized".
pub const UNAUTHORIZED_CODE: i64 = 4100;

/// Error object reported by an injected provider.
///
/// This is the EIP-1193 `ProviderRpcError` shape; Phantom rejects its
/// promises with the same structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("provider error {code}: {message}")]
pub struct ProviderRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProviderRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// A rejection raised by the user declining a wallet prompt.
    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED_CODE, "User rejected the request.")
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == USER_REJECTED_CODE
    }
}

/// Provider round trip that produced a [`NativeFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Connect,
    Accounts,
    Network,
    Sign,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Connect => "connect",
            Operation::Accounts => "accounts",
            Operation::Network => "network",
            Operation::Sign => "sign",
        };
        f.write_str(name)
    }
}

/// A native provider failure, kept with the operation it interrupted.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeFailure {
    pub operation: Operation,
    pub code: Option<i64>,
    pub message: String,
}

impl NativeFailure {
    pub fn new(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            operation,
            code: None,
            message: message.into(),
        }
    }

    pub fn from_rpc(operation: Operation, error: ProviderRpcError) -> Self {
        Self {
            operation,
            code: Some(error.code),
            message: error.message,
        }
    }
}

impl fmt::Display for NativeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} failed ({}): {}", self.operation, code, self.message),
            None => write!(f, "{} failed: {}", self.operation, self.message),
        }
    }
}

/// Errors surfaced by wallet adapters and sessions.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    /// No matching wallet extension is injected in the host.
    #[error("{0} wallet is not installed")]
    ProviderUnavailable(WalletKind),

    /// The user declined the connection prompt.
    #[error("connection declined: {0}")]
    UserRejected(String),

    /// The operation needs a prior successful connect.
    #[error("wallet is not connected")]
    NotConnected,

    /// Any other native provider failure.
    #[error("provider error: {0}")]
    ProviderError(NativeFailure),

    /// The optional session-level timeout elapsed before the provider answered.
    #[error("wallet did not respond within {0:?}")]
    TimedOut(Duration),
}

impl WalletError {
    /// Classifies a native error raised during the connect handshake.
    pub(crate) fn from_connect(error: ProviderRpcError) -> Self {
        if error.is_user_rejection() {
            WalletError::UserRejected(error.message)
        } else {
            WalletError::ProviderError(NativeFailure::from_rpc(Operation::Connect, error))
        }
    }

    pub(crate) fn native(operation: Operation, error: ProviderRpcError) -> Self {
        WalletError::ProviderError(NativeFailure::from_rpc(operation, error))
    }

    /// True when the user declined a signature prompt.
    pub fn is_signature_rejected(&self) -> bool {
        matches!(
            self,
            WalletError::ProviderError(NativeFailure {
                operation: Operation::Sign,
                code: Some(USER_REJECTED_CODE),
                ..
            })
        )
    }

    /// True for the "user said no" family, which callers should not retry automatically.
    pub fn is_declined(&self) -> bool {
        matches!(self, WalletError::UserRejected(_)) || self.is_signature_rejected()
    }

    /// Text suitable for showing to the user instead of the raw error.
    pub fn user_message(&self) -> String {
        match self {
            WalletError::ProviderUnavailable(kind) => format!(
                "{} is not installed. Please install {} to continue.",
                kind.wallet_name(),
                kind.wallet_name()
            ),
            WalletError::UserRejected(_) => "Connection declined.".to_string(),
            WalletError::NotConnected => "Please connect your wallet first.".to_string(),
            err if err.is_signature_rejected() => "Signature declined.".to_string(),
            WalletError::ProviderError(_) => {
                "The wallet reported an error. Make sure it is unlocked and try again.".to_string()
            }
            WalletError::TimedOut(_) => {
                "The wallet did not respond. Check for a pending wallet prompt.".to_string()
            }
        }
    }
}

/// Chain family a deployment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployChain {
    Ethereum,
    Solana,
}

impl fmt::Display for DeployChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployChain::Ethereum => f.write_str("ethereum"),
            DeployChain::Solana => f.write_str("solana"),
        }
    }
}

/// Errors surfaced by the deployment recorder.
#[derive(thiserror::Error, Debug)]
pub enum DeployError {
    /// Submission or on-chain confirmation did not succeed.
    #[error("{chain} deployment failed: {source}")]
    DeploymentFailed {
        chain: DeployChain,
        #[source]
        source: anyhow::Error,
    },

    /// The record could not be written.
    #[error("failed to persist deployment record: {0}")]
    Persist(#[from] std::io::Error),

    #[error("failed to encode deployment record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl DeployError {
    pub(crate) fn failed(chain: DeployChain, source: anyhow::Error) -> Self {
        DeployError::DeploymentFailed { chain, source }
    }
}
