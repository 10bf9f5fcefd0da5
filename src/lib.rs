//! Frostgate wallet connectivity
//!
//! One capability contract over two structurally different injected wallet
//! providers: a MetaMask-style EIP-1193 provider for EVM chains and a
//! Phantom-style provider for Solana. A [`WalletSession`] sits on top of the
//! chosen [`ProviderAdapter`], caches the connection and republishes the
//! provider's native change notifications as chain-agnostic [`ChangeEvent`]s.
//!
//! Deployment of the verifier contract/program is a separate administrative
//! flow, see [`deploy`].

pub mod chainadapter;
pub mod deploy;
pub mod error;
pub mod host;
pub mod session;
pub mod types;

pub mod evm;
pub mod solana;

#[cfg(test)]
pub(crate) mod mock;

pub use chainadapter::{ChangeSink, ProviderAdapter, WalletAdapter};
pub use deploy::{DeployFactory, DeploymentRecord, DeploymentRecorder};
pub use error::{DeployChain, DeployError, ProviderRpcError, WalletError};
pub use host::{EthereumProvider, HostEnvironment, InjectedProviders, ProviderSubscription, SolanaProvider};
pub use session::{EventStream, SessionConfig, WalletSession};
pub use types::{ChangeEvent, ConnectionResult, SessionState, SignatureResult, WalletKind};

pub type Result<T> = std::result::Result<T, WalletError>;
