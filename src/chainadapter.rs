// Wallet abstraction over injected chain providers

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::WalletError;
use crate::evm::EvmAdapter;
use crate::host::{HostEnvironment, ProviderSubscription};
use crate::solana::SolanaAdapter;
use crate::types::{ChangeEvent, ConnectionResult, SignatureResult, WalletKind};

/// Receiver for normalized change events produced by an adapter.
pub type ChangeSink = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Capabilities every wallet adapter exposes, independent of chain.
///
/// Every method except the best-effort queries fails with
/// [`WalletError::ProviderUnavailable`] before touching the provider when no
/// matching wallet is injected.
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    fn kind(&self) -> WalletKind;

    /// True iff the injected provider exists (and carries the expected marker
    /// flag). Never fails.
    fn is_available(&self) -> bool;

    /// Runs the provider's permission handshake.
    ///
    /// Suspends until the user answers the wallet prompt; there is no
    /// cancellation, a caller wanting one must layer a timeout on top.
    async fn connect(&self) -> Result<ConnectionResult, WalletError>;

    /// Best-effort, non-prompting authorization check. Any failure reads as `false`.
    async fn is_connected(&self) -> bool;

    /// Already-authorized account, without prompting.
    async fn current_account(&self) -> Result<Option<String>, WalletError>;

    /// Active network, without prompting.
    async fn current_network(&self) -> Result<String, WalletError>;

    /// Signs a UTF-8 message with the connected account.
    async fn sign(&self, message: &str) -> Result<SignatureResult, WalletError>;

    /// Takes `account`, already authorized by the wallet, as the signing
    /// account without running the handshake.
    fn adopt_account(&self, account: &str);

    /// Subscribes `sink` to the provider's native change notifications.
    ///
    /// Each call makes a new native subscription; callers wanting exactly one
    /// must keep the returned handle and not call again.
    fn watch(&self, sink: ChangeSink) -> Result<ProviderSubscription, WalletError>;
}

/// The wallet adapter chosen for a host.
pub enum ProviderAdapter {
    Evm(EvmAdapter),
    Solana(SolanaAdapter),
}

impl ProviderAdapter {
    /// Probes the host once and returns the first available adapter, EVM first.
    pub fn detect(host: Arc<dyn HostEnvironment>) -> Option<Self> {
        Self::detect_preferring(host, WalletKind::Evm)
    }

    /// Probes the host once, trying `preferred` before the other wallet.
    pub fn detect_preferring(host: Arc<dyn HostEnvironment>, preferred: WalletKind) -> Option<Self> {
        let order = match preferred {
            WalletKind::Evm => [WalletKind::Evm, WalletKind::Solana],
            WalletKind::Solana => [WalletKind::Solana, WalletKind::Evm],
        };

        let detected = order
            .into_iter()
            .map(|kind| Self::for_kind(Arc::clone(&host), kind))
            .find(|adapter| adapter.is_available());

        match &detected {
            Some(adapter) => debug!("Detected {} wallet provider", adapter.kind()),
            None => debug!("No wallet provider injected"),
        }
        detected
    }

    /// Adapter for a specific wallet, whether or not it is injected yet.
    pub fn for_kind(host: Arc<dyn HostEnvironment>, kind: WalletKind) -> Self {
        match kind {
            WalletKind::Evm => ProviderAdapter::Evm(EvmAdapter::new(host)),
            WalletKind::Solana => ProviderAdapter::Solana(SolanaAdapter::new(host)),
        }
    }

    fn inner(&self) -> &dyn WalletAdapter {
        match self {
            ProviderAdapter::Evm(adapter) => adapter,
            ProviderAdapter::Solana(adapter) => adapter,
        }
    }
}

#[async_trait]
impl WalletAdapter for ProviderAdapter {
    fn kind(&self) -> WalletKind {
        self.inner().kind()
    }

    fn is_available(&self) -> bool {
        self.inner().is_available()
    }

    async fn connect(&self) -> Result<ConnectionResult, WalletError> {
        self.inner().connect().await
    }

    async fn is_connected(&self) -> bool {
        self.inner().is_connected().await
    }

    async fn current_account(&self) -> Result<Option<String>, WalletError> {
        self.inner().current_account().await
    }

    async fn current_network(&self) -> Result<String, WalletError> {
        self.inner().current_network().await
    }

    async fn sign(&self, message: &str) -> Result<SignatureResult, WalletError> {
        self.inner().sign(message).await
    }

    fn adopt_account(&self, account: &str) {
        self.inner().adopt_account(account)
    }

    fn watch(&self, sink: ChangeSink) -> Result<ProviderSubscription, WalletError> {
        self.inner().watch(sink)
    }
}
