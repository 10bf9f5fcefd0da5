use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::chainadapter::{ChangeSink, WalletAdapter};
use crate::error::{NativeFailure, Operation, WalletError};
use crate::host::{HostEnvironment, NativeListener, ProviderSubscription, SolanaProvider};
use crate::solana::events::parse_account_changed;
use crate::solana::types::{SolanaAdapterConfig, EVENT_ACCOUNT_CHANGED, EVENT_DISCONNECT};
use crate::types::{ChangeEvent, ConnectionResult, SignatureResult, WalletKind};

/// Wallet adapter for a Phantom-style Solana provider
pub struct SolanaAdapter {
    /// Where the injected provider is looked up
    host: Arc<dyn HostEnvironment>,

    /// Configuration parameters
    config: SolanaAdapterConfig,

    /// Public key granted by the last successful connect
    authorized: Arc<RwLock<Option<String>>>,
}

impl SolanaAdapter {
    pub fn new(host: Arc<dyn HostEnvironment>) -> Self {
        Self::with_config(host, SolanaAdapterConfig::default())
    }

    pub fn with_config(host: Arc<dyn HostEnvironment>, config: SolanaAdapterConfig) -> Self {
        debug!("Creating Solana wallet adapter for network {}", config.network_label);
        Self {
            host,
            config,
            authorized: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config(&self) -> &SolanaAdapterConfig {
        &self.config
    }

    // `window.solana` is shared by several extensions; only the one flagging
    // `isPhantom` speaks this protocol.
    fn provider(&self) -> Option<Arc<dyn SolanaProvider>> {
        self.host.solana().filter(|provider| provider.is_phantom())
    }

    fn require_provider(&self) -> Result<Arc<dyn SolanaProvider>, WalletError> {
        self.provider()
            .ok_or(WalletError::ProviderUnavailable(WalletKind::Solana))
    }

    fn authorized(&self) -> Option<String> {
        self.authorized
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_authorized(authorized: &RwLock<Option<String>>, key: Option<String>) {
        *authorized.write().unwrap_or_else(PoisonError::into_inner) = key;
    }
}

#[async_trait]
impl WalletAdapter for SolanaAdapter {
    fn kind(&self) -> WalletKind {
        WalletKind::Solana
    }

    fn is_available(&self) -> bool {
        self.provider().is_some()
    }

    async fn connect(&self) -> Result<ConnectionResult, WalletError> {
        let provider = self.require_provider()?;
        info!("Requesting Phantom connection");

        let public_key = provider.connect().await.map_err(WalletError::from_connect)?;
        let result = ConnectionResult::new(public_key, self.config.network_label.clone())
            .ok_or_else(|| {
                WalletError::ProviderError(NativeFailure::new(
                    Operation::Connect,
                    "wallet returned an empty public key",
                ))
            })?;

        Self::set_authorized(&self.authorized, Some(result.account().to_string()));
        info!("Connected to {}", result.network());
        debug!("Authorized public key {}", result.account());
        Ok(result)
    }

    async fn is_connected(&self) -> bool {
        let Some(provider) = self.provider() else {
            return false;
        };
        provider.is_connected().unwrap_or_else(|e| {
            debug!("isConnected failed, reporting not connected: {}", e);
            false
        })
    }

    async fn current_account(&self) -> Result<Option<String>, WalletError> {
        let provider = self.require_provider()?;
        let connected = provider
            .is_connected()
            .map_err(|e| WalletError::native(Operation::Accounts, e))?;
        if !connected {
            return Ok(None);
        }
        let key = provider
            .public_key()
            .map_err(|e| WalletError::native(Operation::Accounts, e))?;
        Ok(key.filter(|k| !k.is_empty()))
    }

    async fn current_network(&self) -> Result<String, WalletError> {
        self.require_provider()?;
        Ok(self.config.network_label.clone())
    }

    async fn sign(&self, message: &str) -> Result<SignatureResult, WalletError> {
        let provider = self.require_provider()?;
        if self.authorized().is_none() {
            return Err(WalletError::NotConnected);
        }
        let connected = provider
            .is_connected()
            .map_err(|e| WalletError::native(Operation::Sign, e))?;
        if !connected {
            return Err(WalletError::NotConnected);
        }

        let signed = provider
            .sign_message(message.as_bytes(), &self.config.message_encoding)
            .await
            .map_err(|e| WalletError::native(Operation::Sign, e))?;

        Ok(SignatureResult::Solana {
            signature_bytes: signed.signature,
            public_key: signed.public_key,
        })
    }

    fn adopt_account(&self, account: &str) {
        debug!("Adopting trusted public key {}", account);
        Self::set_authorized(&self.authorized, Some(account.to_string()));
    }

    fn watch(&self, sink: ChangeSink) -> Result<ProviderSubscription, WalletError> {
        let provider = self.require_provider()?;

        let authorized = Arc::clone(&self.authorized);
        let account_sink = Arc::clone(&sink);
        let on_account: NativeListener = Arc::new(move |payload: Value| {
            match parse_account_changed(&payload) {
                Some(accounts) => {
                    Self::set_authorized(&authorized, accounts.first().cloned());
                    account_sink(ChangeEvent::AccountChanged { accounts });
                }
                None => warn!("Ignoring malformed accountChanged payload: {}", payload),
            }
        });

        let authorized = Arc::clone(&self.authorized);
        let on_disconnect: NativeListener = Arc::new(move |_: Value| {
            Self::set_authorized(&authorized, None);
            sink(ChangeEvent::AccountChanged { accounts: Vec::new() });
        });

        Ok(ProviderSubscription::register(
            provider,
            vec![(EVENT_ACCOUNT_CHANGED, on_account), (EVENT_DISCONNECT, on_disconnect)],
        ))
    }
}
