use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::chainadapter::{ChangeSink, WalletAdapter};
use crate::error::{NativeFailure, Operation, WalletError};
use crate::evm::events::{encode_personal_message, normalize_chain_id, parse_accounts, parse_net_version};
use crate::evm::types::*;
use crate::host::{EthereumProvider, HostEnvironment, NativeListener, ProviderSubscription};
use crate::types::{ChangeEvent, ConnectionResult, SignatureResult, WalletKind};

/// Wallet adapter for a MetaMask-style EIP-1193 provider
pub struct EvmAdapter {
    /// Where the injected provider is looked up
    host: Arc<dyn HostEnvironment>,

    config: EvmAdapterConfig,

    /// Account used for signing; set by connect, tracked through
    /// `accountsChanged`
    signer: Arc<RwLock<Option<String>>>,
}

impl EvmAdapter {
    pub fn new(host: Arc<dyn HostEnvironment>) -> Self {
        Self::with_config(host, EvmAdapterConfig::default())
    }

    pub fn with_config(host: Arc<dyn HostEnvironment>, config: EvmAdapterConfig) -> Self {
        debug!("Creating EVM wallet adapter for window.{}", config.namespace_label);
        Self {
            host,
            config,
            signer: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config(&self) -> &EvmAdapterConfig {
        &self.config
    }

    fn provider(&self) -> Option<Arc<dyn EthereumProvider>> {
        let provider = self.host.ethereum()?;
        if self.config.require_metamask_marker && !provider.is_metamask() {
            debug!("window.{} is not MetaMask", self.config.namespace_label);
            return None;
        }
        Some(provider)
    }

    fn require_provider(&self) -> Result<Arc<dyn EthereumProvider>, WalletError> {
        self.provider()
            .ok_or(WalletError::ProviderUnavailable(WalletKind::Evm))
    }

    fn signer(&self) -> Option<String> {
        self.signer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_signer(signer: &RwLock<Option<String>>, account: Option<String>) {
        *signer.write().unwrap_or_else(PoisonError::into_inner) = account;
    }

    async fn accounts(
        provider: &dyn EthereumProvider,
        method: &str,
        operation: Operation,
    ) -> Result<Vec<String>, WalletError> {
        let payload = provider
            .request(method, Vec::new())
            .await
            .map_err(|e| match operation {
                Operation::Connect => WalletError::from_connect(e),
                other => WalletError::native(other, e),
            })?;

        parse_accounts(&payload)
            .map_err(|message| WalletError::ProviderError(NativeFailure::new(operation, message)))
    }

    async fn net_version(provider: &dyn EthereumProvider) -> Result<String, WalletError> {
        let payload = provider
            .request(METHOD_NET_VERSION, Vec::new())
            .await
            .map_err(|e| WalletError::native(Operation::Network, e))?;

        parse_net_version(&payload).ok_or_else(|| {
            WalletError::ProviderError(NativeFailure::new(
                Operation::Network,
                format!("unexpected net_version result {payload}"),
            ))
        })
    }
}

#[async_trait]
impl WalletAdapter for EvmAdapter {
    fn kind(&self) -> WalletKind {
        WalletKind::Evm
    }

    fn is_available(&self) -> bool {
        self.provider().is_some()
    }

    async fn connect(&self) -> Result<ConnectionResult, WalletError> {
        let provider = self.require_provider()?;
        info!("Requesting EVM account access");

        let accounts =
            Self::accounts(provider.as_ref(), METHOD_REQUEST_ACCOUNTS, Operation::Connect).await?;
        let account = accounts.into_iter().next().unwrap_or_default();
        let network = Self::net_version(provider.as_ref()).await?;

        let result = ConnectionResult::new(account, network).ok_or_else(|| {
            WalletError::ProviderError(NativeFailure::new(
                Operation::Connect,
                "wallet authorized no account",
            ))
        })?;

        Self::set_signer(&self.signer, Some(result.account().to_string()));
        info!("Connected to EVM network {}", result.network());
        debug!("Authorized account {}", result.account());
        Ok(result)
    }

    async fn is_connected(&self) -> bool {
        let Some(provider) = self.provider() else {
            return false;
        };
        match Self::accounts(provider.as_ref(), METHOD_ACCOUNTS, Operation::Accounts).await {
            Ok(accounts) => !accounts.is_empty(),
            Err(e) => {
                debug!("eth_accounts failed, reporting not connected: {}", e);
                false
            }
        }
    }

    async fn current_account(&self) -> Result<Option<String>, WalletError> {
        let provider = self.require_provider()?;
        let accounts = Self::accounts(provider.as_ref(), METHOD_ACCOUNTS, Operation::Accounts).await?;
        Ok(accounts.into_iter().next().filter(|a| !a.is_empty()))
    }

    async fn current_network(&self) -> Result<String, WalletError> {
        let provider = self.require_provider()?;
        Self::net_version(provider.as_ref()).await
    }

    async fn sign(&self, message: &str) -> Result<SignatureResult, WalletError> {
        let provider = self.require_provider()?;
        let account = self.signer().ok_or(WalletError::NotConnected)?;

        let params = vec![json!(encode_personal_message(message)), json!(account)];
        let payload = provider
            .request(METHOD_PERSONAL_SIGN, params)
            .await
            .map_err(|e| WalletError::native(Operation::Sign, e))?;

        match payload {
            Value::String(signature) => Ok(SignatureResult::Evm { signature }),
            other => Err(WalletError::ProviderError(NativeFailure::new(
                Operation::Sign,
                format!("unexpected personal_sign result {other}"),
            ))),
        }
    }

    fn adopt_account(&self, account: &str) {
        debug!("Adopting authorized account {}", account);
        Self::set_signer(&self.signer, Some(account.to_string()));
    }

    fn watch(&self, sink: ChangeSink) -> Result<ProviderSubscription, WalletError> {
        let provider = self.require_provider()?;

        let signer = Arc::clone(&self.signer);
        let accounts_sink = Arc::clone(&sink);
        let on_accounts: NativeListener = Arc::new(move |payload: Value| {
            match parse_accounts(&payload) {
                Ok(accounts) => {
                    Self::set_signer(&signer, accounts.first().cloned());
                    accounts_sink(ChangeEvent::AccountChanged { accounts });
                }
                Err(e) => warn!("Ignoring malformed accountsChanged payload: {}", e),
            }
        });

        let on_chain: NativeListener = Arc::new(move |payload: Value| {
            match normalize_chain_id(&payload) {
                Some(chain_id) => sink(ChangeEvent::ChainChanged { chain_id }),
                None => warn!("Ignoring malformed chainChanged payload: {}", payload),
            }
        });

        Ok(ProviderSubscription::register(
            provider,
            vec![(EVENT_ACCOUNTS_CHANGED, on_accounts), (EVENT_CHAIN_CHANGED, on_chain)],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderRpcError;
    use crate::host::InjectedProviders;
    use crate::mock::MockEthereum;
    use std::sync::Mutex;

    fn adapter_with(provider: Arc<MockEthereum>) -> EvmAdapter {
        EvmAdapter::new(Arc::new(InjectedProviders::new().with_ethereum(provider)))
    }

    #[tokio::test]
    async fn test_connect_without_provider() {
        let adapter = EvmAdapter::new(Arc::new(InjectedProviders::new()));
        assert!(!adapter.is_available());
        assert_eq!(
            adapter.connect().await.unwrap_err(),
            WalletError::ProviderUnavailable(WalletKind::Evm)
        );
        assert!(!adapter.is_connected().await);
        assert!(matches!(
            adapter.current_account().await,
            Err(WalletError::ProviderUnavailable(_))
        ));
        assert!(matches!(
            adapter.sign("hello").await,
            Err(WalletError::ProviderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_returns_account_and_network() {
        let provider = Arc::new(MockEthereum::new().approving(&["0xABC"]).on_network("1"));
        let adapter = adapter_with(provider.clone());

        let result = adapter.connect().await.unwrap();
        assert_eq!(result.account(), "0xABC");
        assert_eq!(result.network(), "1");
        assert_eq!(provider.request_count(METHOD_REQUEST_ACCOUNTS), 1);
        assert!(adapter.is_connected().await);
    }

    #[tokio::test]
    async fn test_connect_rejection_is_distinguished() {
        let provider = Arc::new(MockEthereum::new());
        provider.fail(METHOD_REQUEST_ACCOUNTS, ProviderRpcError::user_rejected());
        let adapter = adapter_with(provider.clone());
        assert!(matches!(
            adapter.connect().await,
            Err(WalletError::UserRejected(_))
        ));

        provider.fail(METHOD_REQUEST_ACCOUNTS, ProviderRpcError::new(-32603, "internal"));
        match adapter.connect().await {
            Err(WalletError::ProviderError(failure)) => assert_eq!(failure.message, "internal"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_with_no_accounts_is_not_a_connection() {
        let provider = Arc::new(MockEthereum::new().approving(&[]));
        let adapter = adapter_with(provider);
        assert!(matches!(
            adapter.connect().await,
            Err(WalletError::ProviderError(_))
        ));
        assert!(matches!(adapter.sign("x").await, Err(WalletError::NotConnected)));
    }

    #[tokio::test]
    async fn test_marker_requirement() {
        let provider = Arc::new(MockEthereum::new().without_marker());
        let host = Arc::new(InjectedProviders::new().with_ethereum(provider));
        assert!(EvmAdapter::new(host.clone()).is_available());
        assert!(!EvmAdapter::with_config(host, EvmAdapterConfig::metamask_only()).is_available());
    }

    #[tokio::test]
    async fn test_is_connected_swallows_failures() {
        let provider = Arc::new(MockEthereum::new().authorized(&["0xABC"]));
        provider.fail(METHOD_ACCOUNTS, ProviderRpcError::new(-32603, "boom"));
        let adapter = adapter_with(provider.clone());
        assert!(!adapter.is_connected().await);
        assert!(matches!(
            adapter.current_account().await,
            Err(WalletError::ProviderError(_))
        ));
    }

    #[tokio::test]
    async fn test_current_account_does_not_prompt() {
        let provider = Arc::new(MockEthereum::new().authorized(&["0xAAA", "0xBBB"]));
        let adapter = adapter_with(provider.clone());
        assert_eq!(adapter.current_account().await.unwrap().as_deref(), Some("0xAAA"));
        assert_eq!(provider.request_count(METHOD_REQUEST_ACCOUNTS), 0);
    }

    #[tokio::test]
    async fn test_sign_requires_connect() {
        let provider = Arc::new(MockEthereum::new().authorized(&["0xABC"]));
        let adapter = adapter_with(provider.clone());
        assert!(matches!(adapter.sign("hi").await, Err(WalletError::NotConnected)));
        assert_eq!(provider.request_count(METHOD_PERSONAL_SIGN), 0);
    }

    #[tokio::test]
    async fn test_adopted_account_signs_without_prompt() {
        let provider = Arc::new(MockEthereum::new().authorized(&["0xAAA"]));
        let adapter = adapter_with(provider.clone());
        adapter.adopt_account("0xAAA");

        adapter.sign("hi").await.unwrap();
        assert_eq!(provider.request_count(METHOD_REQUEST_ACCOUNTS), 0);
        assert_eq!(provider.request_count(METHOD_PERSONAL_SIGN), 1);
    }

    #[tokio::test]
    async fn test_sign_sends_hex_message_and_account() {
        let provider = Arc::new(MockEthereum::new().approving(&["0xABC"]));
        let adapter = adapter_with(provider.clone());
        adapter.connect().await.unwrap();

        let signature = adapter.sign("hi").await.unwrap();
        assert!(matches!(signature, SignatureResult::Evm { ref signature } if signature.starts_with("0x")));

        let (_, params) = provider
            .requests()
            .into_iter()
            .find(|(method, _)| method == METHOD_PERSONAL_SIGN)
            .unwrap();
        assert_eq!(params, vec![json!("0x6869"), json!("0xABC")]);
    }

    #[tokio::test]
    async fn test_sign_rejection_is_signature_rejection() {
        let provider = Arc::new(MockEthereum::new());
        let adapter = adapter_with(provider.clone());
        adapter.connect().await.unwrap();
        provider.fail(METHOD_PERSONAL_SIGN, ProviderRpcError::user_rejected());

        let err = adapter.sign("hi").await.unwrap_err();
        assert!(err.is_signature_rejected());
        assert!(!matches!(err, WalletError::UserRejected(_)));
    }

    #[tokio::test]
    async fn test_watch_normalizes_native_events() {
        let provider = Arc::new(MockEthereum::new());
        let adapter = adapter_with(provider.clone());
        adapter.connect().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let subscription = adapter
            .watch(Arc::new(move |event: ChangeEvent| sink_seen.lock().unwrap().push(event)))
            .unwrap();

        provider.emit_chain_changed("0x89");
        provider.emit_accounts_changed(&["0xDEF", "0xABC"]);
        provider.emit_raw(EVENT_ACCOUNTS_CHANGED, json!({"bad": true}));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ChangeEvent::ChainChanged { chain_id: "137".into() },
                ChangeEvent::AccountChanged { accounts: vec!["0xDEF".into(), "0xABC".into()] },
            ]
        );

        // signing follows the account switch
        adapter.sign("hi").await.unwrap();
        let (_, params) = provider.requests().into_iter().last().unwrap();
        assert_eq!(params[1], json!("0xDEF"));

        drop(subscription);
        assert_eq!(provider.listener_count(EVENT_ACCOUNTS_CHANGED), 0);
    }

    #[tokio::test]
    async fn test_revoked_accounts_clear_signer() {
        let provider = Arc::new(MockEthereum::new());
        let adapter = adapter_with(provider.clone());
        adapter.connect().await.unwrap();
        let _subscription = adapter.watch(Arc::new(|_: ChangeEvent| {})).unwrap();

        provider.emit_accounts_changed(&[]);
        assert!(matches!(adapter.sign("hi").await, Err(WalletError::NotConnected)));
    }
}
