//! Injected wallet providers as seen from Rust.
//!
//! The host (a browser page, an embedding, a test) owns the provider objects.
//! Bindings for a concrete host implement [`EthereumProvider`] and
//! [`SolanaProvider`] on top of whatever the host injects and hand them out
//! through a [`HostEnvironment`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ProviderRpcError;

/// Handle for one registration made through [`NativeEventSource::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocates a process-unique id. Provider bindings use this when they
    /// register a listener on the host's behalf.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ListenerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Callback receiving the raw payload of a native provider event.
pub type NativeListener = Arc<dyn Fn(Value) + Send + Sync>;

/// Event-emitter half of an injected provider (`provider.on(...)`).
///
/// Providers must invoke listeners for one event source in emission order and
/// must not hold internal locks while a listener runs.
pub trait NativeEventSource: Send + Sync {
    fn on(&self, event: &str, listener: NativeListener) -> ListenerId;

    fn remove_listener(&self, event: &str, id: ListenerId);
}

/// EIP-1193 provider, e.g. `window.ethereum`.
#[async_trait]
pub trait EthereumProvider: NativeEventSource {
    /// `isMetaMask` marker flag.
    fn is_metamask(&self) -> bool {
        false
    }

    /// `provider.request({ method, params })`.
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ProviderRpcError>;
}

/// Output of a Phantom `signMessage` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub signature: Vec<u8>,
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

/// Phantom-style provider, e.g. `window.solana`.
#[async_trait]
pub trait SolanaProvider: NativeEventSource {
    /// `isPhantom` marker flag.
    fn is_phantom(&self) -> bool;

    /// `provider.isConnected`.
    fn is_connected(&self) -> Result<bool, ProviderRpcError>;

    /// `provider.publicKey`, base58 encoded.
    fn public_key(&self) -> Result<Option<String>, ProviderRpcError>;

    /// `provider.connect()`; resolves to the base58 public key.
    async fn connect(&self) -> Result<String, ProviderRpcError>;

    /// `provider.signMessage(bytes, encoding)`.
    async fn sign_message(
        &self,
        message: &[u8],
        encoding: &str,
    ) -> Result<SignedMessage, ProviderRpcError>;
}

/// Lookup of the providers injected into the host.
///
/// Lookups are made on every call, so a provider injected after start-up is
/// picked up.
pub trait HostEnvironment: Send + Sync {
    fn ethereum(&self) -> Option<Arc<dyn EthereumProvider>>;

    fn solana(&self) -> Option<Arc<dyn SolanaProvider>>;
}

/// Host with a fixed set of providers.
#[derive(Clone, Default)]
pub struct InjectedProviders {
    ethereum: Option<Arc<dyn EthereumProvider>>,
    solana: Option<Arc<dyn SolanaProvider>>,
}

impl InjectedProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ethereum(mut self, provider: Arc<dyn EthereumProvider>) -> Self {
        self.ethereum = Some(provider);
        self
    }

    pub fn with_solana(mut self, provider: Arc<dyn SolanaProvider>) -> Self {
        self.solana = Some(provider);
        self
    }
}

impl HostEnvironment for InjectedProviders {
    fn ethereum(&self) -> Option<Arc<dyn EthereumProvider>> {
        self.ethereum.clone()
    }

    fn solana(&self) -> Option<Arc<dyn SolanaProvider>> {
        self.solana.clone()
    }
}

/// Native listeners registered for one consumer.
///
/// Dropping the subscription removes every listener it registered.
pub struct ProviderSubscription {
    registrations: Vec<(&'static str, ListenerId)>,
    unsubscribe: Option<Box<dyn FnOnce(Vec<(&'static str, ListenerId)>) + Send>>,
}

impl ProviderSubscription {
    /// Registers each `(event, listener)` pair on `source`.
    pub fn register<S>(source: Arc<S>, listeners: Vec<(&'static str, NativeListener)>) -> Self
    where
        S: NativeEventSource + ?Sized + 'static,
    {
        let registrations: Vec<_> = listeners
            .into_iter()
            .map(|(event, listener)| (event, source.on(event, listener)))
            .collect();
        debug!("Registered native listeners: {:?}", registrations);

        Self {
            registrations,
            unsubscribe: Some(Box::new(move |registrations| {
                for (event, id) in registrations {
                    source.remove_listener(event, id);
                }
            })),
        }
    }

    /// Number of native listeners currently held.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Removes the native listeners now.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            let registrations = std::mem::take(&mut self.registrations);
            debug!("Removing native listeners: {:?}", registrations);
            unsubscribe(registrations);
        }
    }
}

impl Drop for ProviderSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ProviderSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSubscription")
            .field("registrations", &self.registrations)
            .finish()
    }
}
