mod config;
pub use config::SessionConfig;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::chainadapter::{ChangeSink, WalletAdapter};
use crate::error::WalletError;
use crate::host::ProviderSubscription;
use crate::types::{ChangeEvent, ConnectionResult, SessionState, SignatureResult, WalletKind};

/// Ordered stream of change events published by one session.
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl EventStream {
    /// Waits for the next event. Returns `None` once the session is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Next already-published event, if any.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for EventStream {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[derive(Default)]
struct SessionInner {
    state: SessionState,
    /// Set by the first successful connect or restore
    ever_connected: bool,
    /// At most one native subscription per session
    subscription: Option<ProviderSubscription>,
    listeners: Vec<mpsc::UnboundedSender<ChangeEvent>>,
}

impl SessionInner {
    /// Applies a normalized provider event, then republishes it.
    fn apply(&mut self, session: Uuid, event: ChangeEvent) {
        match (&event, &self.state) {
            (ChangeEvent::AccountChanged { accounts }, SessionState::Connected(current)) => {
                match accounts.first().and_then(|first| current.with_account(first.clone())) {
                    Some(next) => {
                        debug!(%session, "Account switched to {}", next.account());
                        self.state = SessionState::Connected(next);
                    }
                    None => {
                        info!(%session, "Wallet revoked all accounts, session disconnected");
                        self.state = SessionState::Disconnected;
                    }
                }
            }
            (ChangeEvent::ChainChanged { chain_id }, SessionState::Connected(current)) => {
                info!(%session, "Network changed to {}", chain_id);
                self.state = SessionState::Connected(current.with_network(chain_id.clone()));
            }
            (_, SessionState::Disconnected) => {
                debug!(%session, "Change event while disconnected: {:?}", event);
            }
        }
        self.publish(event);
    }

    fn publish(&mut self, event: ChangeEvent) {
        self.listeners.retain(|listener| listener.send(event.clone()).is_ok());
    }
}

/// Connection state for one wallet adapter.
///
/// The session owns its native subscription: it is made on the first
/// successful connect, shared by later connects, and removed by
/// [`disconnect`](Self::disconnect) or when the session is dropped. Several
/// sessions over the same provider each receive (and republish) every native
/// event; nothing is deduplicated between them.
pub struct WalletSession {
    id: Uuid,
    adapter: Arc<dyn WalletAdapter>,
    config: SessionConfig,
    inner: Arc<Mutex<SessionInner>>,
}

impl WalletSession {
    pub fn new(adapter: impl WalletAdapter + 'static) -> Self {
        Self::with_config(adapter, SessionConfig::default())
    }

    pub fn with_config(adapter: impl WalletAdapter + 'static, config: SessionConfig) -> Self {
        Self::from_shared(Arc::new(adapter), config)
    }

    pub fn from_shared(adapter: Arc<dyn WalletAdapter>, config: SessionConfig) -> Self {
        let id = Uuid::new_v4();
        debug!(session = %id, "Creating {} wallet session", adapter.kind());
        Self {
            id,
            adapter,
            config,
            inner: Arc::new(Mutex::new(SessionInner::default())),
        }
    }

    /// Creates a session and, if configured, restores an already-authorized
    /// account. Restore failures leave the session disconnected.
    pub async fn start(adapter: impl WalletAdapter + 'static, config: SessionConfig) -> Self {
        let session = Self::with_config(adapter, config);
        if session.config.restore_on_start {
            if let Err(e) = session.restore().await {
                warn!(session = %session.id, "Could not restore wallet session: {}", e);
            }
        }
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> WalletKind {
        self.adapter.kind()
    }

    pub fn adapter(&self) -> &Arc<dyn WalletAdapter> {
        &self.adapter
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    /// Cached network, if connected.
    pub fn network(&self) -> Option<String> {
        self.lock()
            .state
            .connection()
            .map(|connection| connection.network().to_string())
    }

    /// Registers a listener. It sees every event published from now on, in
    /// provider order.
    pub fn subscribe(&self) -> EventStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().listeners.push(sender);
        EventStream { receiver }
    }

    /// Runs the wallet handshake and caches the result.
    ///
    /// On an already-connected session the handshake runs again and replaces
    /// the cached result; the native subscription is reused.
    #[instrument(skip(self), fields(session = %self.id, wallet = %self.adapter.kind()))]
    pub async fn connect(&self) -> Result<ConnectionResult, WalletError> {
        let result = match self.bounded(self.adapter.connect()).await {
            Ok(result) => result,
            Err(e) if e.is_declined() => {
                info!("Connection declined by user");
                return Err(e);
            }
            Err(e) => {
                warn!("Wallet connect failed: {}", e);
                return Err(e);
            }
        };

        self.enter_connected(&result)?;
        info!("Wallet session connected on network {}", result.network());
        Ok(result)
    }

    /// Restores an already-authorized account without prompting.
    ///
    /// Returns the cached connection if the session is connected already,
    /// `None` if the wallet has not authorized this site.
    #[instrument(skip(self), fields(session = %self.id, wallet = %self.adapter.kind()))]
    pub async fn restore(&self) -> Result<Option<ConnectionResult>, WalletError> {
        let cached = self.lock().state.connection().cloned();
        if cached.is_some() {
            return Ok(cached);
        }

        let Some(account) = self.adapter.current_account().await? else {
            debug!("No previously authorized account");
            return Ok(None);
        };
        let network = self.adapter.current_network().await?;
        let Some(result) = ConnectionResult::new(account, network) else {
            return Ok(None);
        };

        self.adapter.adopt_account(result.account());
        self.enter_connected(&result)?;
        info!("Restored wallet session on network {}", result.network());
        Ok(Some(result))
    }

    /// Forgets the cached connection and drops the native subscription.
    ///
    /// Wallets offer no remote revoke, so this is local only.
    pub fn disconnect(&self) {
        let subscription = {
            let mut inner = self.lock();
            inner.state = SessionState::Disconnected;
            inner.subscription.take()
        };
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
        info!(session = %self.id, "Wallet session disconnected");
    }

    /// Connected account. Never prompts.
    ///
    /// Before the first connect this asks the wallet for an already-authorized
    /// account; afterwards only the cached state is consulted.
    pub async fn get_account(&self) -> Result<Option<String>, WalletError> {
        {
            let inner = self.lock();
            if let Some(connection) = inner.state.connection() {
                return Ok(Some(connection.account().to_string()));
            }
            if inner.ever_connected {
                return Ok(None);
            }
        }
        self.adapter.current_account().await
    }

    /// Same fall-through rules as [`get_account`](Self::get_account). Never fails.
    pub async fn is_session_connected(&self) -> bool {
        {
            let inner = self.lock();
            if inner.state.is_connected() {
                return true;
            }
            if inner.ever_connected {
                return false;
            }
        }
        self.adapter.is_connected().await
    }

    /// Signs with the connected account.
    #[instrument(skip(self, message), fields(session = %self.id, wallet = %self.adapter.kind()))]
    pub async fn sign(&self, message: &str) -> Result<SignatureResult, WalletError> {
        if !self.lock().state.is_connected() {
            return Err(WalletError::NotConnected);
        }
        self.bounded(self.adapter.sign(message)).await
    }

    /// Number of native listeners this session holds on the provider.
    pub fn native_listener_count(&self) -> usize {
        self.lock()
            .subscription
            .as_ref()
            .map(ProviderSubscription::len)
            .unwrap_or(0)
    }

    /// Caches `result`, subscribing first if this session holds no
    /// subscription yet.
    ///
    /// The subscription is made without the session lock held: a provider may
    /// deliver an event from inside `on()`, and that event locks the session.
    fn enter_connected(&self, result: &ConnectionResult) -> Result<(), WalletError> {
        let fresh = if self.lock().subscription.is_none() {
            Some(self.adapter.watch(self.change_sink())?)
        } else {
            None
        };

        let surplus = {
            let mut inner = self.lock();
            let surplus = match fresh {
                Some(subscription) if inner.subscription.is_none() => {
                    inner.subscription = Some(subscription);
                    debug!(session = %self.id, "Subscribed to provider change events");
                    None
                }
                other => other,
            };
            inner.state = SessionState::Connected(result.clone());
            inner.ever_connected = true;
            surplus
        };
        // A concurrent connect won the slot; release ours outside the lock.
        drop(surplus);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Holds the session weakly so the provider's listener does not keep it alive.
    fn change_sink(&self) -> ChangeSink {
        let session = self.id;
        let inner: Weak<Mutex<SessionInner>> = Arc::downgrade(&self.inner);
        Arc::new(move |event: ChangeEvent| {
            if let Some(inner) = inner.upgrade() {
                inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .apply(session, event);
            }
        })
    }

    async fn bounded<T, F>(&self, request: F) -> Result<T, WalletError>
    where
        F: Future<Output = Result<T, WalletError>>,
    {
        match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| WalletError::TimedOut(limit))?,
            None => request.await,
        }
    }
}
