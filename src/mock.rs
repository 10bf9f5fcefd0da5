//! Scriptable in-memory providers for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ProviderRpcError;
use crate::host::{
    EthereumProvider, ListenerId, NativeEventSource, NativeListener, SignedMessage, SolanaProvider,
};

#[derive(Default)]
struct Listeners {
    by_event: Mutex<HashMap<String, Vec<(ListenerId, NativeListener)>>>,
}

impl Listeners {
    fn on(&self, event: &str, listener: NativeListener) -> ListenerId {
        let id = ListenerId::next();
        self.by_event
            .lock()
            .unwrap()
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    fn remove(&self, event: &str, id: ListenerId) {
        if let Some(listeners) = self.by_event.lock().unwrap().get_mut(event) {
            listeners.retain(|(existing, _)| *existing != id);
        }
    }

    fn count(&self, event: &str) -> usize {
        self.by_event
            .lock()
            .unwrap()
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }

    // Listeners run outside the lock, like a real emitter.
    fn emit(&self, event: &str, payload: Value) {
        let listeners: Vec<NativeListener> = self
            .by_event
            .lock()
            .unwrap()
            .get(event)
            .map(|l| l.iter().map(|(_, f)| Arc::clone(f)).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(payload.clone());
        }
    }
}

struct EthState {
    metamask: bool,
    approve_accounts: Vec<String>,
    authorized: Vec<String>,
    net_version: String,
    signature: String,
    failures: HashMap<String, ProviderRpcError>,
    requests: Vec<(String, Vec<Value>)>,
}

/// In-memory EIP-1193 provider.
pub struct MockEthereum {
    state: Mutex<EthState>,
    listeners: Listeners,
}

impl MockEthereum {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EthState {
                metamask: true,
                approve_accounts: vec!["0xABC0000000000000000000000000000000000001".to_string()],
                authorized: Vec::new(),
                net_version: "1".to_string(),
                signature: format!("0x{}", "ab".repeat(65)),
                failures: HashMap::new(),
                requests: Vec::new(),
            }),
            listeners: Listeners::default(),
        }
    }

    /// Accounts returned when the user approves `eth_requestAccounts`.
    pub fn approving(self, accounts: &[&str]) -> Self {
        self.state.lock().unwrap().approve_accounts = accounts.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Accounts already authorized before any connect.
    pub fn authorized(self, accounts: &[&str]) -> Self {
        self.state.lock().unwrap().authorized = accounts.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn on_network(self, net_version: &str) -> Self {
        self.state.lock().unwrap().net_version = net_version.to_string();
        self
    }

    pub fn without_marker(self) -> Self {
        self.state.lock().unwrap().metamask = false;
        self
    }

    pub fn fail(&self, method: &str, error: ProviderRpcError) {
        self.state.lock().unwrap().failures.insert(method.to_string(), error);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn requests(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.count(event)
    }

    pub fn emit_accounts_changed(&self, accounts: &[&str]) {
        self.state.lock().unwrap().authorized = accounts.iter().map(|a| a.to_string()).collect();
        self.listeners.emit("accountsChanged", json!(accounts));
    }

    pub fn emit_chain_changed(&self, chain_id: &str) {
        self.listeners.emit("chainChanged", json!(chain_id));
    }

    pub fn emit_raw(&self, event: &str, payload: Value) {
        self.listeners.emit(event, payload);
    }
}

impl NativeEventSource for MockEthereum {
    fn on(&self, event: &str, listener: NativeListener) -> ListenerId {
        self.listeners.on(event, listener)
    }

    fn remove_listener(&self, event: &str, id: ListenerId) {
        self.listeners.remove(event, id);
    }
}

#[async_trait]
impl EthereumProvider for MockEthereum {
    fn is_metamask(&self) -> bool {
        self.state.lock().unwrap().metamask
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ProviderRpcError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push((method.to_string(), params));
        if let Some(error) = state.failures.get(method) {
            return Err(error.clone());
        }
        match method {
            "eth_requestAccounts" => {
                state.authorized = state.approve_accounts.clone();
                Ok(json!(state.authorized))
            }
            "eth_accounts" => Ok(json!(state.authorized)),
            "net_version" => Ok(json!(state.net_version)),
            "personal_sign" => Ok(json!(state.signature)),
            other => Err(ProviderRpcError::new(4200, format!("unsupported method {other}"))),
        }
    }
}

struct PhantomState {
    phantom: bool,
    connected: bool,
    public_key: Option<String>,
    approve_key: String,
    connect_error: Option<ProviderRpcError>,
    sign_error: Option<ProviderRpcError>,
    state_error: Option<ProviderRpcError>,
    signed: Vec<(Vec<u8>, String)>,
    connect_calls: usize,
}

/// In-memory Phantom-style provider.
pub struct MockPhantom {
    state: Mutex<PhantomState>,
    listeners: Listeners,
}

pub const PHANTOM_KEY: &str = "7Np41oeYqPefeNQEHSv1UDhYrehxin3NStELsSKCT4K2";

impl MockPhantom {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PhantomState {
                phantom: true,
                connected: false,
                public_key: None,
                approve_key: PHANTOM_KEY.to_string(),
                connect_error: None,
                sign_error: None,
                state_error: None,
                signed: Vec::new(),
                connect_calls: 0,
            }),
            listeners: Listeners::default(),
        }
    }

    pub fn without_marker(self) -> Self {
        self.state.lock().unwrap().phantom = false;
        self
    }

    pub fn approving(self, key: &str) -> Self {
        self.state.lock().unwrap().approve_key = key.to_string();
        self
    }

    /// Already trusted by the wallet before any connect.
    pub fn trusted(self) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.connected = true;
            state.public_key = Some(state.approve_key.clone());
        }
        self
    }

    pub fn fail_connect(&self, error: ProviderRpcError) {
        self.state.lock().unwrap().connect_error = Some(error);
    }

    pub fn fail_sign(&self, error: ProviderRpcError) {
        self.state.lock().unwrap().sign_error = Some(error);
    }

    /// Makes `isConnected`/`publicKey` reads fail.
    pub fn fail_state(&self, error: ProviderRpcError) {
        self.state.lock().unwrap().state_error = Some(error);
    }

    pub fn signed(&self) -> Vec<(Vec<u8>, String)> {
        self.state.lock().unwrap().signed.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.state.lock().unwrap().connect_calls
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.count(event)
    }

    pub fn emit_account_changed(&self, key: Option<&str>) {
        {
            let mut state = self.state.lock().unwrap();
            state.public_key = key.map(str::to_string);
            state.connected = key.is_some();
        }
        self.listeners.emit("accountChanged", json!(key));
    }

    pub fn emit_disconnect(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.public_key = None;
            state.connected = false;
        }
        self.listeners.emit("disconnect", Value::Null);
    }
}

impl NativeEventSource for MockPhantom {
    fn on(&self, event: &str, listener: NativeListener) -> ListenerId {
        self.listeners.on(event, listener)
    }

    fn remove_listener(&self, event: &str, id: ListenerId) {
        self.listeners.remove(event, id);
    }
}

#[async_trait]
impl SolanaProvider for MockPhantom {
    fn is_phantom(&self) -> bool {
        self.state.lock().unwrap().phantom
    }

    fn is_connected(&self) -> Result<bool, ProviderRpcError> {
        let state = self.state.lock().unwrap();
        match &state.state_error {
            Some(error) => Err(error.clone()),
            None => Ok(state.connected),
        }
    }

    fn public_key(&self) -> Result<Option<String>, ProviderRpcError> {
        let state = self.state.lock().unwrap();
        match &state.state_error {
            Some(error) => Err(error.clone()),
            None => Ok(state.public_key.clone()),
        }
    }

    async fn connect(&self) -> Result<String, ProviderRpcError> {
        let mut state = self.state.lock().unwrap();
        state.connect_calls += 1;
        if let Some(error) = &state.connect_error {
            return Err(error.clone());
        }
        state.connected = true;
        state.public_key = Some(state.approve_key.clone());
        Ok(state.approve_key.clone())
    }

    async fn sign_message(
        &self,
        message: &[u8],
        encoding: &str,
    ) -> Result<SignedMessage, ProviderRpcError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = &state.sign_error {
            return Err(error.clone());
        }
        state.signed.push((message.to_vec(), encoding.to_string()));
        Ok(SignedMessage {
            signature: vec![7u8; 64],
            public_key: state.public_key.clone().unwrap_or_default(),
        })
    }
}
