#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{watch, Notify};
use worksync_core::auth::{KeyValueStore, MemoryStore};
use worksync_core::{
    ApiError, AuthState, CredentialStore, LoginRedirect, RefreshManager, RefreshSettings,
    SessionApi, SessionGrant,
};

pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

pub fn test_settings() -> RefreshSettings {
    RefreshSettings {
        interval: DAY * 20,
        request_timeout: Duration::from_secs(5),
    }
}

pub fn profile(name: &str) -> Value {
    json!({
        "id": 42,
        "email": "dana@acme.io",
        "name": name,
        "role": "manager",
        "organizationId": 7,
        "profilePicture": null
    })
}

/// Scripted result of a login or renewal call.
#[derive(Debug, Clone)]
pub enum GrantOutcome {
    Token(String, Option<Value>),
    Unauthorized,
    ServerError,
    Timeout,
    Hang,
}

/// Scripted result of the "who am I" probe.
#[derive(Debug, Clone, Copy)]
pub enum ProbeOutcome {
    Valid,
    Unauthorized,
    ServerError,
    Timeout,
    Hang,
}

pub struct FakeSessionApi {
    login: Mutex<GrantOutcome>,
    renew: Mutex<GrantOutcome>,
    probe: Mutex<ProbeOutcome>,
    login_calls: AtomicUsize,
    renew_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    renew_gate: watch::Sender<bool>,
    renew_started: Notify,
}

impl FakeSessionApi {
    pub fn new() -> Self {
        let (renew_gate, _) = watch::channel(true);
        Self {
            login: Mutex::new(GrantOutcome::Unauthorized),
            renew: Mutex::new(GrantOutcome::Unauthorized),
            probe: Mutex::new(ProbeOutcome::Valid),
            login_calls: AtomicUsize::new(0),
            renew_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            renew_gate,
            renew_started: Notify::new(),
        }
    }

    pub fn set_login(&self, outcome: GrantOutcome) {
        *self.login.lock().unwrap() = outcome;
    }

    pub fn set_renew(&self, outcome: GrantOutcome) {
        *self.renew.lock().unwrap() = outcome;
    }

    pub fn set_probe(&self, outcome: ProbeOutcome) {
        *self.probe.lock().unwrap() = outcome;
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn renew_calls(&self) -> usize {
        self.renew_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Hold renewal calls until `open_renew_gate`.
    pub fn close_renew_gate(&self) {
        self.renew_gate.send_replace(false);
    }

    pub fn open_renew_gate(&self) {
        self.renew_gate.send_replace(true);
    }

    /// Resolves once a renewal call has started.
    pub async fn wait_renew_started(&self) {
        self.renew_started.notified().await;
    }

    async fn resolve(outcome: GrantOutcome) -> Result<SessionGrant, ApiError> {
        match outcome {
            GrantOutcome::Token(token, user) => Ok(SessionGrant { token, user }),
            GrantOutcome::Unauthorized => Err(ApiError::Unauthorized),
            GrantOutcome::ServerError => Err(ApiError::ServerError("upstream down".into())),
            GrantOutcome::Timeout => Err(ApiError::Timeout),
            GrantOutcome::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl SessionApi for FakeSessionApi {
    async fn login(&self, _email: &str, _password: &str) -> Result<SessionGrant, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.login.lock().unwrap().clone();
        Self::resolve(outcome).await
    }

    async fn renew_token(&self, _token: &str) -> Result<SessionGrant, ApiError> {
        self.renew_calls.fetch_add(1, Ordering::SeqCst);
        self.renew_started.notify_one();

        let mut gate = self.renew_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        let outcome = self.renew.lock().unwrap().clone();
        Self::resolve(outcome).await
    }

    async fn current_user(&self, _token: &str) -> Result<Value, ApiError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = *self.probe.lock().unwrap();
        match outcome {
            ProbeOutcome::Valid => Ok(profile("Dana")),
            ProbeOutcome::Unauthorized => Err(ApiError::Unauthorized),
            ProbeOutcome::ServerError => Err(ApiError::ServerError("maintenance".into())),
            ProbeOutcome::Timeout => Err(ApiError::Timeout),
            ProbeOutcome::Hang => std::future::pending().await,
        }
    }
}

#[derive(Default)]
pub struct CountingRedirect {
    count: AtomicUsize,
}

impl CountingRedirect {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl LoginRedirect for CountingRedirect {
    fn redirect_to_login(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Memory store whose removals block until the gate opens.
pub struct GatedStore {
    inner: MemoryStore,
    gate: watch::Sender<bool>,
    remove_entered: Notify,
    removes: AtomicUsize,
}

impl GatedStore {
    pub fn closed() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            inner: MemoryStore::new(),
            gate,
            remove_entered: Notify::new(),
            removes: AtomicUsize::new(0),
        }
    }

    pub fn open(&self) {
        self.gate.send_replace(true);
    }

    pub async fn wait_remove_entered(&self) {
        self.remove_entered.notified().await;
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for GatedStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.remove_entered.notify_one();
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        self.inner.remove(key).await
    }
}

/// Store that fails every write, for storage error paths.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        Ok(Some("tok_v1".to_string()))
    }

    async fn set(&self, key: &str, _value: &str) -> anyhow::Result<()> {
        anyhow::bail!("disk full writing {}", key)
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        anyhow::bail!("disk full removing {}", key)
    }
}

pub struct Harness {
    pub api: Arc<FakeSessionApi>,
    pub store: CredentialStore,
    pub state: AuthState,
    pub redirect: Arc<CountingRedirect>,
    pub manager: Arc<RefreshManager>,
}

impl Harness {
    pub async fn new(token: Option<&str>) -> Self {
        Self::with_backend(Arc::new(MemoryStore::new()), token).await
    }

    pub async fn with_backend(backend: Arc<dyn KeyValueStore>, token: Option<&str>) -> Self {
        let api = Arc::new(FakeSessionApi::new());
        let store = CredentialStore::new(backend);
        let state = AuthState::new();
        let redirect = Arc::new(CountingRedirect::default());

        if let Some(token) = token {
            store
                .set_session_data(token, &profile("Dana"))
                .await
                .unwrap();
            store.set_login_completed(true).await.unwrap();
            state.set_logged_in(token.to_string(), Some(profile("Dana")));
        }

        let manager = Arc::new(RefreshManager::new(
            api.clone(),
            store.clone(),
            state.clone(),
            redirect.clone(),
            test_settings(),
        ));

        Self {
            api,
            store,
            state,
            redirect,
            manager,
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.store.get_token().await.unwrap()
    }
}
