//! The session controller.
//!
//! [`SessionController`] owns the only [`Session`] of an application and is
//! the only thing that publishes to the [`SessionStore`]. It runs three
//! transitions:
//!
//! * [`initialize`](SessionController::initialize) obtains a client from the
//!   backend and derives the first session from it;
//! * [`login`](SessionController::login) runs the provider's interactive
//!   flow and derives a fresh session once it succeeds;
//! * [`logout`](SessionController::logout) forgets the credential and
//!   publishes an unauthenticated session. It cannot fail.
//!
//! Only one login runs at a time. A logout cancels a pending login, and a
//! login whose result arrives after a logout is dropped rather than
//! published, so the most recent logout always decides the final state.

use std::{
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::sync::watch;
use url::Url;

use crate::{
    actor::{ActorFactory, Agent, AgentActorFactory, ServiceSpec, StandInActorFactory},
    backend::{
        AuthClient, BackendError, DemoBackend, IdentityBackend, IdentityProvider, LiveBackend,
        LoginOptions, LoopbackProvider, ProviderError,
    },
    clock::SystemClock,
    config::{ConfigError, SessionConfig, SessionMode},
    constants::{STORAGE_FILE, USER_PRINCIPAL_KEY},
    session::{ActorMap, Session},
    storage::{FileStore, KeyValueStore, MemoryStore},
    store::{SessionStore, SessionSubscription},
};

pub mod errors;

pub use errors::SessionError;

/// Capabilities a controller is assembled from.
#[derive(Debug, Clone)]
pub struct ControllerParts {
    pub mode: SessionMode,
    pub backend: Arc<dyn IdentityBackend>,
    pub actor_factory: Arc<dyn ActorFactory>,
    /// Where the signed-in principal's display text is kept.
    pub storage: Arc<dyn KeyValueStore>,
    pub store: SessionStore,
    pub services: Vec<ServiceSpec>,
    /// Replica host agents are bound to.
    pub host: Url,
    pub login_options: LoginOptions,
    pub login_timeout: Option<Duration>,
}

#[derive(Debug, Default)]
struct ControllerState {
    client: Option<Arc<dyn AuthClient>>,
    initialized: bool,
    /// Bumped by every logout; a login only commits if it is unchanged.
    epoch: u64,
}

/// Owner of the session state machine.
#[derive(Debug)]
pub struct SessionController {
    mode: SessionMode,
    backend: Arc<dyn IdentityBackend>,
    actor_factory: Arc<dyn ActorFactory>,
    storage: Arc<dyn KeyValueStore>,
    store: SessionStore,
    services: Vec<ServiceSpec>,
    host: Url,
    login_options: LoginOptions,
    login_timeout: Option<Duration>,
    state: Mutex<ControllerState>,
    login_in_flight: AtomicBool,
    logouts: watch::Sender<u64>,
}

impl SessionController {
    pub fn new(parts: ControllerParts) -> Self {
        let (logouts, _) = watch::channel(0);
        Self {
            mode: parts.mode,
            backend: parts.backend,
            actor_factory: parts.actor_factory,
            storage: parts.storage,
            store: parts.store,
            services: parts.services,
            host: parts.host,
            login_options: parts.login_options,
            login_timeout: parts.login_timeout,
            state: Mutex::new(ControllerState::default()),
            login_in_flight: AtomicBool::new(false),
            logouts,
        }
    }

    /// Wire the demo or live variant selected by `config`.
    ///
    /// The live backend logs in through a [`LoopbackProvider`] on the
    /// configured callback port.
    pub fn from_config(config: &SessionConfig, store: SessionStore) -> Result<Self, ConfigError> {
        let provider = Arc::new(LoopbackProvider::new(config.callback_port));
        Self::from_config_with_provider(config, store, provider)
    }

    /// Like [`from_config`](Self::from_config) with a custom identity provider.
    pub fn from_config_with_provider(
        config: &SessionConfig,
        store: SessionStore,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let storage: Arc<dyn KeyValueStore> = match &config.data_dir {
            Some(dir) => Arc::new(FileStore::open_or_reset(dir.join(STORAGE_FILE))?),
            None => Arc::new(MemoryStore::new()),
        };

        let (backend, actor_factory): (Arc<dyn IdentityBackend>, Arc<dyn ActorFactory>) =
            match config.mode {
                SessionMode::Demo => (Arc::new(DemoBackend::new()), Arc::new(StandInActorFactory)),
                SessionMode::Live => (
                    Arc::new(LiveBackend::new(
                        Arc::clone(&storage),
                        Arc::new(SystemClock),
                        provider,
                    )),
                    Arc::new(AgentActorFactory),
                ),
            };

        tracing::debug!(mode = %config.mode, network = ?config.network, "Configuring session controller");
        Ok(Self::new(ControllerParts {
            mode: config.mode,
            backend,
            actor_factory,
            storage,
            store,
            services: config.services.clone(),
            host: config.host.clone(),
            login_options: LoginOptions {
                identity_provider: config.identity_provider.clone(),
                max_time_to_live: config.max_time_to_live,
            },
            login_timeout: config.login_timeout,
        }))
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// The most recently published session.
    pub fn current(&self) -> Arc<Session> {
        self.store.current()
    }

    pub fn subscribe(&self) -> SessionSubscription {
        self.store.subscribe()
    }

    pub fn is_login_pending(&self) -> bool {
        self.login_in_flight.load(Ordering::SeqCst)
    }

    /// Derive and publish the first session.
    ///
    /// May only succeed once per controller; a failed attempt can be retried.
    pub async fn initialize(&self) -> Result<Arc<Session>, SessionError> {
        let epoch = {
            let mut state = self.lock();
            if state.initialized {
                return Err(SessionError::AlreadyInitialized);
            }
            state.initialized = true;
            state.epoch
        };

        let result = self.initialize_inner(epoch).await;
        if result.is_err() {
            self.lock().initialized = false;
        }
        result
    }

    async fn initialize_inner(&self, epoch: u64) -> Result<Arc<Session>, SessionError> {
        let client = self.client().await?;
        let session = self.resolve_session(&client).await?;
        tracing::info!(mode = %self.mode, status = %session.status(), "Session initialized");
        // A logout during startup already published the state to keep.
        Ok(self.commit(epoch, session).unwrap_or_else(|| self.current()))
    }

    /// Log in, publishing the authenticated session.
    ///
    /// A client that is already authenticated skips the provider. Fails with
    /// [`SessionError::LoginAlreadyInProgress`] while another login runs.
    pub async fn login(&self) -> Result<Arc<Session>, SessionError> {
        let _flight = LoginFlight::acquire(&self.login_in_flight)
            .ok_or(SessionError::LoginAlreadyInProgress)?;

        let (epoch, mut logouts) = {
            let state = self.lock();
            (state.epoch, self.logouts.subscribe())
        };

        let client = self.client().await?;
        if self.holds_credential(&client).await? {
            tracing::debug!("Client already authenticated, skipping provider");
        } else {
            tracing::info!(
                provider = %self.login_options.identity_provider,
                "Starting interactive login"
            );
            let flow = client.login(self.login_options.clone());
            let outcome = tokio::select! {
                outcome = bounded(self.login_timeout, flow) => outcome,
                _ = logouts.changed() => {
                    tracing::info!("Login cancelled by logout");
                    return Err(SessionError::LoginCancelled);
                }
            };
            match outcome {
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "Identity provider login failed");
                    return Err(login_denied(err));
                }
                None => {
                    let timeout = self.login_timeout.unwrap_or_default();
                    tracing::warn!(?timeout, "Identity provider login timed out");
                    return Err(SessionError::LoginTimedOut { timeout });
                }
            }
        }

        let session = self.resolve_session(&client).await?;
        match self.commit(epoch, session) {
            Some(session) => {
                tracing::info!(
                    principal = ?session.principal().map(|p| p.to_text()),
                    status = %session.status(),
                    "Login complete"
                );
                Ok(session)
            }
            None => Err(SessionError::LoginCancelled),
        }
    }

    /// Log out and publish an unauthenticated session.
    ///
    /// Backend failures are logged and otherwise ignored. Calling this while
    /// already unauthenticated clears the persisted principal again but
    /// publishes nothing.
    pub async fn logout(&self) -> Arc<Session> {
        let client = {
            let mut state = self.lock();
            state.epoch += 1;
            self.logouts.send_replace(state.epoch);
            state.client.clone()
        };

        if let Some(client) = &client {
            if let Err(err) = client.logout().await {
                tracing::warn!(error = %err, "Backend logout failed, clearing local session anyway");
            }
        }

        let _state = self.lock();
        self.forget_principal();
        let current = self.store.current();
        if !current.is_authenticated() {
            tracing::debug!("Logout while unauthenticated");
            return current;
        }
        let session = Arc::new(Session::unauthenticated(client));
        self.store.publish(Arc::clone(&session));
        tracing::info!("Logged out");
        session
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The existing client, or a new one from the backend.
    async fn client(&self) -> Result<Arc<dyn AuthClient>, SessionError> {
        let existing = self.lock().client.clone();
        if let Some(client) = existing {
            return Ok(client);
        }
        let client = self
            .backend
            .create()
            .await
            .map_err(query_failed("create"))?;
        tracing::debug!(backend = %self.backend.kind(), "Created auth client");
        let mut state = self.lock();
        Ok(Arc::clone(state.client.get_or_insert(client)))
    }

    async fn holds_credential(&self, client: &Arc<dyn AuthClient>) -> Result<bool, SessionError> {
        let authenticated = client
            .is_authenticated()
            .await
            .map_err(query_failed("is_authenticated"))?;
        if !authenticated {
            return Ok(false);
        }
        let identity = client.identity().map_err(query_failed("identity"))?;
        Ok(!identity.principal().is_anonymous())
    }

    /// Derive a session from `client` without publishing it.
    async fn resolve_session(
        &self,
        client: &Arc<dyn AuthClient>,
    ) -> Result<Arc<Session>, SessionError> {
        let authenticated = client
            .is_authenticated()
            .await
            .map_err(query_failed("is_authenticated"))?;
        let identity = client.identity().map_err(query_failed("identity"))?;
        let principal = identity.principal();
        tracing::debug!(authenticated, principal = %principal, "Resolved client state");

        if !authenticated || principal.is_anonymous() {
            return Ok(Arc::new(Session::anonymous(Arc::clone(client), identity)));
        }

        let agent = Agent::new(self.host.clone(), Arc::clone(&identity)).map_err(|source| {
            SessionError::ActorUnavailable {
                service: "agent".to_string(),
                source,
            }
        })?;
        let mut actors = ActorMap::new();
        for service in &self.services {
            let actor = self.actor_factory.build(service, &agent).map_err(|source| {
                SessionError::ActorUnavailable {
                    service: service.name.clone(),
                    source,
                }
            })?;
            actors.insert(service.name.clone(), actor);
        }

        Session::authenticated(Arc::clone(client), identity, principal, actors)
            .map(Arc::new)
            .ok_or_else(|| SessionError::InvalidSession {
                reason: "authenticated session needs at least one service".to_string(),
            })
    }

    /// Persist and publish `session` unless a logout happened since `epoch`.
    fn commit(&self, epoch: u64, session: Arc<Session>) -> Option<Arc<Session>> {
        let state = self.lock();
        if state.epoch != epoch {
            tracing::debug!("Dropping session superseded by logout");
            return None;
        }
        match session.principal() {
            Some(principal) if session.is_authenticated() => {
                if let Err(err) = self.storage.set(USER_PRINCIPAL_KEY, principal.to_text()) {
                    tracing::warn!(error = %err, "Failed to persist user principal");
                }
            }
            _ => self.forget_principal(),
        }
        self.store.publish(Arc::clone(&session));
        drop(state);
        Some(session)
    }

    fn forget_principal(&self) {
        if let Err(err) = self.storage.remove(USER_PRINCIPAL_KEY) {
            tracing::warn!(error = %err, "Failed to clear user principal");
        }
    }
}

/// Await `future`, giving up after `timeout` when one is set.
async fn bounded<F: Future>(timeout: Option<Duration>, future: F) -> Option<F::Output> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, future).await.ok(),
        None => Some(future.await),
    }
}

fn query_failed(operation: &'static str) -> impl FnOnce(BackendError) -> SessionError {
    move |source| SessionError::BackendQueryFailed { operation, source }
}

fn login_denied(err: ProviderError) -> SessionError {
    match err {
        ProviderError::Denied { reason } => SessionError::LoginDenied { reason },
        other => SessionError::LoginDenied {
            reason: other.to_string(),
        },
    }
}

/// Marks a login as running until dropped.
struct LoginFlight<'a> {
    flag: &'a AtomicBool,
}

impl<'a> LoginFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for LoginFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
