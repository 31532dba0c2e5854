use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use liftcash_session::{
    Clock, ControllerParts, SessionController, SessionMode, SessionStore,
    actor::{ActorFactory, ServiceSpec, StandInActorFactory},
    backend::{
        AuthClient, BackendError, BackendKind, IdentityBackend, LoginOptions, ProviderError,
    },
    identity::{AnonymousIdentity, Identity, LabeledIdentity},
    principal::Principal,
    storage::MemoryStore,
};
use tokio::sync::Notify;
use url::Url;

/// Start of 2024 in nanoseconds.
pub const START_NANOS: u64 = 1_704_067_200_000_000_000;

pub const HOUR_NANOS: u64 = 3_600_000_000_000;

/// Principal the scripted client logs in as.
pub const USER_PRINCIPAL: &str = "ukev2-6iweo-izmyj-rdxlb-jun6n-nef5z-gk2lp-fuzke-7ghpu-jecqq-iae";

/// Clock the test moves by hand.
#[derive(Debug)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new() -> Self {
        Self(AtomicU64::new(START_NANOS))
    }

    pub fn advance(&self, nanos: u64) {
        self.0.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// What the scripted client's interactive login does.
#[derive(Debug, Clone)]
pub enum LoginScript {
    /// Succeed immediately.
    Grant,
    /// Report a provider error.
    Deny(String),
    /// Never answer.
    Hang,
    /// Succeed once the gate is notified.
    Gate(Arc<Notify>),
}

/// Auth client whose answers the test controls.
#[derive(Debug)]
pub struct ScriptedClient {
    pub authenticated: AtomicBool,
    pub principal: Mutex<Principal>,
    pub fail_queries: AtomicBool,
    pub fail_logout: AtomicBool,
    pub script: Mutex<LoginScript>,
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(authenticated: bool) -> Arc<Self> {
        Arc::new(Self {
            authenticated: AtomicBool::new(authenticated),
            principal: Mutex::new(Principal::from_text(USER_PRINCIPAL).unwrap()),
            fail_queries: AtomicBool::new(false),
            fail_logout: AtomicBool::new(false),
            script: Mutex::new(LoginScript::Grant),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_script(&self, script: LoginScript) {
        *self.script.lock().unwrap() = script;
    }

    pub fn set_principal(&self, principal: Principal) {
        *self.principal.lock().unwrap() = principal;
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Wait until the interactive login has been entered `calls` times.
    pub async fn wait_for_login_calls(&self, calls: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.login_calls() < calls {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("login was never entered");
    }

    fn check_queries(&self, operation: &'static str) -> Result<(), BackendError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(BackendError::Query {
                operation,
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AuthClient for ScriptedClient {
    async fn is_authenticated(&self) -> Result<bool, BackendError> {
        self.check_queries("is_authenticated")?;
        Ok(self.authenticated.load(Ordering::SeqCst))
    }

    fn identity(&self) -> Result<Arc<dyn Identity>, BackendError> {
        self.check_queries("identity")?;
        if self.authenticated.load(Ordering::SeqCst) {
            let principal = self.principal.lock().unwrap().clone();
            Ok(Arc::new(LabeledIdentity::new(principal)))
        } else {
            Ok(Arc::new(AnonymousIdentity))
        }
    }

    async fn login(&self, _options: LoginOptions) -> Result<(), ProviderError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap().clone();
        match script {
            LoginScript::Grant => {}
            LoginScript::Deny(reason) => return Err(ProviderError::Denied { reason }),
            LoginScript::Hang => std::future::pending::<()>().await,
            LoginScript::Gate(gate) => gate.notified().await,
        }
        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> Result<(), BackendError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.authenticated.store(false, Ordering::SeqCst);
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(BackendError::Query {
                operation: "logout",
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Backend handing out one shared scripted client.
#[derive(Debug)]
pub struct ScriptedBackend {
    pub client: Arc<ScriptedClient>,
    pub fail_create: AtomicBool,
    pub creates: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(client: Arc<ScriptedClient>) -> Arc<Self> {
        Arc::new(Self {
            client,
            fail_create: AtomicBool::new(false),
            creates: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl IdentityBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Live
    }

    async fn create(&self) -> Result<Arc<dyn AuthClient>, BackendError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BackendError::Query {
                operation: "create",
                reason: "scripted failure".to_string(),
            });
        }
        Ok(self.client.clone())
    }
}

pub fn services() -> Vec<ServiceSpec> {
    vec![
        ServiceSpec::new(
            "community",
            Some(Principal::from_text("rrkah-fqaaa-aaaaa-aaaaq-cai").unwrap()),
        ),
        ServiceSpec::new(
            "economy",
            Some(Principal::from_text("ryjl3-tyaaa-aaaaa-aaaba-cai").unwrap()),
        ),
    ]
}

pub fn login_options() -> LoginOptions {
    LoginOptions {
        identity_provider: Url::parse("http://rdmx6-jaaaa-aaaaa-aaadq-cai.localhost:4943")
            .unwrap(),
        max_time_to_live: Duration::from_secs(8 * 60 * 60),
    }
}

/// Controller parts around `backend` with stand-in actors and shared storage.
pub fn parts(
    mode: SessionMode,
    backend: Arc<dyn IdentityBackend>,
    storage: Arc<MemoryStore>,
) -> ControllerParts {
    let actor_factory: Arc<dyn ActorFactory> = Arc::new(StandInActorFactory);
    ControllerParts {
        mode,
        backend,
        actor_factory,
        storage,
        store: SessionStore::new(),
        services: services(),
        host: Url::parse("http://127.0.0.1:4943").unwrap(),
        login_options: login_options(),
        login_timeout: Some(Duration::from_secs(5)),
    }
}

/// A live-mode controller driven by `client`.
pub fn scripted_controller(
    client: &Arc<ScriptedClient>,
) -> (Arc<SessionController>, Arc<ScriptedBackend>, Arc<MemoryStore>) {
    let backend = ScriptedBackend::new(client.clone());
    let storage = Arc::new(MemoryStore::new());
    let controller = SessionController::new(parts(
        SessionMode::Live,
        backend.clone(),
        storage.clone(),
    ));
    (Arc::new(controller), backend, storage)
}
