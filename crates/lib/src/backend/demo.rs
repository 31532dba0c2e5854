//! Demo backend: a signed-in user without an identity provider.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;

use super::{AuthClient, BackendError, BackendKind, IdentityBackend, LoginOptions, ProviderError};
use crate::{
    constants::DEMO_PRINCIPAL,
    identity::{AnonymousIdentity, Identity, LabeledIdentity},
    principal::Principal,
};

/// Backend whose clients are always `demo-principal` once logged in.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoBackend;

impl DemoBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentityBackend for DemoBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Demo
    }

    async fn create(&self) -> Result<Arc<dyn AuthClient>, BackendError> {
        tracing::info!("Demo mode: simulating authenticated user");
        Ok(Arc::new(DemoClient::new()))
    }
}

/// Client that starts signed in and logs in again instantly.
#[derive(Debug)]
pub struct DemoClient {
    authenticated: AtomicBool,
    principal: Principal,
}

impl DemoClient {
    pub fn new() -> Self {
        Self {
            authenticated: AtomicBool::new(true),
            principal: Principal::labeled(DEMO_PRINCIPAL),
        }
    }
}

impl Default for DemoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthClient for DemoClient {
    async fn is_authenticated(&self) -> Result<bool, BackendError> {
        Ok(self.authenticated.load(Ordering::SeqCst))
    }

    fn identity(&self) -> Result<Arc<dyn Identity>, BackendError> {
        if self.authenticated.load(Ordering::SeqCst) {
            Ok(Arc::new(LabeledIdentity::new(self.principal.clone())))
        } else {
            Ok(Arc::new(AnonymousIdentity))
        }
    }

    async fn login(&self, _options: LoginOptions) -> Result<(), ProviderError> {
        tracing::info!("Demo mode: simulating login");
        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> Result<(), BackendError> {
        tracing::info!("Demo mode: simulating logout");
        self.authenticated.store(false, Ordering::SeqCst);
        Ok(())
    }
}
