//! Identity backends.
//!
//! An [`IdentityBackend`] produces the [`AuthClient`] the controller derives
//! sessions from. Two variants exist and one is chosen from configuration at
//! startup:
//!
//! * [`DemoBackend`] synthesizes a signed-in user without any I/O;
//! * [`LiveBackend`] keeps an Ed25519 session key, asks an
//!   [`IdentityProvider`] to delegate to it and remembers the delegation
//!   until it expires.
//!
//! The traits mirror the capability the rest of the crate relies on:
//! `create() -> Client`, `Client::is_authenticated()`, `Client::identity()`,
//! `Client::login(options)` and `Client::logout()`.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use url::Url;

use crate::identity::Identity;

mod demo;
pub mod errors;
mod live;
pub mod provider;

pub use demo::{DemoBackend, DemoClient};
pub use errors::{BackendError, ProviderError};
pub use live::{LiveBackend, LiveClient};
pub use provider::{AuthorizeRequest, IdentityProvider, LoopbackProvider};

/// Which backend variant is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Demo,
    Live,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Demo => f.write_str("demo"),
            BackendKind::Live => f.write_str("live"),
        }
    }
}

/// Parameters for an interactive login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOptions {
    /// Where the user authorizes the session.
    pub identity_provider: Url,
    /// Requested lifetime of the delegation.
    pub max_time_to_live: Duration,
}

/// Session object of an identity backend.
#[async_trait]
pub trait AuthClient: Send + Sync + std::fmt::Debug {
    /// Whether the client currently holds a usable credential.
    async fn is_authenticated(&self) -> Result<bool, BackendError>;

    /// The current identity; anonymous when not authenticated.
    fn identity(&self) -> Result<Arc<dyn Identity>, BackendError>;

    /// Run the interactive login flow, resolving when the provider answers.
    async fn login(&self, options: LoginOptions) -> Result<(), ProviderError>;

    /// Forget the credential.
    async fn logout(&self) -> Result<(), BackendError>;
}

/// Factory for [`AuthClient`]s.
#[async_trait]
pub trait IdentityBackend: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> BackendKind;

    async fn create(&self) -> Result<Arc<dyn AuthClient>, BackendError>;
}
