//!
//! liftcash-session: client-side session and identity management.
//!
//! The crate authenticates a user against a delegated identity provider and
//! hands the rest of an application the actor handles it needs to call
//! backend services as that user.
//!
//! ## Core Concepts
//!
//! * **Sessions (`session::Session`)**: Immutable snapshots of the authentication state: client, identity, principal and actors. Their status is derived, never set.
//! * **Controller (`controller::SessionController`)**: The single owner of the session. It runs `initialize`, `login` and `logout` and publishes exactly one new session per transition.
//! * **Store (`store::SessionStore`)**: The publish/subscribe boundary. Everyone except the controller reads through a `SessionSubscription`.
//! * **Backends (`backend::IdentityBackend`)**: Where auth clients come from. `DemoBackend` synthesizes a user locally; `LiveBackend` holds a delegated Ed25519 session key.
//! * **Actors (`actor::Actor`)**: Remote-call handles for the "community" and "economy" services, built by an `ActorFactory` from an identity-bound `Agent`.
//! * **Principals (`principal::Principal`)**: Textual identifiers of users and canisters; the anonymous principal means "not actually logged in".

pub mod actor;
pub mod backend;
pub mod clock;
pub mod config;
pub mod constants;
pub mod controller;
pub mod identity;
pub mod principal;
pub mod session;
pub mod storage;
pub mod store;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use config::{Network, SessionConfig, SessionMode};
pub use controller::{ControllerParts, SessionController, SessionError};
pub use principal::Principal;
pub use session::{Session, SessionStatus};
pub use store::{SessionStore, SessionSubscription};

/// Result type used throughout the liftcash-session library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the liftcash-session library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structured controller errors from the controller module
    #[error(transparent)]
    Session(controller::SessionError),

    /// Structured client errors from the backend module
    #[error(transparent)]
    Backend(backend::BackendError),

    /// Structured login flow errors from the backend module
    #[error(transparent)]
    Provider(backend::ProviderError),

    /// Structured actor errors from the actor module
    #[error(transparent)]
    Actor(actor::ActorError),

    /// Structured configuration errors from the config module
    #[error(transparent)]
    Config(config::ConfigError),

    /// Structured storage errors from the storage module
    #[error(transparent)]
    Storage(storage::StorageError),

    /// Structured principal errors from the principal module
    #[error(transparent)]
    Principal(principal::PrincipalError),

    /// Structured identity errors from the identity module
    #[error(transparent)]
    Identity(identity::IdentityError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Session(_) => "controller",
            Error::Backend(_) | Error::Provider(_) => "backend",
            Error::Actor(_) => "actor",
            Error::Config(_) => "config",
            Error::Storage(_) => "storage",
            Error::Principal(_) => "principal",
            Error::Identity(_) => "identity",
        }
    }

    /// Check if this error ended a login without a new session.
    pub fn is_login_failure(&self) -> bool {
        match self {
            Error::Session(err) => err.is_login_failure(),
            Error::Provider(_) => true,
            _ => false,
        }
    }

    /// Check if this error came from querying or updating an auth client.
    pub fn is_backend_error(&self) -> bool {
        match self {
            Error::Session(err) => err.is_backend_error(),
            Error::Backend(_) => true,
            _ => false,
        }
    }

    /// Check if this error is a configuration problem.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::Actor(err) => err.is_configuration_error(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Storage(err) => err.is_io_error(),
            Error::Backend(err) => err.is_storage_error(),
            _ => false,
        }
    }
}

impl From<actor::ActorError> for Error {
    fn from(err: actor::ActorError) -> Self {
        Error::Actor(err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<storage::StorageError> for Error {
    fn from(err: storage::StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<principal::PrincipalError> for Error {
    fn from(err: principal::PrincipalError) -> Self {
        Error::Principal(err)
    }
}

impl From<identity::IdentityError> for Error {
    fn from(err: identity::IdentityError) -> Self {
        Error::Identity(err)
    }
}
