//! Error types for session controller operations.

use std::time::Duration;

use thiserror::Error;

use crate::{actor::ActorError, backend::BackendError};

/// Errors surfaced by [`SessionController`](super::SessionController).
///
/// None of these leave a partially updated session behind: when an
/// operation fails, the published session is the one from before the call.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
    /// Querying the client, its identity or its principal failed.
    #[error("Backend query {operation} failed")]
    BackendQueryFailed {
        /// The query that failed
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    /// The identity provider did not grant the login.
    #[error("Login denied: {reason}")]
    LoginDenied {
        /// Reason reported by the provider or the flow
        reason: String,
    },

    /// Another login is still waiting for the provider.
    #[error("A login is already in progress")]
    LoginAlreadyInProgress,

    /// The provider did not answer in time.
    #[error("Login timed out after {timeout:?}")]
    LoginTimedOut {
        /// The bound that elapsed
        timeout: Duration,
    },

    /// A logout superseded the login.
    #[error("Login cancelled by logout")]
    LoginCancelled,

    /// An actor could not be built for a service.
    #[error("No actor available for service {service}")]
    ActorUnavailable {
        /// The service the actor was for
        service: String,
        #[source]
        source: ActorError,
    },

    /// `initialize` was already called on this controller.
    #[error("Session controller already initialized")]
    AlreadyInitialized,

    /// The derived state does not form a valid session.
    #[error("Invalid session: {reason}")]
    InvalidSession {
        /// What was wrong with it
        reason: String,
    },
}

impl SessionError {
    /// Check if this error came from querying the backend.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, SessionError::BackendQueryFailed { .. })
    }

    /// Check if this error ended an interactive login without a new session.
    pub fn is_login_failure(&self) -> bool {
        matches!(
            self,
            SessionError::LoginDenied { .. }
                | SessionError::LoginTimedOut { .. }
                | SessionError::LoginCancelled
        )
    }

    /// Check if this error is the single-flight guard rejecting a login.
    pub fn is_already_in_progress(&self) -> bool {
        matches!(self, SessionError::LoginAlreadyInProgress)
    }

    /// Check if this error is about building actors.
    pub fn is_actor_error(&self) -> bool {
        matches!(self, SessionError::ActorUnavailable { .. })
    }
}

impl From<SessionError> for crate::Error {
    fn from(err: SessionError) -> Self {
        crate::Error::Session(err)
    }
}
