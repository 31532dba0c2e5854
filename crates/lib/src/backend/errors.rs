//! Error types for identity backends.
//!
//! [`BackendError`] covers querying and maintaining a client's state;
//! [`ProviderError`] covers the interactive login round-trip with the
//! identity provider.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors raised while querying or updating an auth client.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// A client query could not be answered.
    #[error("Backend query {operation} failed: {reason}")]
    Query {
        /// The query that failed
        operation: &'static str,
        /// Description of the failure
        reason: String,
    },

    /// Client storage could not be read or written.
    #[error("Backend storage failed")]
    Storage {
        #[from]
        source: StorageError,
    },

    /// A delegation could not be encoded for storage.
    #[error("Delegation could not be serialized")]
    Delegation {
        #[source]
        source: serde_json::Error,
    },
}

impl BackendError {
    /// Check if this error came from client storage.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, BackendError::Storage { .. })
    }

    /// Name of the failed query, if this error is about one.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            BackendError::Query { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

/// Errors raised by the interactive login flow.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider reported that the user did not authorize the session.
    #[error("Identity provider denied the login: {reason}")]
    Denied { reason: String },

    /// The loopback callback listener could not be started.
    #[error("Failed to bind login callback on {address}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The provider answered with something that is not a usable delegation.
    #[error("Malformed provider callback: {reason}")]
    Callback { reason: String },

    /// The flow stopped before the provider answered.
    #[error("Login flow closed before the provider answered")]
    Closed,

    /// The granted delegation could not be stored.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ProviderError {
    /// Check if the provider itself refused the login.
    pub fn is_denied(&self) -> bool {
        matches!(self, ProviderError::Denied { .. })
    }
}

impl From<BackendError> for crate::Error {
    fn from(err: BackendError) -> Self {
        crate::Error::Backend(err)
    }
}

impl From<ProviderError> for crate::Error {
    fn from(err: ProviderError) -> Self {
        crate::Error::Provider(err)
    }
}
