//! Live backend: delegated Ed25519 session keys.
//!
//! The client owns a session key that is persisted on creation. Logging in
//! asks the [`IdentityProvider`] to delegate the user's identity to that key;
//! the delegation is stored next to it and reused until it expires. Logging
//! out forgets both and rotates the key in memory.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{
    AuthClient, AuthorizeRequest, BackendError, BackendKind, IdentityBackend, IdentityProvider,
    LoginOptions, ProviderError,
};
use crate::{
    clock::{Clock, rfc3339_from_nanos},
    constants::{DELEGATION_KEY, SESSION_KEY_KEY},
    identity::{AnonymousIdentity, DelegatedIdentity, Delegation, Identity, SessionKey},
    storage::KeyValueStore,
};

/// Backend producing [`LiveClient`]s.
#[derive(Debug, Clone)]
pub struct LiveBackend {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    provider: Arc<dyn IdentityProvider>,
}

impl LiveBackend {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            storage,
            clock,
            provider,
        }
    }
}

#[async_trait]
impl IdentityBackend for LiveBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Live
    }

    async fn create(&self) -> Result<Arc<dyn AuthClient>, BackendError> {
        let client = LiveClient::restore(
            Arc::clone(&self.storage),
            Arc::clone(&self.clock),
            Arc::clone(&self.provider),
        )?;
        Ok(Arc::new(client))
    }
}

#[derive(Debug)]
struct LiveState {
    key: Arc<SessionKey>,
    delegation: Option<Delegation>,
}

/// Auth client backed by a session key and an optional delegation.
#[derive(Debug)]
pub struct LiveClient {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    provider: Arc<dyn IdentityProvider>,
    state: Mutex<LiveState>,
}

impl LiveClient {
    /// Load the stored key and delegation, generating a key if none exists.
    ///
    /// Unreadable key material is replaced rather than reported; the only
    /// consequence is that the user has to log in again. Expired or
    /// unreadable delegations are removed from storage.
    pub fn restore(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, BackendError> {
        let stored_key = match storage.get(SESSION_KEY_KEY)? {
            Some(encoded) => match SessionKey::from_encoded(&encoded) {
                Ok(key) => Some(key),
                Err(err) => {
                    tracing::warn!(error = %err, "Discarding unreadable session key");
                    None
                }
            },
            None => None,
        };

        let (key, delegation) = match stored_key {
            Some(key) => (key, load_delegation(storage.as_ref(), clock.now_nanos())?),
            None => {
                let key = SessionKey::generate();
                storage.set(SESSION_KEY_KEY, &key.to_encoded())?;
                // A delegation is bound to the key it was issued for.
                storage.remove(DELEGATION_KEY)?;
                (key, None)
            }
        };

        tracing::debug!(
            delegated = delegation.is_some(),
            "Restored live auth client"
        );
        Ok(Self {
            storage,
            clock,
            provider,
            state: Mutex::new(LiveState {
                key: Arc::new(key),
                delegation,
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, LiveState>, BackendError> {
        self.state.lock().map_err(|_| BackendError::Query {
            operation: "lock",
            reason: "client state lock poisoned".to_string(),
        })
    }

    fn valid_delegation(&self, state: &LiveState) -> Option<Delegation> {
        let now = self.clock.now_nanos();
        state
            .delegation
            .as_ref()
            .filter(|delegation| delegation.is_valid_at(now))
            .cloned()
    }
}

fn load_delegation(
    storage: &dyn KeyValueStore,
    now_nanos: u64,
) -> Result<Option<Delegation>, BackendError> {
    let Some(raw) = storage.get(DELEGATION_KEY)? else {
        return Ok(None);
    };
    match serde_json::from_str::<Delegation>(&raw) {
        Ok(delegation) if delegation.is_valid_at(now_nanos) => Ok(Some(delegation)),
        Ok(_) => {
            tracing::debug!("Stored delegation expired");
            storage.remove(DELEGATION_KEY)?;
            Ok(None)
        }
        Err(err) => {
            tracing::warn!(error = %err, "Discarding unreadable delegation");
            storage.remove(DELEGATION_KEY)?;
            Ok(None)
        }
    }
}

#[async_trait]
impl AuthClient for LiveClient {
    async fn is_authenticated(&self) -> Result<bool, BackendError> {
        let state = self.lock()?;
        Ok(self.valid_delegation(&state).is_some())
    }

    fn identity(&self) -> Result<Arc<dyn Identity>, BackendError> {
        let state = self.lock()?;
        match self.valid_delegation(&state) {
            Some(delegation) => Ok(Arc::new(DelegatedIdentity::new(delegation))),
            None => Ok(Arc::new(AnonymousIdentity)),
        }
    }

    async fn login(&self, options: LoginOptions) -> Result<(), ProviderError> {
        let key = Arc::clone(&self.lock()?.key);
        self.storage
            .set(SESSION_KEY_KEY, &key.to_encoded())
            .map_err(BackendError::from)?;

        let request = AuthorizeRequest {
            identity_provider: options.identity_provider,
            session_public_key: key.public_key_der(),
            max_time_to_live: options.max_time_to_live,
        };
        let delegation = self.provider.authorize(request).await?;
        if !delegation.is_valid_at(self.clock.now_nanos()) {
            return Err(ProviderError::Callback {
                reason: "delegation is empty or already expired".to_string(),
            });
        }

        let encoded = serde_json::to_string(&delegation)
            .map_err(|source| BackendError::Delegation { source })?;

        let mut state = self.lock()?;
        if !Arc::ptr_eq(&state.key, &key) {
            // Logged out while the provider was open; the grant is for a
            // key that no longer exists.
            return Err(ProviderError::Closed);
        }
        self.storage
            .set(DELEGATION_KEY, &encoded)
            .map_err(BackendError::from)?;
        tracing::info!(
            principal = %delegation.principal(),
            expires = %rfc3339_from_nanos(delegation.expiration),
            "Delegation stored"
        );
        state.delegation = Some(delegation);
        Ok(())
    }

    async fn logout(&self) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        state.delegation = None;
        state.key = Arc::new(SessionKey::generate());
        self.storage.remove(DELEGATION_KEY)?;
        self.storage.remove(SESSION_KEY_KEY)?;
        tracing::debug!("Live auth client logged out");
        Ok(())
    }
}
