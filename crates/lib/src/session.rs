//! The session value published to the rest of the application.
//!
//! A [`Session`] is immutable: every transition builds a new one and the
//! controller publishes it whole, so observers never see a half-derived
//! state. Its [`SessionStatus`] is computed from the fields rather than
//! stored, and the constructors make the two invariants hold by
//! construction:
//!
//! * the status is `Authenticated` iff a client, an identity and a
//!   non-anonymous principal are all present;
//! * actors exist only on authenticated sessions.

use std::{collections::BTreeMap, sync::Arc};

use crate::{actor::Actor, backend::AuthClient, identity::Identity, principal::Principal};

/// Actor handles keyed by logical service name.
pub type ActorMap = BTreeMap<String, Actor>;

/// Derived authentication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Unauthenticated,
    Authenticated,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Unauthenticated => f.write_str("unauthenticated"),
            SessionStatus::Authenticated => f.write_str("authenticated"),
        }
    }
}

/// Snapshot of the authentication state.
#[derive(Clone, Default)]
pub struct Session {
    client: Option<Arc<dyn AuthClient>>,
    identity: Option<Arc<dyn Identity>>,
    principal: Option<Principal>,
    actors: ActorMap,
}

impl Session {
    /// An authenticated session.
    ///
    /// Returns `None` when the principal is anonymous or no actors were
    /// provided, since such a session could not be authenticated.
    pub fn authenticated(
        client: Arc<dyn AuthClient>,
        identity: Arc<dyn Identity>,
        principal: Principal,
        actors: ActorMap,
    ) -> Option<Self> {
        if principal.is_anonymous() || actors.is_empty() {
            return None;
        }
        Some(Self {
            client: Some(client),
            identity: Some(identity),
            principal: Some(principal),
            actors,
        })
    }

    /// An unauthenticated session, optionally remembering the client handle.
    pub fn unauthenticated(client: Option<Arc<dyn AuthClient>>) -> Self {
        Self {
            client,
            ..Self::default()
        }
    }

    /// An unauthenticated session that keeps the client's anonymous identity.
    ///
    /// A non-anonymous principal is dropped: a client that does not report
    /// itself authenticated must not publish a usable principal.
    pub fn anonymous(client: Arc<dyn AuthClient>, identity: Arc<dyn Identity>) -> Self {
        let principal = identity.principal();
        if !principal.is_anonymous() {
            return Self::unauthenticated(Some(client));
        }
        Self {
            client: Some(client),
            identity: Some(identity),
            principal: Some(principal),
            actors: ActorMap::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        match (&self.client, &self.identity, &self.principal) {
            (Some(_), Some(_), Some(principal)) if !principal.is_anonymous() => {
                SessionStatus::Authenticated
            }
            _ => SessionStatus::Unauthenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    pub fn client(&self) -> Option<&Arc<dyn AuthClient>> {
        self.client.as_ref()
    }

    pub fn identity(&self) -> Option<&Arc<dyn Identity>> {
        self.identity.as_ref()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn actors(&self) -> &ActorMap {
        &self.actors
    }

    /// Look up an actor by service name.
    pub fn actor(&self, service: &str) -> Option<&Actor> {
        self.actors.get(service)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status())
            .field("principal", &self.principal.as_ref().map(Principal::to_text))
            .field("actors", &self.actors.keys().collect::<Vec<_>>())
            .finish()
    }
}
