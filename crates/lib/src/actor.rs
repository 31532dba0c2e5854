//! Actor handles and the factories that build them.
//!
//! An [`Actor`] is a typed remote-call handle for one backend service
//! (e.g. "community" or "economy"), bound to the caller's identity through an
//! [`Agent`]. The session layer only provisions actors; what is called on them
//! belongs to the rest of the application.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use url::Url;

use crate::{identity::Identity, principal::Principal};

/// Request timeout applied to agent HTTP calls.
const AGENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while building agents and actors.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("No canister id configured for service {service}")]
    MissingCanisterId { service: String },

    #[error("HTTP transport failed")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    #[error("Replica at {host} answered with HTTP status {status}")]
    Unhealthy { host: String, status: u16 },
}

impl ActorError {
    /// Check if this error is a configuration problem rather than a network one.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, ActorError::MissingCanisterId { .. })
    }
}

/// A backend service the application needs an actor for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub canister_id: Option<Principal>,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, canister_id: Option<Principal>) -> Self {
        Self {
            name: name.into(),
            canister_id,
        }
    }
}

/// Transport bound to an identity.
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Clone, Debug)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

#[derive(Debug)]
struct AgentInner {
    host: Url,
    identity: Arc<dyn Identity>,
    http: reqwest::Client,
}

impl Agent {
    /// Create an agent talking to `host` on behalf of `identity`.
    pub fn new(host: Url, identity: Arc<dyn Identity>) -> Result<Self, ActorError> {
        let http = reqwest::Client::builder()
            .timeout(AGENT_REQUEST_TIMEOUT)
            .build()
            .map_err(|source| ActorError::Transport { source })?;
        Ok(Self {
            inner: Arc::new(AgentInner {
                host,
                identity,
                http,
            }),
        })
    }

    pub fn host(&self) -> &Url {
        &self.inner.host
    }

    pub fn identity(&self) -> &Arc<dyn Identity> {
        &self.inner.identity
    }

    /// Principal of the identity this agent signs for.
    pub fn principal(&self) -> Principal {
        self.inner.identity.principal()
    }

    /// HTTP client for callers issuing requests through this agent.
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Probe the replica's status endpoint, returning the HTTP status code.
    pub async fn status(&self) -> Result<u16, ActorError> {
        let url = self
            .inner
            .host
            .join("api/v2/status")
            .unwrap_or_else(|_| self.inner.host.clone());
        let response = self
            .inner
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ActorError::Transport { source })?;
        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(ActorError::Unhealthy {
                host: self.inner.host.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

/// How an actor reaches its service.
#[derive(Clone, Debug)]
pub enum ActorBinding {
    /// Calls go through the agent to the canister.
    Remote(Agent),
    /// Local stand-in; nothing leaves the process.
    StandIn,
}

/// Remote-call handle for one service.
#[derive(Clone, Debug)]
pub struct Actor {
    service: String,
    canister_id: String,
    caller: Principal,
    binding: ActorBinding,
}

impl Actor {
    pub fn remote(service: impl Into<String>, canister_id: &Principal, agent: Agent) -> Self {
        Self {
            service: service.into(),
            canister_id: canister_id.to_text().to_string(),
            caller: agent.principal(),
            binding: ActorBinding::Remote(agent),
        }
    }

    pub fn stand_in(
        service: impl Into<String>,
        canister_id: impl Into<String>,
        caller: Principal,
    ) -> Self {
        Self {
            service: service.into(),
            canister_id: canister_id.into(),
            caller,
            binding: ActorBinding::StandIn,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn canister_id(&self) -> &str {
        &self.canister_id
    }

    /// Principal the actor's calls are made as.
    pub fn caller(&self) -> &Principal {
        &self.caller
    }

    pub fn binding(&self) -> &ActorBinding {
        &self.binding
    }

    pub fn agent(&self) -> Option<&Agent> {
        match &self.binding {
            ActorBinding::Remote(agent) => Some(agent),
            ActorBinding::StandIn => None,
        }
    }

    pub fn is_stand_in(&self) -> bool {
        matches!(self.binding, ActorBinding::StandIn)
    }
}

/// Builds actors for configured services from an authenticated agent.
pub trait ActorFactory: Send + Sync + std::fmt::Debug {
    fn build(&self, service: &ServiceSpec, agent: &Agent) -> Result<Actor, ActorError>;
}

/// Factory producing agent-bound actors; every service needs a canister id.
#[derive(Debug, Default, Clone, Copy)]
pub struct AgentActorFactory;

impl ActorFactory for AgentActorFactory {
    fn build(&self, service: &ServiceSpec, agent: &Agent) -> Result<Actor, ActorError> {
        let canister_id =
            service
                .canister_id
                .as_ref()
                .ok_or_else(|| ActorError::MissingCanisterId {
                    service: service.name.clone(),
                })?;
        tracing::debug!(service = %service.name, canister = %canister_id, "Building actor");
        Ok(Actor::remote(&service.name, canister_id, agent.clone()))
    }
}

/// Factory producing stand-in actors that never touch the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandInActorFactory;

impl ActorFactory for StandInActorFactory {
    fn build(&self, service: &ServiceSpec, agent: &Agent) -> Result<Actor, ActorError> {
        let canister_id = service
            .canister_id
            .as_ref()
            .map(|id| id.to_text().to_string())
            .unwrap_or_else(|| format!("demo-{}", service.name));
        Ok(Actor::stand_in(&service.name, canister_id, agent.principal()))
    }
}
