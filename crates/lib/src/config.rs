//! Startup configuration.
//!
//! A [`SessionConfig`] is read once when the application starts and decides
//! which backend variant the controller uses, where the identity provider
//! and replica live, and which services get actors.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;
use url::Url;

use crate::{
    actor::ServiceSpec,
    constants::{
        COMMUNITY_SERVICE, DEFAULT_CALLBACK_PORT, DEFAULT_LOGIN_TIMEOUT, DEFAULT_MAX_TIME_TO_LIVE,
        ECONOMY_SERVICE, LOCAL_HOST, LOCAL_IDENTITY_PROVIDER, MAINNET_HOST,
        MAINNET_IDENTITY_PROVIDER,
    },
    principal::{Principal, PrincipalError},
    storage::StorageError,
};

/// Errors raised while assembling configuration.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing canister id for service {service}")]
    MissingCanisterId { service: String },

    #[error("Invalid canister id for service {service}")]
    InvalidCanisterId {
        service: String,
        #[source]
        source: PrincipalError,
    },

    #[error("Invalid URL {value}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unknown service {service}")]
    UnknownService { service: String },

    #[error("Failed to open session storage")]
    Storage {
        #[from]
        source: StorageError,
    },
}

impl ConfigError {
    /// Check if this error is about a canister id.
    pub fn is_canister_error(&self) -> bool {
        matches!(
            self,
            ConfigError::MissingCanisterId { .. } | ConfigError::InvalidCanisterId { .. }
        )
    }
}

/// Which backend variant runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Locally synthesized sessions, no identity provider.
    Demo,
    #[default]
    Live,
}

impl SessionMode {
    pub fn from_demo_flag(demo: bool) -> Self {
        if demo { SessionMode::Demo } else { SessionMode::Live }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionMode::Demo => f.write_str("demo"),
            SessionMode::Live => f.write_str("live"),
        }
    }
}

/// Deployment network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    /// Mainnet.
    Ic,
    /// Local replica.
    #[default]
    Local,
}

impl Network {
    /// `ic` selects mainnet; every other name means a local replica.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("ic") {
            Network::Ic
        } else {
            Network::Local
        }
    }

    pub fn default_identity_provider(self) -> &'static str {
        match self {
            Network::Ic => MAINNET_IDENTITY_PROVIDER,
            Network::Local => LOCAL_IDENTITY_PROVIDER,
        }
    }

    pub fn default_host(self) -> &'static str {
        match self {
            Network::Ic => MAINNET_HOST,
            Network::Local => LOCAL_HOST,
        }
    }
}

/// Configuration of a session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub mode: SessionMode,
    pub network: Network,
    pub identity_provider: Url,
    /// Replica the agent talks to.
    pub host: Url,
    /// Services that get an actor on authentication.
    pub services: Vec<ServiceSpec>,
    /// Bound on the interactive login; `None` waits forever.
    pub login_timeout: Option<Duration>,
    pub max_time_to_live: Duration,
    /// Loopback callback port; 0 picks a free one.
    pub callback_port: u16,
    /// Directory holding `session.json`; storage stays in memory when unset.
    pub data_dir: Option<PathBuf>,
}

impl SessionConfig {
    /// Defaults for `mode` on `network`, with no canister ids yet.
    pub fn new(mode: SessionMode, network: Network) -> Result<Self, ConfigError> {
        Ok(Self {
            mode,
            network,
            identity_provider: parse_url(network.default_identity_provider())?,
            host: parse_url(network.default_host())?,
            services: vec![
                ServiceSpec::new(COMMUNITY_SERVICE, None),
                ServiceSpec::new(ECONOMY_SERVICE, None),
            ],
            login_timeout: Some(DEFAULT_LOGIN_TIMEOUT),
            max_time_to_live: DEFAULT_MAX_TIME_TO_LIVE,
            callback_port: DEFAULT_CALLBACK_PORT,
            data_dir: None,
        })
    }

    /// Demo configuration on the local network.
    pub fn demo() -> Result<Self, ConfigError> {
        Self::new(SessionMode::Demo, Network::Local)
    }

    pub fn with_identity_provider(mut self, url: &str) -> Result<Self, ConfigError> {
        self.identity_provider = parse_url(url)?;
        Ok(self)
    }

    pub fn with_host(mut self, url: &str) -> Result<Self, ConfigError> {
        self.host = parse_url(url)?;
        Ok(self)
    }

    /// Set a service's canister id from its principal text.
    pub fn with_canister_id(mut self, service: &str, text: &str) -> Result<Self, ConfigError> {
        let canister_id =
            Principal::from_text(text).map_err(|source| ConfigError::InvalidCanisterId {
                service: service.to_string(),
                source,
            })?;
        let spec = self
            .services
            .iter_mut()
            .find(|spec| spec.name == service)
            .ok_or_else(|| ConfigError::UnknownService {
                service: service.to_string(),
            })?;
        spec.canister_id = Some(canister_id);
        Ok(self)
    }

    /// Seconds to wait for the provider; 0 disables the bound.
    pub fn with_login_timeout_secs(mut self, secs: u64) -> Self {
        self.login_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Check the configuration is usable for its mode.
    ///
    /// Live mode needs a canister id for every service; demo mode invents
    /// stand-ins for the ones that are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == SessionMode::Demo {
            return Ok(());
        }
        match self.services.iter().find(|spec| spec.canister_id.is_none()) {
            Some(spec) => Err(ConfigError::MissingCanisterId {
                service: spec.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn parse_url(value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        value: value.to_string(),
        source,
    })
}
