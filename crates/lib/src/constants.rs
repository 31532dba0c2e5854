//! Constants used throughout the session library.
//!
//! Storage keys, well-known service names and network endpoints live here so
//! the controller, the backends and the CLI agree on them.

use std::time::Duration;

/// Persisted key holding the display text of the signed-in principal.
pub const USER_PRINCIPAL_KEY: &str = "userPrincipal";

/// Storage key for the live backend's serialized session key.
pub const SESSION_KEY_KEY: &str = "identity";

/// Storage key for the live backend's serialized delegation.
pub const DELEGATION_KEY: &str = "delegation";

/// Logical name of the community service.
pub const COMMUNITY_SERVICE: &str = "community";

/// Logical name of the economy service.
pub const ECONOMY_SERVICE: &str = "economy";

/// Principal text reported by the demo backend.
pub const DEMO_PRINCIPAL: &str = "demo-principal";

/// Identity provider used on the `ic` network.
pub const MAINNET_IDENTITY_PROVIDER: &str = "https://identity.ic0.app/";

/// Identity provider canister served by a local replica.
pub const LOCAL_IDENTITY_PROVIDER: &str = "http://rdmx6-jaaaa-aaaaa-aaadq-cai.localhost:4943";

/// Boundary node host for agents on the `ic` network.
pub const MAINNET_HOST: &str = "https://icp-api.io";

/// Local replica host for agents.
pub const LOCAL_HOST: &str = "http://127.0.0.1:4943";

/// Default bound on the interactive provider round-trip.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

/// Default delegation lifetime requested from the provider (8 hours).
pub const DEFAULT_MAX_TIME_TO_LIVE: Duration = Duration::from_secs(8 * 60 * 60);

/// Default loopback port for the provider callback; 0 picks a free port.
pub const DEFAULT_CALLBACK_PORT: u16 = 0;

/// File name used by the file-backed key-value store.
pub const STORAGE_FILE: &str = "session.json";
