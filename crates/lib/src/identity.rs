//! Identities and the key material behind them.
//!
//! An [`Identity`] is the credential a client hands out once queried; the
//! session layer only ever asks it for its [`Principal`]. The live backend
//! holds an Ed25519 [`SessionKey`] and, after a successful login, a
//! [`Delegation`] from the identity provider that binds the session key to
//! the user's principal until it expires.

use base64ct::{Base64UrlUnpadded, Encoding};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::principal::Principal;

/// DER prefix of an Ed25519 SubjectPublicKeyInfo.
const ED25519_DER_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Size of Ed25519 secret keys in bytes
pub const ED25519_SECRET_KEY_SIZE: usize = 32;

/// Errors raised while decoding key material.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid key encoding: {reason}")]
    InvalidEncoding { reason: String },

    #[error("Session key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}

/// A credential yielding a principal.
pub trait Identity: Send + Sync + std::fmt::Debug {
    /// The principal this identity speaks for.
    fn principal(&self) -> Principal;

    /// DER-encoded public key, absent for anonymous and labeled identities.
    fn public_key(&self) -> Option<Vec<u8>> {
        None
    }
}

/// The identity of nobody in particular.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentity;

impl Identity for AnonymousIdentity {
    fn principal(&self) -> Principal {
        Principal::anonymous()
    }
}

/// An identity known only by its principal label; used by stand-in backends.
#[derive(Debug, Clone)]
pub struct LabeledIdentity {
    principal: Principal,
}

impl LabeledIdentity {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }
}

impl Identity for LabeledIdentity {
    fn principal(&self) -> Principal {
        self.principal.clone()
    }
}

/// Ed25519 key generated per client and authorized by the identity provider.
///
/// Secret material is zeroed on drop.
pub struct SessionKey {
    signing_key: SigningKey,
}

impl SessionKey {
    /// Generate a fresh key from the OS random source.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Restore a key from the encoding produced by [`SessionKey::to_encoded`].
    pub fn from_encoded(encoded: &str) -> Result<Self, IdentityError> {
        let bytes = Zeroizing::new(Base64UrlUnpadded::decode_vec(encoded).map_err(|e| {
            IdentityError::InvalidEncoding {
                reason: e.to_string(),
            }
        })?);
        let secret: [u8; ED25519_SECRET_KEY_SIZE] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| IdentityError::InvalidKeyLength(bytes.len()))?;
        let secret = Zeroizing::new(secret);
        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    /// URL-safe base64 of the secret key, for the client's own storage only.
    pub fn to_encoded(&self) -> Zeroizing<String> {
        Zeroizing::new(Base64UrlUnpadded::encode_string(
            &self.signing_key.to_bytes(),
        ))
    }

    /// DER-encoded public key.
    pub fn public_key_der(&self) -> Vec<u8> {
        let mut der = ED25519_DER_PREFIX.to_vec();
        der.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        der
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field(
                "public_key",
                &Base64UrlUnpadded::encode_string(self.signing_key.verifying_key().as_bytes()),
            )
            .finish_non_exhaustive()
    }
}

/// Grant from the identity provider letting the session key act for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// DER public key of the delegating user; determines the principal.
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
    /// Expiry in nanoseconds since the Unix epoch.
    pub expiration: u64,
}

impl Delegation {
    pub fn principal(&self) -> Principal {
        Principal::self_authenticating(&self.public_key)
    }

    /// Whether the delegation is still usable at `now_nanos`.
    pub fn is_valid_at(&self, now_nanos: u64) -> bool {
        !self.public_key.is_empty() && now_nanos < self.expiration
    }
}

/// The delegating user, as seen through a granted [`Delegation`].
#[derive(Debug, Clone)]
pub struct DelegatedIdentity {
    delegation: Delegation,
}

impl DelegatedIdentity {
    pub fn new(delegation: Delegation) -> Self {
        Self { delegation }
    }

    pub fn delegation(&self) -> &Delegation {
        &self.delegation
    }
}

impl Identity for DelegatedIdentity {
    fn principal(&self) -> Principal {
        self.delegation.principal()
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        Some(self.delegation.public_key.clone())
    }
}

/// Serde adapter storing byte vectors as URL-safe unpadded base64.
pub(crate) mod base64_bytes {
    use base64ct::{Base64UrlUnpadded, Encoding};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&Base64UrlUnpadded::encode_string(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        Base64UrlUnpadded::decode_vec(&s).map_err(serde::de::Error::custom)
    }
}
