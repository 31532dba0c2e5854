//! Principals: the stable identifiers the identity provider issues.
//!
//! A principal is shown to users (and persisted) in its textual form: the
//! big-endian CRC-32 of the raw bytes followed by the bytes themselves,
//! base32-encoded in lowercase without padding and split into groups of
//! five characters joined by `-`.
//!
//! Three kinds of principal matter to the session layer:
//!
//! * the **anonymous** principal (`2vxsx-fae`), which a client reports when
//!   nobody is signed in;
//! * **self-authenticating** principals derived from a DER public key, which
//!   is what a delegation from the identity provider resolves to;
//! * **labeled** principals, known only by their display text, which stand-in
//!   backends use (e.g. `demo-principal`).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224};
use thiserror::Error;

/// Trailing tag byte of a self-authenticating principal.
const SELF_AUTHENTICATING_TAG: u8 = 0x02;

/// The single byte making up the anonymous principal.
const ANONYMOUS_TAG: u8 = 0x04;

/// Longest raw principal accepted.
const MAX_PRINCIPAL_BYTES: usize = 29;

const ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Errors raised while parsing principal text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("Principal text contains an invalid character: {text}")]
    InvalidCharacter { text: String },

    #[error("Principal text is too short: {text}")]
    TooShort { text: String },

    #[error("Principal is {len} bytes, at most 29 are allowed")]
    TooLong { len: usize },

    #[error("Principal checksum mismatch: {text}")]
    ChecksumMismatch { text: String },

    #[error("Principal text is not in canonical form: expected {expected}, got {actual}")]
    NotCanonical { expected: String, actual: String },
}

/// A provider-issued identifier, possibly anonymous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Principal {
    text: String,
    anonymous: bool,
}

impl Principal {
    /// Build a principal from its raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrincipalError> {
        if bytes.len() > MAX_PRINCIPAL_BYTES {
            return Err(PrincipalError::TooLong { len: bytes.len() });
        }
        Ok(Self {
            text: encode_text(bytes),
            anonymous: bytes == [ANONYMOUS_TAG],
        })
    }

    /// Parse the textual form, verifying checksum and canonical grouping.
    pub fn from_text(text: &str) -> Result<Self, PrincipalError> {
        let compact: String = text.chars().filter(|c| *c != '-').collect();
        let decoded = base32_decode(&compact).ok_or_else(|| PrincipalError::InvalidCharacter {
            text: text.to_string(),
        })?;
        if decoded.len() < 4 {
            return Err(PrincipalError::TooShort {
                text: text.to_string(),
            });
        }
        let (checksum, bytes) = decoded.split_at(4);
        if checksum != crc32fast::hash(bytes).to_be_bytes() {
            return Err(PrincipalError::ChecksumMismatch {
                text: text.to_string(),
            });
        }
        let principal = Self::from_slice(bytes)?;
        if principal.text != text {
            return Err(PrincipalError::NotCanonical {
                expected: principal.text,
                actual: text.to_string(),
            });
        }
        Ok(principal)
    }

    /// The anonymous principal, `2vxsx-fae`.
    pub fn anonymous() -> Self {
        Self {
            text: encode_text(&[ANONYMOUS_TAG]),
            anonymous: true,
        }
    }

    /// The management canister principal, `aaaaa-aa`.
    pub fn management() -> Self {
        Self {
            text: encode_text(&[]),
            anonymous: false,
        }
    }

    /// Principal of the holder of a DER-encoded public key.
    pub fn self_authenticating(der_public_key: &[u8]) -> Self {
        let mut bytes = Sha224::digest(der_public_key).to_vec();
        bytes.push(SELF_AUTHENTICATING_TAG);
        Self {
            text: encode_text(&bytes),
            anonymous: false,
        }
    }

    /// A non-anonymous principal known only by its display label.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            text: label.into(),
            anonymous: false,
        }
    }

    /// The display text.
    pub fn to_text(&self) -> &str {
        &self.text
    }

    /// Whether this is the anonymous principal.
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl std::str::FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

fn encode_text(bytes: &[u8]) -> String {
    let mut raw = crc32fast::hash(bytes).to_be_bytes().to_vec();
    raw.extend_from_slice(bytes);
    let encoded = base32_encode(&raw);

    let mut text = String::with_capacity(encoded.len() + encoded.len() / 5);
    for (i, c) in encoded.chars().enumerate() {
        if i > 0 && i % 5 == 0 {
            text.push('-');
        }
        text.push(c);
    }
    text
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for c in text.bytes() {
        let value = ALPHABET.iter().position(|&a| a == c)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    Some(out)
}
