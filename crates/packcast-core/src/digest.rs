//! Pack digests.
//!
//! Clients verify a downloaded pack against a 160-bit SHA-1 digest of the
//! archive bytes. The digest travels as 40 lowercase hex characters; older
//! clients take the raw 20 bytes instead, so both forms are exposed here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};
use thiserror::Error;

/// Digest length in bytes.
pub const DIGEST_LEN: usize = 20;

/// Length of the hex text form.
pub const HEX_LEN: usize = DIGEST_LEN * 2;

/// SHA-1 digest of a pack's byte content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackHash([u8; DIGEST_LEN]);

impl PackHash {
    /// Hash a complete byte slice.
    pub fn of(data: &[u8]) -> Self {
        Self::from_slice(&Sha1::digest(data))
    }

    fn from_slice(digest: &[u8]) -> Self {
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(digest);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Binary form, for clients that predate the hex form.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex form. Always `HEX_LEN` characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the hex form. Upper-case input is accepted; output is always
    /// lowercase.
    pub fn from_hex(text: &str) -> Result<Self, HashParseError> {
        let text = text.trim();
        if text.len() != HEX_LEN {
            return Err(HashParseError::Length(text.len()));
        }
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(text, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for PackHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PackHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackHash({})", self.to_hex())
    }
}

impl FromStr for PackHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for PackHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PackHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Incremental SHA-1 hasher for pack bodies that arrive in pieces.
///
/// # Example
/// ```
/// use packcast_core::digest::PackHasher;
/// use packcast_core::PackHash;
/// let mut h = PackHasher::new();
/// h.update(b"hello ");
/// h.update(b"world");
/// assert_eq!(h.finalize(), PackHash::of(b"hello world"));
/// ```
pub struct PackHasher(Sha1);

impl PackHasher {
    pub fn new() -> Self {
        Self(Sha1::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> PackHash {
        PackHash::from_slice(&self.0.finalize())
    }
}

impl Default for PackHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum HashParseError {
    #[error("pack hash must be {HEX_LEN} hex characters, got {0}")]
    Length(usize),
    #[error("pack hash is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}
