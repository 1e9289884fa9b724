//! 32-byte ledger addresses.
//!
//! A [`Pubkey`] is either an Ed25519 public key (wallets) or a derived
//! address (program-owned accounts). Both render as base58 on the wire and
//! in logs; the raw bytes are what go into seeds and instruction metas.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::ADDRESS_LENGTH;

/// Errors parsing an address from text or bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PubkeyError {
    #[error("invalid base58 address: {0}")]
    InvalidBase58(String),

    #[error("invalid address length: expected {ADDRESS_LENGTH} bytes, got {0}")]
    InvalidLength(usize),
}

/// A 32-byte ledger address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Pubkey([u8; ADDRESS_LENGTH]);

impl Pubkey {
    /// Wraps raw address bytes.
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parses a base58 literal that is known-good at compile time.
    ///
    /// # Panics
    ///
    /// Panics if `s` is not a valid 32-byte base58 address. Only call this
    /// with constants from [`crate::config`]; every one of them is covered
    /// by a unit test.
    pub fn from_static(s: &'static str) -> Self {
        match s.parse() {
            Ok(key) => key,
            Err(e) => panic!("invalid static address {s}: {e}"),
        }
    }

    /// Builds an address from a slice, checking the length.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, PubkeyError> {
        let bytes: [u8; ADDRESS_LENGTH] = slice
            .try_into()
            .map_err(|_| PubkeyError::InvalidLength(slice.len()))?;
        Ok(Self(bytes))
    }

    /// Raw bytes, as used in seeds and instruction metas.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Consumes the key and returns the bytes.
    pub fn to_bytes(self) -> [u8; ADDRESS_LENGTH] {
        self.0
    }

    /// Base58 rendering.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Lowercase hex rendering. Handy when diffing against raw account dumps.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Pubkey {
    type Err = PubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| PubkeyError::InvalidBase58(e.to_string()))?;
        Self::try_from_slice(&decoded)
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Pubkey {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self.to_base58())
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
