//! # Handle Codec
//!
//! A handle reaches us in half a dozen shapes depending on who decoded the
//! account it came from: a decimal string from the decryption service, a
//! native integer from our own code, a 16-byte little-endian array from raw
//! account data, or a wrapper object (`{ inner: [...] }`, `{ handle: ... }`,
//! `[h]`) from a partially-decoded RPC struct. This module collapses all of
//! them into one canonical decimal string.
//!
//! Normalization never fails. Anything it cannot make sense of becomes the
//! zero handle, which downstream code already treats as "no value yet",
//! plus a warning in the log so the shape can be added here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::HANDLE_LENGTH;

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Errors parsing a canonical decimal handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandleParseError {
    #[error("handle is empty")]
    Empty,

    #[error("handle contains a non-digit character: {0:?}")]
    InvalidDigit(char),

    #[error("handle exceeds 128 bits")]
    Overflow,

    #[error("handle must be {HANDLE_LENGTH} bytes, got {0}")]
    InvalidLength(usize),
}

/// A 128-bit reference to a value held by the confidential co-processor.
///
/// Zero means "no handle". Handles are plain values: copy them freely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u128);

impl Handle {
    pub const ZERO: Handle = Handle(0);

    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Parses canonical decimal text. Surrounding whitespace is ignored; a
    /// leading `+` or `-` is not accepted.
    pub fn parse(s: &str) -> Result<Self, HandleParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(HandleParseError::Empty);
        }
        let mut value: u128 = 0;
        for c in s.chars() {
            let digit = c.to_digit(10).ok_or(HandleParseError::InvalidDigit(c))?;
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u128::from(digit)))
                .ok_or(HandleParseError::Overflow)?;
        }
        Ok(Self(value))
    }

    pub fn from_le_bytes16(bytes: [u8; HANDLE_LENGTH]) -> Self {
        Self(u128::from_le_bytes(bytes))
    }

    pub fn try_from_le_slice(bytes: &[u8]) -> Result<Self, HandleParseError> {
        let arr: [u8; HANDLE_LENGTH] = bytes
            .try_into()
            .map_err(|_| HandleParseError::InvalidLength(bytes.len()))?;
        Ok(Self::from_le_bytes16(arr))
    }

    pub fn to_le_bytes16(self) -> [u8; HANDLE_LENGTH] {
        to_little_endian_bytes16(self.0)
    }

    /// Normalizes any accepted ingress shape and parses the result.
    ///
    /// A canonical string that still isn't a valid u128 (say, `"abc"` passed
    /// through as a decimal string) degrades to [`Handle::ZERO`].
    pub fn from_input(input: &HandleInput) -> Self {
        let canonical = normalize(input);
        match Self::parse(&canonical) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(input = %canonical, error = %e, "handle is not a valid u128, using zero");
                Self::ZERO
            }
        }
    }
}

impl FromStr for Handle {
    type Err = HandleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u128> for Handle {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Handle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Ingress Shapes
// ---------------------------------------------------------------------------

/// Every shape a handle may arrive in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandleInput {
    /// Missing entirely (`null`, `undefined`, an unset field).
    Absent,
    /// Decimal text. Passed through trimmed; not validated here.
    Decimal(String),
    /// A native integer.
    Native(u128),
    /// Raw little-endian bytes. Only 16-byte sequences are meaningful.
    Bytes(Vec<u8>),
    /// A wrapper object around another shape.
    Wrapper(HandleWrapper),
    /// Something else entirely. Carries a short description for the log.
    Unrecognized(String),
}

/// A wrapper object. Fields are tried in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandleWrapper {
    /// The element at index `0` (tuple structs and single-element arrays).
    pub indexed: Option<Box<HandleInput>>,
    pub inner: Option<Box<HandleInput>>,
    pub handle: Option<Box<HandleInput>>,
    /// Byte payload of a serialized buffer (`{ "data": [...] }`), used when
    /// none of the named fields is present.
    pub bytes: Option<Vec<u8>>,
}

impl HandleWrapper {
    pub fn inner(input: HandleInput) -> Self {
        Self {
            inner: Some(Box::new(input)),
            ..Self::default()
        }
    }

    pub fn indexed(input: HandleInput) -> Self {
        Self {
            indexed: Some(Box::new(input)),
            ..Self::default()
        }
    }

    pub fn handle(input: HandleInput) -> Self {
        Self {
            handle: Some(Box::new(input)),
            ..Self::default()
        }
    }
}

impl From<u128> for HandleInput {
    fn from(value: u128) -> Self {
        HandleInput::Native(value)
    }
}

impl From<&str> for HandleInput {
    fn from(value: &str) -> Self {
        HandleInput::Decimal(value.to_string())
    }
}

impl From<[u8; HANDLE_LENGTH]> for HandleInput {
    fn from(value: [u8; HANDLE_LENGTH]) -> Self {
        HandleInput::Bytes(value.to_vec())
    }
}

impl<T: Into<HandleInput>> From<Option<T>> for HandleInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(HandleInput::Absent, Into::into)
    }
}

fn as_byte_array(items: &[Value]) -> Option<Vec<u8>> {
    items
        .iter()
        .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

impl HandleInput {
    /// Maps a JSON value (as produced by a generic account decoder) onto an
    /// ingress shape.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => HandleInput::Absent,
            Value::String(s) => HandleInput::Decimal(s.clone()),
            Value::Number(n) => match n.as_u64() {
                Some(v) => HandleInput::Native(u128::from(v)),
                None => HandleInput::Unrecognized(format!("number {n}")),
            },
            // Only a full 16-element array is raw bytes; anything shorter is a
            // tuple wrapper, so `[5]` reads like `{"0": 5}`.
            Value::Array(items) => match as_byte_array(items) {
                Some(bytes) if items.len() == HANDLE_LENGTH => HandleInput::Bytes(bytes),
                _ => match items.first() {
                    Some(first) => {
                        HandleInput::Wrapper(HandleWrapper::indexed(Self::from_json(first)))
                    }
                    None => HandleInput::Unrecognized("empty array".to_string()),
                },
            },
            Value::Object(map) => {
                let field = |key: &str| map.get(key).map(|v| Box::new(Self::from_json(v)));
                let bytes = map
                    .get("data")
                    .and_then(Value::as_array)
                    .and_then(|items| as_byte_array(items));
                HandleInput::Wrapper(HandleWrapper {
                    indexed: field("0"),
                    inner: field("inner"),
                    handle: field("handle"),
                    bytes,
                })
            }
            Value::Bool(b) => HandleInput::Unrecognized(format!("bool {b}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Canonical decimal form of any accepted handle shape. Never fails; see
/// the module docs.
pub fn normalize(input: &HandleInput) -> String {
    match input {
        HandleInput::Absent => "0".to_string(),
        HandleInput::Decimal(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                "0".to_string()
            } else {
                trimmed.to_string()
            }
        }
        HandleInput::Native(v) => v.to_string(),
        HandleInput::Bytes(bytes) => normalize_bytes(bytes),
        HandleInput::Wrapper(w) => {
            let nested = w
                .indexed
                .as_deref()
                .or(w.inner.as_deref())
                .or(w.handle.as_deref());
            match (nested, &w.bytes) {
                (Some(inner), _) => normalize(inner),
                (None, Some(bytes)) => normalize_bytes(bytes),
                (None, None) => {
                    warn!("handle wrapper has no recognized field, using zero");
                    "0".to_string()
                }
            }
        }
        HandleInput::Unrecognized(shape) => {
            warn!(shape = %shape, "unrecognized handle shape, using zero");
            "0".to_string()
        }
    }
}

fn normalize_bytes(bytes: &[u8]) -> String {
    match Handle::try_from_le_slice(bytes) {
        Ok(handle) => handle.to_string(),
        Err(e) => {
            warn!(len = bytes.len(), error = %e, "handle byte array has wrong length, using zero");
            "0".to_string()
        }
    }
}

/// Little-endian 16-byte encoding: low 64 bits at offset 0, high 64 bits at
/// offset 8. This is the layout allowance seeds and instruction data use.
pub fn to_little_endian_bytes16(value: u128) -> [u8; HANDLE_LENGTH] {
    let mut out = [0u8; HANDLE_LENGTH];
    out[..8].copy_from_slice(&(value as u64).to_le_bytes());
    out[8..].copy_from_slice(&((value >> 64) as u64).to_le_bytes());
    out
}
