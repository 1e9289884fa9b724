//! # Encrypted-Value Handles
//!
//! The ledger never stores a balance or a share count. It stores a *handle*:
//! a 128-bit number the confidential co-processor hands out in exchange for
//! an encrypted value. Handles are what allowances are keyed on, what the
//! decryption service takes as input, and what metadata keys are derived
//! from. Getting their encoding wrong means asking for the wrong value, so
//! the encoding lives in exactly one place.

pub mod codec;

pub use codec::{
    normalize, to_little_endian_bytes16, Handle, HandleInput, HandleParseError, HandleWrapper,
};
