//! # Symmetric Ciphers
//!
//! Two placeholder-grade ciphers for data that sits next to confidential
//! values on the ledger:
//!
//! - [`metadata`]: repeating-key XOR plus base64 for application metadata,
//!   keyed by a revealed handle plaintext.
//! - [`legacy`]: the fixed-key XOR used for share counts before they moved
//!   to the co-processor.
//!
//! Neither provides confidentiality against a motivated reader.

pub mod legacy;
pub mod metadata;

pub use legacy::{legacy_decrypt, legacy_encrypt};
pub use metadata::{
    decrypt, encrypt, generate_key_seed, key_seed_for, try_decrypt, CipherFormatError,
};
