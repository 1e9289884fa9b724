//! # Hashing Utilities
//!
//! SHA-256 is the only hash the target ledger speaks, so it is the only one
//! we carry. Three consumers:
//!
//! - derived-address search (`sha256(seeds ‖ bump ‖ program ‖ marker)`),
//! - instruction discriminators (`sha256("global:<name>")[..8]`),
//! - account discriminators (`sha256("account:<TypeName>")[..8]`).
//!
//! The discriminator namespaces are the on-ledger framework's convention;
//! the strings must match the program's instruction and account names
//! exactly, snake_case for instructions and PascalCase for accounts.

use sha2::{Digest, Sha256};

/// Length of an instruction or account discriminator in bytes.
pub const DISCRIMINATOR_LENGTH: usize = 8;

/// Compute the SHA-256 hash of the input data.
///
/// Returns a `Vec<u8>` for call sites that hand the digest straight to APIs
/// taking `&[u8]`. Prefer [`sha256_array`] in hot paths.
///
/// # Example
///
/// ```
/// use donatrade_protocol::crypto::sha256;
///
/// let hash = sha256(b"donatrade");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    sha256_array(data).to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash several byte slices as one contiguous preimage without
/// concatenating them first.
pub fn sha256_concat<'a, I>(parts: I) -> [u8; 32]
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn discriminator(namespace: &str, name: &str) -> [u8; DISCRIMINATOR_LENGTH] {
    let digest = sha256_concat([namespace.as_bytes(), b":", name.as_bytes()]);
    let mut out = [0u8; DISCRIMINATOR_LENGTH];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LENGTH]);
    out
}

/// Discriminator prefixed to instruction data, e.g.
/// `instruction_discriminator("authorize_decryption")`.
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LENGTH] {
    discriminator("global", name)
}

/// Discriminator prefixed to account data, e.g.
/// `account_discriminator("InvestorVault")`.
pub fn account_discriminator(type_name: &str) -> [u8; DISCRIMINATOR_LENGTH] {
    discriminator("account", type_name)
}
