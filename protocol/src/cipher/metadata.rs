//! # Metadata Cipher
//!
//! Company applications carry free-text metadata (legal name, contact,
//! pitch) that only the company and the platform admin should read. The
//! text is XORed with a repeating key and base64-encoded; the key is the
//! decimal plaintext behind a handle, so reading the metadata requires
//! first revealing that handle.
//!
//! **This is not encryption in any modern sense.** There is no
//! authentication and the keystream repeats. It keeps casual ledger readers
//! out and nothing more. Swapping it for an AEAD changes the stored format,
//! so do it together with a migration.
//!
//! Text is handled as UTF-8 bytes. Decryption decodes lossily: a wrong key
//! yields garbage text, never an error.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use tracing::warn;

use crate::config::CIPHER_ERROR_PLACEHOLDER;

/// The blob is not valid base64.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed ciphertext: {0}")]
pub struct CipherFormatError(String);

fn xor_with_key(data: &mut [u8], key: &[u8]) {
    if key.is_empty() {
        return;
    }
    for (byte, k) in data.iter_mut().zip(key.iter().cycle()) {
        *byte ^= k;
    }
}

/// XORs `plaintext` with the repeated `key_seed` and base64-encodes the
/// result. Empty plaintext encrypts to the empty string.
pub fn encrypt(plaintext: &str, key_seed: &str) -> String {
    if plaintext.is_empty() {
        return String::new();
    }
    let mut bytes = plaintext.as_bytes().to_vec();
    xor_with_key(&mut bytes, key_seed.as_bytes());
    STANDARD.encode(bytes)
}

/// Inverse of [`encrypt`], surfacing malformed base64 as a typed error.
pub fn try_decrypt(blob: &str, key_seed: &str) -> Result<String, CipherFormatError> {
    let blob = blob.trim();
    if blob.is_empty() {
        return Ok(String::new());
    }
    let mut bytes = STANDARD
        .decode(blob)
        .map_err(|e| CipherFormatError(e.to_string()))?;
    xor_with_key(&mut bytes, key_seed.as_bytes());
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Inverse of [`encrypt`]. Malformed input renders as
/// [`CIPHER_ERROR_PLACEHOLDER`] so UI code can display the result as-is.
pub fn decrypt(blob: &str, key_seed: &str) -> String {
    match try_decrypt(blob, key_seed) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "metadata blob could not be decoded");
            CIPHER_ERROR_PLACEHOLDER.to_string()
        }
    }
}

/// A fresh random key seed, for metadata written before any handle exists.
pub fn generate_key_seed() -> String {
    OsRng.next_u64().to_string()
}

/// The key seed for a revealed handle plaintext.
pub fn key_seed_for(plaintext: u128) -> String {
    plaintext.to_string()
}
