//! Legacy share cipher.
//!
//! Before share counts moved to the confidential co-processor they were
//! stored as an 8-byte little-endian `u64` XORed with a fixed key. Old
//! accounts still carry that layout, so the client can still read it.

const LEGACY_KEY: [u8; 8] = [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xBA, 0xBE];

pub fn legacy_encrypt(value: u64) -> [u8; 8] {
    let mut bytes = value.to_le_bytes();
    for (b, k) in bytes.iter_mut().zip(LEGACY_KEY) {
        *b ^= k;
    }
    bytes
}

/// Decodes the first 8 bytes. Anything shorter decodes to zero.
pub fn legacy_decrypt(encrypted: &[u8]) -> u64 {
    let Some(head) = encrypted.get(..8) else {
        return 0;
    };
    let mut bytes = [0u8; 8];
    for ((out, b), k) in bytes.iter_mut().zip(head).zip(LEGACY_KEY) {
        *out = b ^ k;
    }
    u64::from_le_bytes(bytes)
}
