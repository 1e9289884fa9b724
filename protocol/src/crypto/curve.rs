//! Ed25519 curve membership.
//!
//! A derived address is only valid if it is *not* a point on the Ed25519
//! curve: no private key can exist for it, so only the owning program can
//! sign on its behalf. The check is plain point decompression.

use curve25519_dalek::edwards::CompressedEdwardsY;

/// Returns `true` if `bytes` decompress to a valid Ed25519 point.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}
