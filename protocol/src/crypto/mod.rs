//! # Cryptographic Primitives
//!
//! The handful of primitives the access layer needs, each a thin wrapper
//! around an audited crate:
//!
//! - **SHA-256** (`sha2`): derived-address preimages and the 8-byte
//!   discriminators that tag instructions and accounts.
//! - **Ed25519 point decompression** (`curve25519-dalek`): the off-curve test
//!   that makes a derived address unsignable.
//!
//! Nothing here is novel. If you're tempted to optimize these functions,
//! please reconsider.

pub mod curve;
pub mod hash;

pub use curve::is_on_curve;
pub use hash::{account_discriminator, instruction_discriminator, sha256, sha256_array};
