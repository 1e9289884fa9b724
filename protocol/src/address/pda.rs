//! # Program-Derived Addresses
//!
//! The ledger's deterministic address scheme. An address is the SHA-256 of
//!
//! ```text
//! seed_1 ‖ … ‖ seed_n ‖ [bump] ‖ program_id ‖ "ProgramDerivedAddress"
//! ```
//!
//! and is only valid if the digest is *off* the Ed25519 curve. The search
//! walks the bump from 255 downward and takes the first valid candidate, so
//! the canonical bump is the highest one that works. About half of all
//! digests land on the curve, which means the search almost always finishes
//! in one or two hashes.
//!
//! Everything in this module is pure: same inputs, same address, forever.

use thiserror::Error;

use crate::address::Pubkey;
use crate::config::{MAX_SEEDS, MAX_SEED_LEN, PDA_MARKER};
use crate::crypto::hash::sha256_concat;
use crate::crypto::is_on_curve;

/// Errors from address derivation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DerivationError {
    /// A seed exceeds the per-seed byte limit.
    #[error("seed {index} is {len} bytes, limit is {MAX_SEED_LEN}")]
    MaxSeedLengthExceeded { index: usize, len: usize },

    /// More seeds than the ledger accepts (bump included).
    #[error("too many seeds: {count}, limit is {MAX_SEEDS}")]
    TooManySeeds { count: usize },

    /// The candidate for this exact bump lies on the curve.
    #[error("derived address lies on the ed25519 curve")]
    InvalidSeeds,

    /// No bump in 0..=255 produced an off-curve address.
    #[error("no viable bump seed found")]
    BumpSeedNotFound,
}

fn check_seeds(seeds: &[&[u8]], extra: usize) -> Result<(), DerivationError> {
    let count = seeds.len() + extra;
    if count > MAX_SEEDS {
        return Err(DerivationError::TooManySeeds { count });
    }
    for (index, seed) in seeds.iter().enumerate() {
        if seed.len() > MAX_SEED_LEN {
            return Err(DerivationError::MaxSeedLengthExceeded {
                index,
                len: seed.len(),
            });
        }
    }
    Ok(())
}

fn hash_candidate(seeds: &[&[u8]], bump: Option<u8>, program_id: &Pubkey) -> [u8; 32] {
    let bump_bytes = bump.map(|b| [b]);
    let bump_part: &[u8] = match &bump_bytes {
        Some(b) => b,
        None => &[],
    };
    sha256_concat(
        seeds
            .iter()
            .copied()
            .chain([bump_part, program_id.as_bytes().as_slice(), PDA_MARKER]),
    )
}

/// Computes the address for an exact seed list (bump already included, if
/// any). Fails with [`DerivationError::InvalidSeeds`] when the result is on
/// the curve.
pub fn create_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<Pubkey, DerivationError> {
    check_seeds(seeds, 0)?;
    let candidate = hash_candidate(seeds, None, program_id);
    if is_on_curve(&candidate) {
        return Err(DerivationError::InvalidSeeds);
    }
    Ok(Pubkey::new(candidate))
}

/// Searches bumps 255..=0 and returns the first off-curve address with its
/// bump.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), DerivationError> {
    // The bump occupies one of the seed slots.
    check_seeds(seeds, 1)?;

    for bump in (0..=u8::MAX).rev() {
        let candidate = hash_candidate(seeds, Some(bump), program_id);
        if !is_on_curve(&candidate) {
            return Ok((Pubkey::new(candidate), bump));
        }
    }
    Err(DerivationError::BumpSeedNotFound)
}
