//! # Addresses
//!
//! Everything on the ledger is found by address. User wallets are Ed25519
//! public keys; everything the trading program owns (vaults, companies,
//! positions, offers) and every decryption allowance lives at a
//! *program-derived* address computed from a fixed list of seeds.
//!
//! - [`pubkey`]: the 32-byte address type and its base58 rendering.
//! - [`pda`]: the generic derivation algorithm and its limits.
//! - [`seeds`]: one method per entity, with the seed layouts the deployed
//!   program expects.

pub mod pda;
pub mod pubkey;
pub mod seeds;

pub use pda::{create_program_address, find_program_address, DerivationError};
pub use pubkey::{Pubkey, PubkeyError};
pub use seeds::{AddressDeriver, DerivedAddress};
