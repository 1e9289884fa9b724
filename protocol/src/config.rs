//! # Client Configuration & Constants
//!
//! Every program id, seed limit, and magic string the access layer depends on
//! lives here. If you're hardcoding a base58 address somewhere else, you're
//! doing it wrong and you owe the team coffee.
//!
//! Two layers:
//!
//! - **Constants**: the devnet deployment the client ships against. These are
//!   fixed contracts with the external programs; changing one means talking
//!   to a different program, not tweaking behavior.
//! - **[`ClientConfig`]**: the runtime view of those constants. Defaults to
//!   the constants, can be loaded from a JSON file so a deployment can point
//!   at another cluster without a rebuild.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Pubkey;

// ---------------------------------------------------------------------------
// Program Identities
// ---------------------------------------------------------------------------

/// The trading program that owns vaults, companies, positions, and offers.
pub const PROGRAM_ID: &str = "2CuAjUWhAPfFuY6tCxxpqjnb43yZyRXnBM6fF7M6Y8ho";

/// The confidential co-processor's on-ledger program. Allowance records live
/// in *its* address space, not the trading program's.
pub const DECRYPTION_PROGRAM_ID: &str = "5sjEbPiqgZrYwR31ahR6Uk9wf5awoX61YGg7jExQSwaj";

/// The ledger's system program (all zeroes, rendered in base58).
pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";

/// SPL token program. Needed by the deposit/withdraw instructions.
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Associated token account program. Owns the canonical per-wallet token
/// accounts used as deposit sources and withdrawal targets.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";

/// Devnet USDC mint backing the confidential cUSD balance.
pub const USDC_MINT: &str = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU";

/// Platform administrator. Reviews applications and activates companies;
/// also receives an allowance on every application's metadata handle.
pub const PLATFORM_ADMIN: &str = "3va6LFUv6M21AnFwVETmKbEpJfNHD48D2Aegpwm1PGDh";

/// Default ledger RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";

// ---------------------------------------------------------------------------
// Address Derivation
// ---------------------------------------------------------------------------

/// Domain separator appended to every derived-address preimage. Mandated by
/// the target ledger; not ours to change.
pub const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Maximum length of a single seed in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Maximum number of seeds, bump included.
pub const MAX_SEEDS: usize = 16;

/// Length of an address (and of an Ed25519 public key) in bytes.
pub const ADDRESS_LENGTH: usize = 32;

/// Seed tags. ASCII literals shared with the on-ledger program.
pub const VAULT_SEED: &[u8] = b"vault";
pub const VAULT_AUTHORITY_SEED: &[u8] = b"vault_authority";
pub const COMPANY_SEED: &[u8] = b"company";
pub const POSITION_SEED: &[u8] = b"position";
pub const OFFER_SEED: &[u8] = b"offer";

// ---------------------------------------------------------------------------
// Handles & Amounts
// ---------------------------------------------------------------------------

/// Byte width of an encrypted-value handle on the wire.
pub const HANDLE_LENGTH: usize = 16;

/// USDC uses 6 decimal places. 1_000_000 base units = $1.00.
pub const USDC_DECIMALS: u32 = 6;

/// Number of fractional digits shown when formatting USDC for display.
pub const USDC_DISPLAY_DECIMALS: usize = 2;

// ---------------------------------------------------------------------------
// Reveal Protocol
// ---------------------------------------------------------------------------

/// How many times a permission-denied decryption loops back to
/// authorization before the reveal gives up.
pub const MAX_PERMISSION_RETRIES: u32 = 1;

/// Capacity of the reveal progress broadcast channel. Slow subscribers lag
/// (and are told so) rather than stalling reveal flows.
pub const REVEAL_EVENT_CAPACITY: usize = 64;

/// Placeholder rendered when a metadata blob cannot be decoded.
pub const CIPHER_ERROR_PLACEHOLDER: &str = "[decryption error: malformed ciphertext]";

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Errors while loading a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Deployment-specific identities and endpoints.
///
/// Every field has a default taken from the constants above, so a config
/// file only needs the fields it overrides:
///
/// ```json
/// { "rpc_url": "http://127.0.0.1:8899" }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Trading program id.
    pub program_id: Pubkey,
    /// Confidential co-processor program id (owner of allowance records).
    pub decryption_program_id: Pubkey,
    /// Platform administrator identity.
    pub platform_admin: Pubkey,
    /// USDC mint.
    pub usdc_mint: Pubkey,
    /// Ledger RPC endpoint.
    pub rpc_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            program_id: Pubkey::from_static(PROGRAM_ID),
            decryption_program_id: Pubkey::from_static(DECRYPTION_PROGRAM_ID),
            platform_admin: Pubkey::from_static(PLATFORM_ADMIN),
            usdc_mint: Pubkey::from_static(USDC_MINT),
            rpc_url: DEFAULT_RPC_URL.to_string(),
        }
    }
}

impl ClientConfig {
    /// Parses a config from JSON text. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
