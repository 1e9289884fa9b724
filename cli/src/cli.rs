//! # CLI Interface
//!
//! Argument structure for `donatrade`, via `clap` derive. Every command
//! runs offline: nothing here talks to a ledger or a decryption service.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use donatrade_protocol::address::Pubkey;
use donatrade_protocol::handle::Handle;

use crate::logging::LogFormat;

/// Donatrade confidential-value toolkit.
///
/// Converts handles between their wire forms, derives program addresses,
/// runs the metadata cipher and formats USDC amounts.
#[derive(Parser, Debug)]
#[command(
    name = "donatrade",
    about = "Donatrade confidential-value toolkit",
    version,
    propagate_version = true
)]
pub struct DonatradeCli {
    /// JSON client config. Fields left out keep their defaults.
    #[arg(long, short = 'c', global = true, env = "DONATRADE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Trading program id (overrides the config file).
    #[arg(long, global = true, env = "DONATRADE_PROGRAM_ID")]
    pub program_id: Option<Pubkey>,

    /// Decryption program id (overrides the config file).
    #[arg(long, global = true, env = "DONATRADE_DECRYPTION_PROGRAM_ID")]
    pub decryption_program_id: Option<Pubkey>,

    /// USDC mint (overrides the config file).
    #[arg(long, global = true, env = "DONATRADE_USDC_MINT")]
    pub usdc_mint: Option<Pubkey>,

    /// Log format on stderr.
    #[arg(
        long,
        global = true,
        env = "DONATRADE_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Normalize a handle given as decimal text or JSON (byte array,
    /// `{"inner": ...}`, `{"0": ...}`, `{"handle": ...}`, `{"data": [...]}`).
    Handle(HandleArgs),
    /// Derive a program address.
    Derive {
        #[command(subcommand)]
        entity: DeriveEntity,
    },
    /// Encrypt metadata text with a decimal key seed.
    Encrypt(EncryptArgs),
    /// Decrypt a metadata blob with a decimal key seed.
    Decrypt(DecryptArgs),
    /// Print a fresh random metadata key seed.
    Keygen,
    /// Convert USDC amounts.
    Usdc {
        #[command(subcommand)]
        action: UsdcCommand,
    },
    /// Run one reveal against an in-memory ledger and print every
    /// transition.
    Simulate(SimulateArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct HandleArgs {
    /// The handle, as decimal text or JSON.
    pub input: String,
}

#[derive(Subcommand, Debug)]
pub enum DeriveEntity {
    /// An investor's USDC vault.
    Vault { investor: Pubkey },
    /// The global vault configuration account.
    GlobalVault,
    /// A company account.
    Company { company_id: u64 },
    /// An investor's position in a company.
    Position { company_id: u64, investor: Pubkey },
    /// A sell offer.
    Offer { seller: Pubkey, offer_id: u64 },
    /// The allowance record letting `identity` decrypt `handle`.
    Allowance { handle: Handle, identity: Pubkey },
    /// An associated token account (USDC unless `--mint` is given).
    Ata {
        owner: Pubkey,
        #[arg(long)]
        mint: Option<Pubkey>,
    },
}

#[derive(Args, Debug)]
pub struct EncryptArgs {
    /// Decimal key seed, usually a revealed handle plaintext.
    #[arg(long, short = 'k', env = "DONATRADE_METADATA_KEY")]
    pub key: String,
    pub text: String,
}

#[derive(Args, Debug)]
pub struct DecryptArgs {
    /// Decimal key seed.
    #[arg(long, short = 'k', env = "DONATRADE_METADATA_KEY")]
    pub key: String,
    pub blob: String,
    /// Fail on malformed input instead of printing the placeholder.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Subcommand, Debug)]
pub enum UsdcCommand {
    /// Base units to `$w.ff`.
    Format { units: u64 },
    /// Text like `$1,500.50` to base units.
    Parse { text: String },
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Handle to reveal.
    #[arg(long, default_value = "1000000")]
    pub handle: Handle,

    /// Plaintext the simulated co-processor holds for the handle.
    #[arg(long, default_value_t = 1_500_500_000)]
    pub value: u128,

    /// How many decryption requests the service denies before answering.
    #[arg(long, default_value_t = 0)]
    pub deny: usize,

    /// Create the allowance up front so no authorization is needed.
    #[arg(long)]
    pub preauthorized: bool,
}
