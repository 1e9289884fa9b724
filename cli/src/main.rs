// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # donatrade
//!
//! Offline tooling over the confidential-value layer:
//!
//! - `handle`   normalize a handle and show its 16-byte encoding
//! - `derive`   compute program addresses
//! - `encrypt` / `decrypt` / `keygen`   the metadata cipher
//! - `usdc`     amount formatting and parsing
//! - `simulate` a full reveal against an in-memory ledger
//! - `version`  build and deployment information

mod cli;
mod logging;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use donatrade_protocol::address::{AddressDeriver, DerivedAddress};
use donatrade_protocol::cipher;
use donatrade_protocol::config::{ClientConfig, DECRYPTION_PROGRAM_ID, PROGRAM_ID};
use donatrade_protocol::handle::{normalize, Handle, HandleInput};
use donatrade_protocol::ledger::{InMemoryDecryptionService, InMemoryLedger};
use donatrade_protocol::reveal::RevealCoordinator;
use donatrade_protocol::transaction::UsdcAmount;
use donatrade_protocol::wallet::{KeypairWallet, WalletIdentity};

use cli::{Commands, DeriveEntity, DonatradeCli, UsdcCommand};

const DEFAULT_LOG_DIRECTIVES: &str = "donatrade_cli=info,donatrade_protocol=warn";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DonatradeCli::parse();
    logging::init_logging(DEFAULT_LOG_DIRECTIVES, cli.log_format);
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Handle(args) => show_handle(&args.input),
        Commands::Derive { entity } => derive(&config, entity),
        Commands::Encrypt(args) => {
            println!("{}", cipher::encrypt(&args.text, &args.key));
            Ok(())
        }
        Commands::Decrypt(args) => {
            let text = if args.strict {
                cipher::try_decrypt(&args.blob, &args.key).context("cannot decrypt blob")?
            } else {
                cipher::decrypt(&args.blob, &args.key)
            };
            println!("{text}");
            Ok(())
        }
        Commands::Keygen => {
            println!("{}", cipher::generate_key_seed());
            Ok(())
        }
        Commands::Usdc { action } => usdc(action),
        Commands::Simulate(args) => simulate(config, args).await,
        Commands::Version => {
            print_version(&config);
            Ok(())
        }
    }
}

/// Config file (if any), then flag and environment overrides.
fn load_config(cli: &DonatradeCli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(id) = cli.program_id {
        config.program_id = id;
    }
    if let Some(id) = cli.decryption_program_id {
        config.decryption_program_id = id;
    }
    if let Some(mint) = cli.usdc_mint {
        config.usdc_mint = mint;
    }
    tracing::debug!(program = %config.program_id, rpc = %config.rpc_url, "config loaded");
    Ok(config)
}

/// Digit strings are decimal handles (JSON would read large ones as
/// floats); anything else must be JSON.
fn parse_handle_input(raw: &str) -> Result<HandleInput> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(HandleInput::Decimal(trimmed.to_string()));
    }
    let value: serde_json::Value =
        serde_json::from_str(trimmed).context("handle is neither decimal nor JSON")?;
    Ok(HandleInput::from_json(&value))
}

fn show_handle(raw: &str) -> Result<()> {
    let input = parse_handle_input(raw)?;
    let canonical = normalize(&input);
    let handle = Handle::parse(&canonical)
        .with_context(|| format!("normalized handle {canonical:?} is not a valid u128"))?;
    println!("decimal  {handle}");
    println!("le-hex   {}", hex::encode(handle.to_le_bytes16()));
    if handle.is_zero() {
        println!("note     zero handle: no encrypted value");
    }
    Ok(())
}

fn derive(config: &ClientConfig, entity: DeriveEntity) -> Result<()> {
    let deriver = AddressDeriver::from_config(config);
    let derived: DerivedAddress = match entity {
        DeriveEntity::Vault { investor } => deriver.investor_vault(&investor)?,
        DeriveEntity::GlobalVault => deriver.global_vault()?,
        DeriveEntity::Company { company_id } => deriver.company(company_id)?,
        DeriveEntity::Position {
            company_id,
            investor,
        } => deriver.position(company_id, &investor)?,
        DeriveEntity::Offer { seller, offer_id } => deriver.offer(&seller, offer_id)?,
        DeriveEntity::Allowance { handle, identity } => deriver.allowance(handle, &identity)?,
        DeriveEntity::Ata { owner, mint } => {
            deriver.associated_token_account(&owner, &mint.unwrap_or(config.usdc_mint))?
        }
    };
    println!("address  {}", derived.address);
    println!("bump     {}", derived.bump);
    Ok(())
}

fn usdc(action: UsdcCommand) -> Result<()> {
    match action {
        UsdcCommand::Format { units } => println!("{}", UsdcAmount(units)),
        UsdcCommand::Parse { text } => {
            let amount = UsdcAmount::parse(&text)
                .with_context(|| format!("cannot parse {text:?} as a USDC amount"))?;
            println!("{}", amount.base_units());
        }
    }
    Ok(())
}

/// One reveal end to end, with a throwaway wallet and an in-memory ledger.
/// Prints each published transition as a JSON line.
async fn simulate(config: ClientConfig, args: cli::SimulateArgs) -> Result<()> {
    if args.handle.is_zero() {
        bail!("the zero handle has no value to reveal");
    }

    let ledger = Arc::new(InMemoryLedger::new(&config));
    let service = Arc::new(InMemoryDecryptionService::new(ledger.clone(), &config));
    service.insert(args.handle, args.value);
    service.deny_next(args.deny);

    let wallet = KeypairWallet::generate();
    if args.preauthorized {
        let allowance = AddressDeriver::from_config(&config).allowance(args.handle, &wallet.address())?;
        let mut data = args.handle.to_le_bytes16().to_vec();
        data.extend_from_slice(wallet.address().as_bytes());
        ledger.insert_account(allowance.address, config.decryption_program_id, data);
    }

    let coordinator = RevealCoordinator::new(ledger.clone(), service.clone(), config);
    let mut events = coordinator.subscribe();

    tracing::info!(identity = %wallet.address(), handle = %args.handle, "simulating reveal");
    let final_state = coordinator.reveal(&wallet, args.handle).await;

    while let Ok(event) = events.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }
    tracing::info!(
        state = %final_state,
        transactions = ledger.submission_count(),
        decrypt_calls = service.call_count(),
        "simulation finished"
    );

    if let Some(reason) = failure_reason(&final_state) {
        bail!("reveal failed: {reason}");
    }
    Ok(())
}

fn failure_reason(state: &donatrade_protocol::reveal::RevealState) -> Option<&str> {
    match state {
        donatrade_protocol::reveal::RevealState::Failed(reason) => Some(reason),
        _ => None,
    }
}

fn print_version(config: &ClientConfig) {
    println!("donatrade  {}", env!("CARGO_PKG_VERSION"));
    println!("program    {}", config.program_id);
    println!("decryption {}", config.decryption_program_id);
    if config.program_id.to_string() != PROGRAM_ID
        || config.decryption_program_id.to_string() != DECRYPTION_PROGRAM_ID
    {
        println!("note       program ids overridden by config");
    }
}
