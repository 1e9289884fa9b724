// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Donatrade Protocol: Confidential-Value Access Layer
//!
//! Balances and share counts on Donatrade live on a public ledger only as
//! 128-bit handles into a confidential co-processor. This crate is the
//! client side of that arrangement: it speaks the handle encodings, derives
//! every account address the program uses, builds the program's
//! instructions, and runs the two-phase reveal (authorize, then decrypt)
//! that turns a handle back into a number for someone allowed to see it.
//!
//! ## Architecture
//!
//! - **config**: program ids, seed tags, limits and [`config::ClientConfig`].
//! - **crypto**: SHA-256, Anchor discriminators, the curve-point check.
//! - **handle**: [`handle::Handle`] and normalization of its wire forms.
//! - **address**: [`address::Pubkey`] and program-derived addresses.
//! - **cipher**: the XOR metadata cipher and the legacy share cipher.
//! - **accounts**: decoders and queries for the program's accounts.
//! - **transaction**: instruction builders, transactions, USDC amounts.
//! - **ledger**: the ledger and decryption-service interfaces, plus
//!   in-memory implementations.
//! - **wallet**: wallet capabilities and a local keypair wallet.
//! - **reveal**: the reveal state machine and its session cache.
//!
//! ## Ground Rules
//!
//! 1. Nothing here holds a co-processor key. Plaintexts only ever come from
//!    the decryption service.
//! 2. Malformed handles degrade to the zero handle with a warning; they
//!    never panic.
//! 3. No lock is held across an `.await`.

pub mod accounts;
pub mod address;
pub mod cipher;
pub mod config;
pub mod crypto;
pub mod handle;
pub mod ledger;
pub mod reveal;
pub mod transaction;
pub mod wallet;
