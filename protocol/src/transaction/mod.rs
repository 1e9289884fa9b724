//! # Transaction Module
//!
//! Instruction construction and transaction assembly for the trading
//! program. The ledger itself is an external collaborator: this module
//! produces bytes and account lists, the [`crate::ledger`] client submits
//! them.
//!
//! ## Architecture
//!
//! ```text
//! types.rs       Value types (InstructionKind, UsdcAmount, TxSignature)
//! instruction.rs AccountMeta, Instruction, Borsh argument encoding
//! program.rs     One builder method per trading-program instruction
//! builder.rs     TransactionBuilder, UnsignedTransaction, SignedTransaction
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build**: [`InstructionBuilder`] produces an [`Instruction`];
//!    [`TransactionBuilder`] wraps one or more under a fee payer.
//! 2. **Sign**: a wallet implementing
//!    [`CanSignTransaction`](crate::wallet::CanSignTransaction) signs the
//!    message bytes.
//! 3. **Submit**: [`Ledger::submit_transaction`](crate::ledger::Ledger::submit_transaction),
//!    then wait for confirmation.
//!
//! All amounts are `u64` base units. No floating point anywhere near money.

pub mod builder;
pub mod instruction;
pub mod program;
pub mod types;

pub use builder::{SignedTransaction, TransactionBuilder, UnsignedTransaction};
pub use instruction::{AccountMeta, Instruction, InstructionData};
pub use program::{CompanyApplication, InstructionBuilder, InstructionError, OfferingUpdate};
pub use types::{AmountParseError, InstructionKind, SignatureParseError, TxSignature, UsdcAmount};
