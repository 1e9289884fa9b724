//! # External Services
//!
//! The two remote collaborators the access layer talks to, as traits:
//!
//! - [`Ledger`]: account queries plus submit-and-confirm for transactions.
//! - [`DecryptionService`]: the attested co-processor endpoint that turns
//!   handles into plaintexts for an authorized, signature-proven identity.
//!
//! No retries and no timeouts live at this layer. A call that never returns
//! leaves the caller pending; that is the caller's policy decision.
//!
//! [`memory`] holds in-process implementations of both, backed by plain
//! maps. They are what the tests run against and what the CLI's offline
//! simulation uses.

pub mod decryption;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Pubkey;
use crate::transaction::{SignedTransaction, TxSignature};

pub use decryption::{
    decryption_challenge, DecryptResponse, DecryptionService, DecryptionServiceError,
};
pub use memory::{InMemoryDecryptionService, InMemoryLedger};

/// Errors talking to the ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Transport or RPC-level failure.
    #[error("ledger rpc error: {0}")]
    Rpc(String),

    /// The ledger refused the transaction before execution (bad signature,
    /// malformed message).
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// Confirmation was requested for a signature the ledger never saw.
    #[error("unknown transaction {0}")]
    UnknownTransaction(TxSignature),
}

/// Final outcome of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confirmation {
    Confirmed,
    /// Executed and failed; carries the program's error message.
    Failed(String),
}

/// Byte-prefix match on account data, used to scan program accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemcmpFilter {
    pub offset: usize,
    pub bytes: Vec<u8>,
}

impl MemcmpFilter {
    pub fn new(offset: usize, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            bytes: bytes.into(),
        }
    }

    pub fn matches(&self, data: &[u8]) -> bool {
        let Some(end) = self.offset.checked_add(self.bytes.len()) else {
            return false;
        };
        data.get(self.offset..end) == Some(self.bytes.as_slice())
    }
}

/// An account returned by a program scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramAccount {
    pub address: Pubkey,
    pub data: Vec<u8>,
}

/// Read and write access to the ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn account_exists(&self, address: &Pubkey) -> Result<bool, LedgerError>;

    /// Raw account data, or `None` if the account does not exist.
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Every account owned by `program` whose data matches all `filters`.
    async fn get_program_accounts(
        &self,
        program: &Pubkey,
        filters: &[MemcmpFilter],
    ) -> Result<Vec<ProgramAccount>, LedgerError>;

    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<TxSignature, LedgerError>;

    /// Suspends until the transaction is final.
    async fn await_confirmation(&self, signature: &TxSignature)
        -> Result<Confirmation, LedgerError>;
}
