//! Transaction assembly and signing.
//!
//! The [`TransactionBuilder`] collects instructions under one fee payer and
//! produces an [`UnsignedTransaction`]. Signing happens in the wallet (see
//! [`crate::wallet`]), which returns a [`SignedTransaction`] ready for the
//! ledger. Keeping the two apart means construction is testable without key
//! material, and a hardware or browser wallet can sign without ever seeing
//! the builder.

use chrono::{DateTime, TimeZone, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use super::instruction::Instruction;
use super::types::{InstructionKind, TxSignature};
use crate::address::Pubkey;

// ---------------------------------------------------------------------------
// UnsignedTransaction
// ---------------------------------------------------------------------------

/// One or more instructions, paid for and signed by `fee_payer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub fee_payer: Pubkey,
    pub instructions: Vec<Instruction>,
    /// Unix milliseconds at build time.
    pub timestamp: i64,
    /// Random per-transaction value, signed along with everything else, so
    /// two otherwise identical transactions get distinct signatures.
    pub nonce: u64,
}

impl UnsignedTransaction {
    /// The canonical bytes a wallet signs.
    ///
    /// Fixed-width little-endian integers and length prefixes throughout; no
    /// serde, because field order must never depend on a serializer.
    pub fn message_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);

        buf.extend_from_slice(self.fee_payer.as_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(&(self.instructions.len() as u16).to_le_bytes());

        for ix in &self.instructions {
            buf.extend_from_slice(ix.program_id.as_bytes());
            buf.extend_from_slice(&(ix.accounts.len() as u16).to_le_bytes());
            for meta in &ix.accounts {
                buf.extend_from_slice(meta.pubkey.as_bytes());
                buf.push(u8::from(meta.is_signer));
                buf.push(u8::from(meta.is_writable));
            }
            buf.extend_from_slice(&(ix.data.len() as u32).to_le_bytes());
            buf.extend_from_slice(&ix.data);
        }

        buf
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// `true` if any instruction is of the given kind.
    pub fn contains(&self, kind: InstructionKind) -> bool {
        self.instructions.iter().any(|ix| ix.kind == kind)
    }
}

// ---------------------------------------------------------------------------
// SignedTransaction
// ---------------------------------------------------------------------------

/// An [`UnsignedTransaction`] plus the fee payer's signature over its
/// [`message_bytes`](UnsignedTransaction::message_bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub message: UnsignedTransaction,
    pub signature: TxSignature,
}

impl SignedTransaction {
    pub fn new(message: UnsignedTransaction, signature: TxSignature) -> Self {
        Self { message, signature }
    }

    /// The ledger identifies a transaction by its fee payer's signature.
    pub fn id(&self) -> TxSignature {
        self.signature
    }

    /// Checks the signature against the fee payer's key.
    pub fn verify(&self) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(self.message.fee_payer.as_bytes()) else {
            return false;
        };
        let signature = Signature::from_bytes(self.signature.as_bytes());
        key.verify(&self.message.message_bytes(), &signature).is_ok()
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`UnsignedTransaction`].
///
/// ```rust
/// use donatrade_protocol::address::Pubkey;
/// use donatrade_protocol::handle::Handle;
/// use donatrade_protocol::transaction::{InstructionBuilder, TransactionBuilder};
///
/// let investor = Pubkey::new([7u8; 32]);
/// let ix = InstructionBuilder::default()
///     .authorize_decryption(&investor, Handle::new(1_000_000), &investor)
///     .unwrap();
///
/// let tx = TransactionBuilder::new(investor).instruction(ix).build();
/// assert_eq!(tx.instructions.len(), 1);
/// ```
pub struct TransactionBuilder {
    fee_payer: Pubkey,
    instructions: Vec<Instruction>,
    timestamp: Option<i64>,
    nonce: Option<u64>,
}

impl TransactionBuilder {
    pub fn new(fee_payer: Pubkey) -> Self {
        Self {
            fee_payer,
            instructions: Vec::new(),
            timestamp: None,
            nonce: None,
        }
    }

    pub fn instruction(mut self, ix: Instruction) -> Self {
        self.instructions.push(ix);
        self
    }

    pub fn instructions(mut self, ixs: impl IntoIterator<Item = Instruction>) -> Self {
        self.instructions.extend(ixs);
        self
    }

    /// Sets the timestamp explicitly (Unix milliseconds). Defaults to now.
    pub fn timestamp(mut self, millis: i64) -> Self {
        self.timestamp = Some(millis);
        self
    }

    /// Fixes the nonce. Defaults to a random value.
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn build(self) -> UnsignedTransaction {
        UnsignedTransaction {
            fee_payer: self.fee_payer,
            instructions: self.instructions,
            timestamp: self
                .timestamp
                .unwrap_or_else(|| Utc::now().timestamp_millis()),
            nonce: self.nonce.unwrap_or_else(|| OsRng.next_u64()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
