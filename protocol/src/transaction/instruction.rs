//! Instructions and their argument encoding.
//!
//! Instruction data is an 8-byte discriminator followed by the arguments in
//! Borsh layout: little-endian integers, `bool` as one byte, strings as a
//! `u32` length prefix plus UTF-8 bytes, `Option<T>` as a `0`/`1` tag plus
//! the value. The program decodes positionally, so argument order here must
//! match the program's handler signature.

use serde::{Deserialize, Serialize};

use super::types::InstructionKind;
use crate::address::Pubkey;

// ---------------------------------------------------------------------------
// AccountMeta
// ---------------------------------------------------------------------------

/// An account referenced by an instruction, with its access flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    /// The paying, signing account. Always writable (fees come out of it).
    pub fn signer(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: true,
            is_writable: true,
        }
    }

    pub fn writable(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: false,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: false,
            is_writable: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Instruction
// ---------------------------------------------------------------------------

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    /// Appends caller-supplied accounts after the named ones. The program
    /// reads these positionally (the co-processor uses them for the
    /// allowance records a handler grants).
    pub fn with_remaining_accounts(mut self, extra: impl IntoIterator<Item = AccountMeta>) -> Self {
        self.accounts.extend(extra);
        self
    }

    pub fn signers(&self) -> impl Iterator<Item = &Pubkey> {
        self.accounts
            .iter()
            .filter(|m| m.is_signer)
            .map(|m| &m.pubkey)
    }
}

// ---------------------------------------------------------------------------
// Argument Encoding
// ---------------------------------------------------------------------------

/// Appends Borsh-encoded arguments after an instruction discriminator.
#[derive(Debug, Clone)]
pub struct InstructionData {
    buf: Vec<u8>,
}

impl InstructionData {
    pub fn new(kind: InstructionKind) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&kind.discriminator());
        Self { buf }
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u128(mut self, value: u128) -> Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn bool(mut self, value: bool) -> Self {
        self.buf.push(u8::from(value));
        self
    }

    pub fn pubkey(mut self, key: &Pubkey) -> Self {
        self.buf.extend_from_slice(key.as_bytes());
        self
    }

    /// Length-prefixed UTF-8.
    pub fn string(mut self, value: &str) -> Self {
        // A transaction is capped far below 4 GiB, so the length always fits.
        self.buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn option_string(mut self, value: Option<&str>) -> Self {
        match value {
            Some(s) => {
                self.buf.push(1);
                self.string(s)
            }
            None => {
                self.buf.push(0);
                self
            }
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
