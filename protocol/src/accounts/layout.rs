//! Typed views of the program's on-ledger accounts.
//!
//! Each account starts with an 8-byte discriminator followed by its fields,
//! Borsh-encoded in declaration order. Encrypted quantities appear as
//! 16-byte little-endian handles.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Pubkey;
use crate::config::{ADDRESS_LENGTH, HANDLE_LENGTH};
use crate::crypto::{account_discriminator, hash::DISCRIMINATOR_LENGTH};
use crate::handle::Handle;

/// Errors decoding raw account data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountDecodeError {
    #[error("{account}: expected discriminator {expected}, found {found}")]
    WrongDiscriminator {
        account: &'static str,
        expected: String,
        found: String,
    },

    #[error("{account}: need {needed} bytes, have {have}")]
    TooShort {
        account: &'static str,
        needed: usize,
        have: usize,
    },

    #[error("{account}: invalid bool byte {value} at offset {offset}")]
    InvalidBool {
        account: &'static str,
        offset: usize,
        value: u8,
    },
}

/// Sequential little-endian reader over account bytes.
struct Reader<'a> {
    account: &'static str,
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Checks the discriminator and the minimum length, then positions the
    /// cursor after the discriminator.
    fn open(account: &'static str, data: &'a [u8], len: usize) -> Result<Self, AccountDecodeError> {
        if data.len() < len {
            return Err(AccountDecodeError::TooShort {
                account,
                needed: len,
                have: data.len(),
            });
        }
        let expected = account_discriminator(account);
        let found = &data[..DISCRIMINATOR_LENGTH];
        if found != expected {
            return Err(AccountDecodeError::WrongDiscriminator {
                account,
                expected: hex::encode(expected),
                found: hex::encode(found),
            });
        }
        Ok(Self {
            account,
            data,
            pos: DISCRIMINATOR_LENGTH,
        })
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn pubkey(&mut self) -> Pubkey {
        Pubkey::new(self.take::<ADDRESS_LENGTH>())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take::<8>())
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn handle(&mut self) -> Handle {
        Handle::from_le_bytes16(self.take::<HANDLE_LENGTH>())
    }

    fn bool(&mut self) -> Result<bool, AccountDecodeError> {
        let offset = self.pos;
        match self.u8() {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(AccountDecodeError::InvalidBool {
                account: self.account,
                offset,
                value,
            }),
        }
    }
}

/// A fixed-layout program account.
pub trait ProgramAccountLayout: Sized {
    /// Type name used for the discriminator.
    const NAME: &'static str;
    /// Total encoded length, discriminator included.
    const LEN: usize;

    fn decode(data: &[u8]) -> Result<Self, AccountDecodeError>;

    fn discriminator() -> [u8; DISCRIMINATOR_LENGTH] {
        account_discriminator(Self::NAME)
    }
}

/// Per-investor confidential USDC balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorVault {
    pub owner: Pubkey,
    pub cusd: Handle,
    pub bump: u8,
}

impl ProgramAccountLayout for InvestorVault {
    const NAME: &'static str = "InvestorVault";
    const LEN: usize = DISCRIMINATOR_LENGTH + ADDRESS_LENGTH + HANDLE_LENGTH + 1;

    fn decode(data: &[u8]) -> Result<Self, AccountDecodeError> {
        let mut r = Reader::open(Self::NAME, data, Self::LEN)?;
        Ok(Self {
            owner: r.pubkey(),
            cusd: r.handle(),
            bump: r.u8(),
        })
    }
}

/// A listed company and its offering terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyAccount {
    pub company_id: u64,
    pub company_admin: Pubkey,
    /// Encrypted raised funds.
    pub cusd: Handle,
    pub shares_available: u64,
    pub price_per_share: u64,
    pub active: bool,
    pub bump: u8,
}

impl CompanyAccount {
    /// Byte offset of `company_admin`, for account scans.
    pub const ADMIN_OFFSET: usize = DISCRIMINATOR_LENGTH + 8;
}

impl ProgramAccountLayout for CompanyAccount {
    const NAME: &'static str = "CompanyAccount";
    const LEN: usize = DISCRIMINATOR_LENGTH + 8 + ADDRESS_LENGTH + HANDLE_LENGTH + 8 + 8 + 1 + 1;

    fn decode(data: &[u8]) -> Result<Self, AccountDecodeError> {
        let mut r = Reader::open(Self::NAME, data, Self::LEN)?;
        Ok(Self {
            company_id: r.u64(),
            company_admin: r.pubkey(),
            cusd: r.handle(),
            shares_available: r.u64(),
            price_per_share: r.u64(),
            active: r.bool()?,
            bump: r.u8(),
        })
    }
}

/// An investor's encrypted share count in one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionAccount {
    pub owner: Pubkey,
    pub company_id: u64,
    pub encrypted_shares: Handle,
    pub bump: u8,
}

impl PositionAccount {
    /// Byte offset of `company_id`, for account scans.
    pub const COMPANY_ID_OFFSET: usize = DISCRIMINATOR_LENGTH + ADDRESS_LENGTH;
}

impl ProgramAccountLayout for PositionAccount {
    const NAME: &'static str = "PositionAccount";
    const LEN: usize = DISCRIMINATOR_LENGTH + ADDRESS_LENGTH + 8 + HANDLE_LENGTH + 1;

    fn decode(data: &[u8]) -> Result<Self, AccountDecodeError> {
        let mut r = Reader::open(Self::NAME, data, Self::LEN)?;
        Ok(Self {
            owner: r.pubkey(),
            company_id: r.u64(),
            encrypted_shares: r.handle(),
            bump: r.u8(),
        })
    }
}

/// A secondary-market sell offer with escrowed shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferAccount {
    pub offer_id: u64,
    pub seller: Pubkey,
    pub company_id: u64,
    /// Plaintext amount shown in listings.
    pub share_amount: u64,
    pub escrowed_shares: Handle,
    pub price_per_share: u64,
    pub is_active: bool,
    pub bump: u8,
}

impl ProgramAccountLayout for OfferAccount {
    const NAME: &'static str = "OfferAccount";
    const LEN: usize =
        DISCRIMINATOR_LENGTH + 8 + ADDRESS_LENGTH + 8 + 8 + HANDLE_LENGTH + 8 + 1 + 1;

    fn decode(data: &[u8]) -> Result<Self, AccountDecodeError> {
        let mut r = Reader::open(Self::NAME, data, Self::LEN)?;
        Ok(Self {
            offer_id: r.u64(),
            seller: r.pubkey(),
            company_id: r.u64(),
            share_amount: r.u64(),
            escrowed_shares: r.handle(),
            price_per_share: r.u64(),
            is_active: r.bool()?,
            bump: r.u8(),
        })
    }
}

/// Program-wide USDC custody configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalProgramVault {
    pub usdc_token_account: Pubkey,
    pub bump: u8,
}

impl ProgramAccountLayout for GlobalProgramVault {
    const NAME: &'static str = "GlobalProgramVault";
    const LEN: usize = DISCRIMINATOR_LENGTH + ADDRESS_LENGTH + 1;

    fn decode(data: &[u8]) -> Result<Self, AccountDecodeError> {
        let mut r = Reader::open(Self::NAME, data, Self::LEN)?;
        Ok(Self {
            usdc_token_account: r.pubkey(),
            bump: r.u8(),
        })
    }
}

/// Encoders producing account bytes, for seeding the in-memory ledger.
/// The client never writes program accounts on a real ledger.
pub mod fixtures {
    use super::*;

    fn header<T: ProgramAccountLayout>() -> Vec<u8> {
        let mut out = Vec::with_capacity(T::LEN);
        out.extend_from_slice(&T::discriminator());
        out
    }

    pub fn investor_vault(v: &InvestorVault) -> Vec<u8> {
        let mut out = header::<InvestorVault>();
        out.extend_from_slice(v.owner.as_bytes());
        out.extend_from_slice(&v.cusd.to_le_bytes16());
        out.push(v.bump);
        out
    }

    pub fn company(c: &CompanyAccount) -> Vec<u8> {
        let mut out = header::<CompanyAccount>();
        out.extend_from_slice(&c.company_id.to_le_bytes());
        out.extend_from_slice(c.company_admin.as_bytes());
        out.extend_from_slice(&c.cusd.to_le_bytes16());
        out.extend_from_slice(&c.shares_available.to_le_bytes());
        out.extend_from_slice(&c.price_per_share.to_le_bytes());
        out.push(c.active as u8);
        out.push(c.bump);
        out
    }

    pub fn position(p: &PositionAccount) -> Vec<u8> {
        let mut out = header::<PositionAccount>();
        out.extend_from_slice(p.owner.as_bytes());
        out.extend_from_slice(&p.company_id.to_le_bytes());
        out.extend_from_slice(&p.encrypted_shares.to_le_bytes16());
        out.push(p.bump);
        out
    }

    pub fn offer(o: &OfferAccount) -> Vec<u8> {
        let mut out = header::<OfferAccount>();
        out.extend_from_slice(&o.offer_id.to_le_bytes());
        out.extend_from_slice(o.seller.as_bytes());
        out.extend_from_slice(&o.company_id.to_le_bytes());
        out.extend_from_slice(&o.share_amount.to_le_bytes());
        out.extend_from_slice(&o.escrowed_shares.to_le_bytes16());
        out.extend_from_slice(&o.price_per_share.to_le_bytes());
        out.push(o.is_active as u8);
        out.push(o.bump);
        out
    }

    pub fn global_vault(g: &GlobalProgramVault) -> Vec<u8> {
        let mut out = header::<GlobalProgramVault>();
        out.extend_from_slice(g.usdc_token_account.as_bytes());
        out.push(g.bump);
        out
    }
}
