//! Entity address derivation.
//!
//! One method per on-ledger entity. Seed order and encoding are a contract
//! with the deployed program, so each method spells its seeds out literally
//! rather than going through a generic helper.
//!
//! | Entity              | Seeds                                        | Program    |
//! |---------------------|----------------------------------------------|------------|
//! | Investor vault      | `"vault"`, investor                          | trading    |
//! | Global vault config | `"vault_authority"`                          | trading    |
//! | Company             | `"company"`, company_id (u64 LE)             | trading    |
//! | Position            | `"position"`, company_id (u64 LE), investor  | trading    |
//! | Offer               | `"offer"`, seller, offer_id (u64 LE)         | trading    |
//! | Allowance           | handle (16 LE), allowed identity             | decryption |
//! | Token account       | owner, token program, mint                   | assoc. token |
//!
//! Nothing is cached; callers re-derive on every use.

use crate::address::pda::{find_program_address, DerivationError};
use crate::address::Pubkey;
use crate::config::{
    ClientConfig, ASSOCIATED_TOKEN_PROGRAM_ID, COMPANY_SEED, OFFER_SEED, POSITION_SEED,
    TOKEN_PROGRAM_ID, VAULT_AUTHORITY_SEED, VAULT_SEED,
};
use crate::handle::Handle;

/// A derived address together with its canonical bump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DerivedAddress {
    pub address: Pubkey,
    pub bump: u8,
}

impl From<(Pubkey, u8)> for DerivedAddress {
    fn from((address, bump): (Pubkey, u8)) -> Self {
        Self { address, bump }
    }
}

/// Derives every entity address for one deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressDeriver {
    program_id: Pubkey,
    decryption_program_id: Pubkey,
}

impl Default for AddressDeriver {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl AddressDeriver {
    pub fn new(program_id: Pubkey, decryption_program_id: Pubkey) -> Self {
        Self {
            program_id,
            decryption_program_id,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.program_id, config.decryption_program_id)
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn decryption_program_id(&self) -> &Pubkey {
        &self.decryption_program_id
    }

    /// Per-investor confidential cUSD vault.
    pub fn investor_vault(&self, investor: &Pubkey) -> Result<DerivedAddress, DerivationError> {
        find_program_address(&[VAULT_SEED, investor.as_bytes()], &self.program_id).map(Into::into)
    }

    /// Singleton config holding the program's USDC token account.
    pub fn global_vault(&self) -> Result<DerivedAddress, DerivationError> {
        find_program_address(&[VAULT_AUTHORITY_SEED], &self.program_id).map(Into::into)
    }

    pub fn company(&self, company_id: u64) -> Result<DerivedAddress, DerivationError> {
        let id = company_id.to_le_bytes();
        find_program_address(&[COMPANY_SEED, &id], &self.program_id).map(Into::into)
    }

    /// An investor's encrypted share position in one company.
    pub fn position(
        &self,
        company_id: u64,
        investor: &Pubkey,
    ) -> Result<DerivedAddress, DerivationError> {
        let id = company_id.to_le_bytes();
        find_program_address(&[POSITION_SEED, &id, investor.as_bytes()], &self.program_id)
            .map(Into::into)
    }

    /// A secondary-market sell offer. Note the seller comes before the id.
    pub fn offer(&self, seller: &Pubkey, offer_id: u64) -> Result<DerivedAddress, DerivationError> {
        let id = offer_id.to_le_bytes();
        find_program_address(&[OFFER_SEED, seller.as_bytes(), &id], &self.program_id)
            .map(Into::into)
    }

    /// Allowance record granting `allowed` the right to decrypt `handle`.
    ///
    /// Lives under the decryption program, not the trading program. Its
    /// existence on the ledger is the whole authorization; there is no
    /// payload worth reading.
    pub fn allowance(
        &self,
        handle: Handle,
        allowed: &Pubkey,
    ) -> Result<DerivedAddress, DerivationError> {
        let handle_bytes = handle.to_le_bytes16();
        find_program_address(
            &[&handle_bytes, allowed.as_bytes()],
            &self.decryption_program_id,
        )
        .map(Into::into)
    }

    /// The wallet's canonical token account for `mint`. Deposits draw from it
    /// and withdrawals pay into it.
    pub fn associated_token_account(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<DerivedAddress, DerivationError> {
        let token_program = Pubkey::from_static(TOKEN_PROGRAM_ID);
        let ata_program = Pubkey::from_static(ASSOCIATED_TOKEN_PROGRAM_ID);
        find_program_address(
            &[owner.as_bytes(), token_program.as_bytes(), mint.as_bytes()],
            &ata_program,
        )
        .map(Into::into)
    }
}
