//! Trading-program instruction builders.
//!
//! One method per instruction. Each derives the program-owned accounts it
//! needs, lays out the account metas in the order the program's context
//! struct declares them, and encodes the arguments. Nothing here talks to
//! the network; submitting is the ledger client's job.

use thiserror::Error;

use super::instruction::{AccountMeta, Instruction, InstructionData};
use super::types::{InstructionKind, UsdcAmount};
use crate::address::{AddressDeriver, DerivationError, Pubkey};
use crate::config::{ClientConfig, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::handle::Handle;

/// Errors building an instruction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InstructionError {
    #[error("address derivation failed: {0}")]
    Derivation(#[from] DerivationError),

    /// The zero handle means "no value"; there is nothing to authorize.
    #[error("cannot authorize decryption of the zero handle")]
    ZeroHandle,
}

/// Arguments of a company application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyApplication {
    pub company_id: u64,
    pub initial_shares: u64,
    pub price_per_share: UsdcAmount,
    /// Offering document URL, already run through the metadata cipher.
    pub offering_url: String,
    /// Handle whose plaintext keys the metadata cipher. The platform admin
    /// and the company admin both receive an allowance on it.
    pub metadata_handle: Handle,
}

/// Arguments of an offering update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferingUpdate {
    pub new_price: UsdcAmount,
    pub add_shares: u64,
    pub active: bool,
    /// `None` leaves the stored URL unchanged.
    pub offering_url: Option<String>,
}

/// Builds instructions for one deployment of the trading program.
#[derive(Debug, Clone)]
pub struct InstructionBuilder {
    config: ClientConfig,
    deriver: AddressDeriver,
    system_program: Pubkey,
    token_program: Pubkey,
}

impl Default for InstructionBuilder {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl InstructionBuilder {
    pub fn new(config: ClientConfig) -> Self {
        let deriver = AddressDeriver::from_config(&config);
        Self {
            config,
            deriver,
            system_program: Pubkey::from_static(SYSTEM_PROGRAM_ID),
            token_program: Pubkey::from_static(TOKEN_PROGRAM_ID),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    /// The wallet's USDC token account.
    pub fn usdc_account(&self, owner: &Pubkey) -> Result<Pubkey, InstructionError> {
        Ok(self
            .deriver
            .associated_token_account(owner, &self.config.usdc_mint)?
            .address)
    }

    fn instruction(&self, kind: InstructionKind, accounts: Vec<AccountMeta>, data: InstructionData) -> Instruction {
        Instruction {
            kind,
            program_id: self.config.program_id,
            accounts,
            data: data.finish(),
        }
    }

    fn decryption_program(&self) -> AccountMeta {
        AccountMeta::readonly(self.config.decryption_program_id)
    }

    fn system_program(&self) -> AccountMeta {
        AccountMeta::readonly(self.system_program)
    }

    fn token_program(&self) -> AccountMeta {
        AccountMeta::readonly(self.token_program)
    }

    // -----------------------------------------------------------------------
    // Vault
    // -----------------------------------------------------------------------

    /// Moves `amount` USDC from the investor's token account into the
    /// program vault and credits the investor's confidential balance.
    pub fn deposit(
        &self,
        investor: &Pubkey,
        investor_token_account: &Pubkey,
        vault_token_account: &Pubkey,
        amount: UsdcAmount,
    ) -> Result<Instruction, InstructionError> {
        let vault = self.deriver.investor_vault(investor)?;
        let accounts = vec![
            AccountMeta::signer(*investor),
            AccountMeta::writable(vault.address),
            AccountMeta::writable(*investor_token_account),
            AccountMeta::writable(*vault_token_account),
            self.decryption_program(),
            self.token_program(),
            self.system_program(),
        ];
        let data = InstructionData::new(InstructionKind::Deposit).u64(amount.base_units());
        Ok(self.instruction(InstructionKind::Deposit, accounts, data))
    }

    pub fn withdraw(
        &self,
        investor: &Pubkey,
        investor_token_account: &Pubkey,
        vault_token_account: &Pubkey,
        amount: UsdcAmount,
    ) -> Result<Instruction, InstructionError> {
        let vault = self.deriver.investor_vault(investor)?;
        let global = self.deriver.global_vault()?;
        let accounts = vec![
            AccountMeta::signer(*investor),
            AccountMeta::writable(vault.address),
            AccountMeta::readonly(global.address),
            AccountMeta::writable(*investor_token_account),
            AccountMeta::writable(*vault_token_account),
            self.decryption_program(),
            self.token_program(),
            self.system_program(),
        ];
        let data = InstructionData::new(InstructionKind::Withdraw).u64(amount.base_units());
        Ok(self.instruction(InstructionKind::Withdraw, accounts, data))
    }

    // -----------------------------------------------------------------------
    // Shares
    // -----------------------------------------------------------------------

    fn primary_trade(
        &self,
        kind: InstructionKind,
        investor: &Pubkey,
        company_id: u64,
        share_amount: u64,
    ) -> Result<Instruction, InstructionError> {
        let vault = self.deriver.investor_vault(investor)?;
        let company = self.deriver.company(company_id)?;
        let position = self.deriver.position(company_id, investor)?;
        let accounts = vec![
            AccountMeta::signer(*investor),
            AccountMeta::writable(vault.address),
            AccountMeta::writable(company.address),
            AccountMeta::writable(position.address),
            self.decryption_program(),
            self.system_program(),
        ];
        let data = InstructionData::new(kind).u64(share_amount);
        Ok(self.instruction(kind, accounts, data))
    }

    /// Buys shares from the company's primary offering.
    pub fn buy_shares(
        &self,
        investor: &Pubkey,
        company_id: u64,
        share_amount: u64,
    ) -> Result<Instruction, InstructionError> {
        self.primary_trade(InstructionKind::BuyShares, investor, company_id, share_amount)
    }

    /// Sells shares back to the company.
    pub fn sell_shares(
        &self,
        investor: &Pubkey,
        company_id: u64,
        share_amount: u64,
    ) -> Result<Instruction, InstructionError> {
        self.primary_trade(InstructionKind::SellShares, investor, company_id, share_amount)
    }

    /// Peer-to-peer transfer; creates the receiver's position if needed.
    pub fn transfer_shares(
        &self,
        sender: &Pubkey,
        receiver: &Pubkey,
        company_id: u64,
        share_amount: u64,
    ) -> Result<Instruction, InstructionError> {
        let sender_position = self.deriver.position(company_id, sender)?;
        let receiver_position = self.deriver.position(company_id, receiver)?;
        let accounts = vec![
            AccountMeta::signer(*sender),
            AccountMeta::readonly(*receiver),
            AccountMeta::writable(sender_position.address),
            AccountMeta::writable(receiver_position.address),
            self.decryption_program(),
            self.system_program(),
        ];
        let data = InstructionData::new(InstructionKind::TransferShares).u64(share_amount);
        Ok(self.instruction(InstructionKind::TransferShares, accounts, data))
    }

    // -----------------------------------------------------------------------
    // Secondary Market
    // -----------------------------------------------------------------------

    /// Lists shares for sale. The shares move into escrow on the offer.
    pub fn create_offer(
        &self,
        seller: &Pubkey,
        company_id: u64,
        offer_id: u64,
        share_amount: u64,
        price_per_share: UsdcAmount,
    ) -> Result<Instruction, InstructionError> {
        let company = self.deriver.company(company_id)?;
        let position = self.deriver.position(company_id, seller)?;
        let offer = self.deriver.offer(seller, offer_id)?;
        let accounts = vec![
            AccountMeta::signer(*seller),
            AccountMeta::readonly(company.address),
            AccountMeta::writable(position.address),
            AccountMeta::writable(offer.address),
            self.decryption_program(),
            self.system_program(),
        ];
        let data = InstructionData::new(InstructionKind::CreateOffer)
            .u64(offer_id)
            .u64(share_amount)
            .u64(price_per_share.base_units());
        Ok(self.instruction(InstructionKind::CreateOffer, accounts, data))
    }

    /// Fills an open offer in full.
    pub fn execute_trade(
        &self,
        buyer: &Pubkey,
        seller: &Pubkey,
        company_id: u64,
        offer_id: u64,
    ) -> Result<Instruction, InstructionError> {
        let offer = self.deriver.offer(seller, offer_id)?;
        let buyer_vault = self.deriver.investor_vault(buyer)?;
        let seller_vault = self.deriver.investor_vault(seller)?;
        let company = self.deriver.company(company_id)?;
        let buyer_position = self.deriver.position(company_id, buyer)?;
        let accounts = vec![
            AccountMeta::signer(*buyer),
            AccountMeta::writable(offer.address),
            AccountMeta::writable(buyer_vault.address),
            AccountMeta::writable(seller_vault.address),
            AccountMeta::readonly(company.address),
            AccountMeta::writable(buyer_position.address),
            self.decryption_program(),
            self.system_program(),
        ];
        let data = InstructionData::new(InstructionKind::ExecuteTrade);
        Ok(self.instruction(InstructionKind::ExecuteTrade, accounts, data))
    }

    // -----------------------------------------------------------------------
    // Decryption
    // -----------------------------------------------------------------------

    /// Grants `allowed` the right to decrypt `handle`. Signed by `investor`,
    /// who must own the value (the program checks).
    pub fn authorize_decryption(
        &self,
        investor: &Pubkey,
        handle: Handle,
        allowed: &Pubkey,
    ) -> Result<Instruction, InstructionError> {
        if handle.is_zero() {
            return Err(InstructionError::ZeroHandle);
        }
        let allowance = self.deriver.allowance(handle, allowed)?;
        let accounts = vec![
            AccountMeta::signer(*investor),
            AccountMeta::readonly(*allowed),
            AccountMeta::writable(allowance.address),
            self.decryption_program(),
            self.system_program(),
        ];
        let data = InstructionData::new(InstructionKind::AuthorizeDecryption).u128(handle.value());
        Ok(self.instruction(InstructionKind::AuthorizeDecryption, accounts, data))
    }

    // -----------------------------------------------------------------------
    // Company Lifecycle
    // -----------------------------------------------------------------------

    /// Creates the company account and allowances on the metadata handle
    /// for both the platform admin and the company admin, in one call.
    pub fn submit_application(
        &self,
        payer: &Pubkey,
        company_admin: &Pubkey,
        application: &CompanyApplication,
    ) -> Result<Instruction, InstructionError> {
        let company = self.deriver.company(application.company_id)?;
        let admin_allowance = self
            .deriver
            .allowance(application.metadata_handle, &self.config.platform_admin)?;
        let self_allowance = self
            .deriver
            .allowance(application.metadata_handle, company_admin)?;
        let accounts = vec![
            AccountMeta::signer(*payer),
            AccountMeta::readonly(*company_admin),
            AccountMeta::writable(company.address),
            AccountMeta::writable(admin_allowance.address),
            AccountMeta::writable(self_allowance.address),
            AccountMeta::readonly(self.config.platform_admin),
            self.decryption_program(),
            self.system_program(),
        ];
        let data = InstructionData::new(InstructionKind::SubmitApplication)
            .u64(application.company_id)
            .u64(application.initial_shares)
            .u64(application.price_per_share.base_units())
            .string(&application.offering_url)
            .u128(application.metadata_handle.value());
        Ok(self.instruction(InstructionKind::SubmitApplication, accounts, data))
    }

    /// Approve-and-activate, signed by the platform admin.
    pub fn activate_company(
        &self,
        platform_admin: &Pubkey,
        company_admin: &Pubkey,
        company_id: u64,
        initial_shares: u64,
        price_per_share: UsdcAmount,
    ) -> Result<Instruction, InstructionError> {
        let company = self.deriver.company(company_id)?;
        let accounts = vec![
            AccountMeta::signer(*platform_admin),
            AccountMeta::writable(company.address),
            self.system_program(),
        ];
        let data = InstructionData::new(InstructionKind::ActivateCompany)
            .u64(company_id)
            .pubkey(company_admin)
            .u64(initial_shares)
            .u64(price_per_share.base_units());
        Ok(self.instruction(InstructionKind::ActivateCompany, accounts, data))
    }

    pub fn update_offering(
        &self,
        company_admin: &Pubkey,
        company_id: u64,
        update: &OfferingUpdate,
    ) -> Result<Instruction, InstructionError> {
        let company = self.deriver.company(company_id)?;
        let accounts = vec![
            AccountMeta::signer(*company_admin),
            AccountMeta::writable(company.address),
            self.decryption_program(),
        ];
        let data = InstructionData::new(InstructionKind::UpdateOffering)
            .u64(update.new_price.base_units())
            .u64(update.add_shares)
            .bool(update.active)
            .option_string(update.offering_url.as_deref());
        Ok(self.instruction(InstructionKind::UpdateOffering, accounts, data))
    }

    /// Pays raised funds out of the company's confidential balance.
    pub fn withdraw_company_funds(
        &self,
        company_admin: &Pubkey,
        company_id: u64,
        admin_token_account: &Pubkey,
        vault_token_account: &Pubkey,
        amount: UsdcAmount,
    ) -> Result<Instruction, InstructionError> {
        let company = self.deriver.company(company_id)?;
        let global = self.deriver.global_vault()?;
        let accounts = vec![
            AccountMeta::signer(*company_admin),
            AccountMeta::writable(company.address),
            AccountMeta::readonly(global.address),
            AccountMeta::writable(*admin_token_account),
            AccountMeta::writable(*vault_token_account),
            self.decryption_program(),
            self.token_program(),
            self.system_program(),
        ];
        let data =
            InstructionData::new(InstructionKind::WithdrawCompanyFunds).u64(amount.base_units());
        Ok(self.instruction(InstructionKind::WithdrawCompanyFunds, accounts, data))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn investor() -> Pubkey {
        let bytes: Vec<u8> = (1..=32).collect();
        Pubkey::try_from_slice(&bytes).unwrap()
    }

    fn other() -> Pubkey {
        Pubkey::new([0xAB; 32])
    }

    #[test]
    fn authorize_decryption_layout() {
        let b = InstructionBuilder::default();
        let ix = b
            .authorize_decryption(&investor(), Handle::new(1_000_000), &investor())
            .unwrap();

        assert_eq!(ix.program_id, b.config().program_id);
        assert_eq!(&ix.data[..8], &[114, 245, 30, 117, 209, 140, 74, 121]);
        assert_eq!(&ix.data[8..], &1_000_000u128.to_le_bytes());

        assert_eq!(ix.accounts.len(), 5);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert_eq!(
            ix.accounts[2].pubkey.to_string(),
            "4GWrmPAMZytzYyeRX2J52EsrWk2sWtMftvZFsf4o85eJ"
        );
        assert!(ix.accounts[2].is_writable);
        assert_eq!(ix.accounts[3].pubkey, b.config().decryption_program_id);
    }

    #[test]
    fn authorize_zero_handle_rejected() {
        let b = InstructionBuilder::default();
        assert_eq!(
            b.authorize_decryption(&investor(), Handle::ZERO, &investor()),
            Err(InstructionError::ZeroHandle)
        );
    }

    #[test]
    fn buy_and_sell_share_accounts() {
        let b = InstructionBuilder::default();
        let buy = b.buy_shares(&investor(), 42, 10).unwrap();
        let sell = b.sell_shares(&investor(), 42, 10).unwrap();

        assert_eq!(buy.accounts, sell.accounts);
        assert_ne!(buy.data[..8], sell.data[..8]);
        assert_eq!(
            buy.accounts[2].pubkey.to_string(),
            "6hKFh16E51v1bGqPotk5zBS7tXa9QEo9U9iF4RhnffJW"
        );
        assert_eq!(
            buy.accounts[3].pubkey.to_string(),
            "AoEvvz4gpMLcuu75mMFp2xHqSRrdn9yTyRgApk2Q56vu"
        );
        assert_eq!(buy.signers().collect::<Vec<_>>(), vec![&investor()]);
    }

    #[test]
    fn deposit_encodes_amount() {
        let b = InstructionBuilder::default();
        let ata = b.usdc_account(&investor()).unwrap();
        let ix = b
            .deposit(&investor(), &ata, &other(), UsdcAmount(5_000_000))
            .unwrap();
        assert_eq!(&ix.data[..8], &InstructionKind::Deposit.discriminator());
        assert_eq!(&ix.data[8..], &5_000_000u64.to_le_bytes());
        assert_eq!(ix.accounts.len(), 7);
        assert_eq!(
            ix.accounts[1].pubkey.to_string(),
            "GYVjXMnpRb4aQqfT2xmCvTt4aevgqdtQunQtaVhdYng6"
        );
        assert_eq!(ix.accounts[5].pubkey.to_string(), TOKEN_PROGRAM_ID);
    }

    #[test]
    fn withdraw_includes_global_vault() {
        let b = InstructionBuilder::default();
        let ix = b
            .withdraw(&investor(), &other(), &other(), UsdcAmount(1))
            .unwrap();
        assert_eq!(ix.accounts.len(), 8);
        assert_eq!(
            ix.accounts[2].pubkey.to_string(),
            "AEZhNFKj4p1A4fm6hMZnoF7rDJFcn5hR4BiMKan3uJUe"
        );
        assert!(!ix.accounts[2].is_writable);
    }

    #[test]
    fn create_offer_and_execute_trade_share_offer_address() {
        let b = InstructionBuilder::default();
        let create = b
            .create_offer(&investor(), 42, 7, 100, UsdcAmount(2_000_000))
            .unwrap();
        let exec = b.execute_trade(&other(), &investor(), 42, 7).unwrap();

        let offer = "taz6LbtPeLk42FGBDsPK1oZFR2JCXkZ9gJTwvammAvp";
        assert_eq!(create.accounts[3].pubkey.to_string(), offer);
        assert_eq!(exec.accounts[1].pubkey.to_string(), offer);
        assert_eq!(create.data.len(), 8 + 24);
        assert_eq!(exec.data.len(), 8);
    }

    #[test]
    fn transfer_shares_positions() {
        let b = InstructionBuilder::default();
        let ix = b.transfer_shares(&investor(), &other(), 42, 3).unwrap();
        let d = b.deriver();
        assert_eq!(ix.accounts[2].pubkey, d.position(42, &investor()).unwrap().address);
        assert_eq!(ix.accounts[3].pubkey, d.position(42, &other()).unwrap().address);
        assert!(!ix.accounts[1].is_signer);
    }

    #[test]
    fn submit_application_grants_two_allowances() {
        let b = InstructionBuilder::default();
        let app = CompanyApplication {
            company_id: 42,
            initial_shares: 1_000,
            price_per_share: UsdcAmount(10_000_000),
            offering_url: "b2ZmZXJpbmc=".to_string(),
            metadata_handle: Handle::new(555),
        };
        let ix = b.submit_application(&investor(), &other(), &app).unwrap();
        let d = b.deriver();
        assert_eq!(
            ix.accounts[3].pubkey,
            d.allowance(Handle::new(555), &b.config().platform_admin)
                .unwrap()
                .address
        );
        assert_eq!(
            ix.accounts[4].pubkey,
            d.allowance(Handle::new(555), &other()).unwrap().address
        );

        // company_id, initial_shares, price, url (4 + 12), handle
        assert_eq!(ix.data.len(), 8 + 8 + 8 + 8 + 4 + 12 + 16);
        assert_eq!(&ix.data[ix.data.len() - 16..], &555u128.to_le_bytes());
    }

    #[test]
    fn activate_company_embeds_admin() {
        let b = InstructionBuilder::default();
        let ix = b
            .activate_company(&investor(), &other(), 42, 1_000, UsdcAmount(1_000_000))
            .unwrap();
        assert_eq!(&ix.data[16..48], other().as_bytes());
        assert_eq!(ix.accounts.len(), 3);
    }

    #[test]
    fn update_offering_optional_url() {
        let b = InstructionBuilder::default();
        let mut update = OfferingUpdate {
            new_price: UsdcAmount(1),
            add_shares: 0,
            active: false,
            offering_url: None,
        };
        let without = b.update_offering(&investor(), 42, &update).unwrap();
        assert_eq!(without.data.len(), 8 + 8 + 8 + 1 + 1);

        update.offering_url = Some("x".into());
        let with = b.update_offering(&investor(), 42, &update).unwrap();
        assert_eq!(with.data.len(), 8 + 8 + 8 + 1 + 1 + 4 + 1);
    }

    #[test]
    fn withdraw_company_funds_accounts() {
        let b = InstructionBuilder::default();
        let ix = b
            .withdraw_company_funds(&investor(), 42, &other(), &other(), UsdcAmount(9))
            .unwrap();
        assert_eq!(ix.accounts.len(), 8);
        assert_eq!(ix.kind, InstructionKind::WithdrawCompanyFunds);
    }
}
