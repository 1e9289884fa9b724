//! Account lookups against a [`Ledger`].
//!
//! Point lookups derive the account address and decode whatever is there.
//! Scans filter program accounts by discriminator plus one field; accounts
//! that fail to decode are skipped with a warning instead of failing the
//! whole listing.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::layout::{
    AccountDecodeError, CompanyAccount, GlobalProgramVault, InvestorVault, OfferAccount,
    PositionAccount, ProgramAccountLayout,
};
use crate::address::{AddressDeriver, DerivationError, Pubkey};
use crate::crypto::hash::DISCRIMINATOR_LENGTH;
use crate::ledger::{Ledger, LedgerError, MemcmpFilter, ProgramAccount};

#[derive(Debug, Error)]
pub enum AccountQueryError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Derivation(#[from] DerivationError),

    #[error(transparent)]
    Decode(#[from] AccountDecodeError),
}

/// Read-only view of program state.
#[derive(Clone)]
pub struct AccountQuery {
    ledger: Arc<dyn Ledger>,
    deriver: AddressDeriver,
}

impl AccountQuery {
    pub fn new(ledger: Arc<dyn Ledger>, deriver: AddressDeriver) -> Self {
        Self { ledger, deriver }
    }

    /// `None` for an investor who has never deposited.
    pub async fn investor_vault(
        &self,
        investor: &Pubkey,
    ) -> Result<Option<InvestorVault>, AccountQueryError> {
        let address = self.deriver.investor_vault(investor)?.address;
        self.fetch(&address).await
    }

    pub async fn company(&self, company_id: u64) -> Result<Option<CompanyAccount>, AccountQueryError> {
        let address = self.deriver.company(company_id)?.address;
        self.fetch(&address).await
    }

    pub async fn position(
        &self,
        company_id: u64,
        investor: &Pubkey,
    ) -> Result<Option<PositionAccount>, AccountQueryError> {
        let address = self.deriver.position(company_id, investor)?.address;
        self.fetch(&address).await
    }

    pub async fn offer(
        &self,
        seller: &Pubkey,
        offer_id: u64,
    ) -> Result<Option<OfferAccount>, AccountQueryError> {
        let address = self.deriver.offer(seller, offer_id)?.address;
        self.fetch(&address).await
    }

    pub async fn global_vault(&self) -> Result<Option<GlobalProgramVault>, AccountQueryError> {
        let address = self.deriver.global_vault()?.address;
        self.fetch(&address).await
    }

    /// Every position held by `investor`, across companies.
    pub async fn investor_positions(
        &self,
        investor: &Pubkey,
    ) -> Result<Vec<PositionAccount>, AccountQueryError> {
        let owner = MemcmpFilter::new(DISCRIMINATOR_LENGTH, investor.to_bytes());
        self.scan::<PositionAccount>(Some(owner)).await
    }

    /// Every position in `company_id`. Share counts stay encrypted; only the
    /// holders are visible.
    pub async fn company_investors(
        &self,
        company_id: u64,
    ) -> Result<Vec<PositionAccount>, AccountQueryError> {
        let company = MemcmpFilter::new(
            PositionAccount::COMPANY_ID_OFFSET,
            company_id.to_le_bytes(),
        );
        self.scan::<PositionAccount>(Some(company)).await
    }

    /// The company administered by `admin`, if any. With several, the first
    /// one the ledger returns wins.
    pub async fn company_by_admin(
        &self,
        admin: &Pubkey,
    ) -> Result<Option<CompanyAccount>, AccountQueryError> {
        let filter = MemcmpFilter::new(CompanyAccount::ADMIN_OFFSET, admin.to_bytes());
        Ok(self
            .scan::<CompanyAccount>(Some(filter))
            .await?
            .into_iter()
            .next())
    }

    /// Every company, sorted by id.
    pub async fn all_companies(&self) -> Result<Vec<CompanyAccount>, AccountQueryError> {
        let mut companies = self.scan::<CompanyAccount>(None).await?;
        companies.sort_by_key(|c| c.company_id);
        Ok(companies)
    }

    async fn fetch<T: ProgramAccountLayout>(
        &self,
        address: &Pubkey,
    ) -> Result<Option<T>, AccountQueryError> {
        match self.ledger.get_account_data(address).await? {
            Some(data) => Ok(Some(T::decode(&data)?)),
            None => {
                debug!(account = T::NAME, %address, "account does not exist");
                Ok(None)
            }
        }
    }

    async fn scan<T: ProgramAccountLayout>(
        &self,
        field: Option<MemcmpFilter>,
    ) -> Result<Vec<T>, AccountQueryError> {
        let mut filters = vec![MemcmpFilter::new(0, T::discriminator())];
        filters.extend(field);
        let accounts = self
            .ledger
            .get_program_accounts(self.deriver.program_id(), &filters)
            .await?;
        Ok(decode_all(accounts))
    }
}

fn decode_all<T: ProgramAccountLayout>(accounts: Vec<ProgramAccount>) -> Vec<T> {
    accounts
        .into_iter()
        .filter_map(|account| match T::decode(&account.data) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(address = %account.address, error = %e, "skipping undecodable account");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::layout::fixtures;
    use crate::config::ClientConfig;
    use crate::handle::Handle;
    use crate::ledger::InMemoryLedger;

    struct Fixture {
        ledger: Arc<InMemoryLedger>,
        query: AccountQuery,
        deriver: AddressDeriver,
        program: Pubkey,
    }

    fn setup() -> Fixture {
        let config = ClientConfig::default();
        let ledger = Arc::new(InMemoryLedger::new(&config));
        let deriver = AddressDeriver::from_config(&config);
        let query = AccountQuery::new(ledger.clone(), deriver.clone());
        Fixture {
            ledger,
            query,
            program: config.program_id,
            deriver,
        }
    }

    fn position(owner: Pubkey, company_id: u64, shares: u128) -> PositionAccount {
        PositionAccount {
            owner,
            company_id,
            encrypted_shares: Handle::new(shares),
            bump: 255,
        }
    }

    fn company(company_id: u64, admin: Pubkey) -> CompanyAccount {
        CompanyAccount {
            company_id,
            company_admin: admin,
            cusd: Handle::new(company_id as u128 * 10),
            shares_available: 100,
            price_per_share: 1_000_000,
            active: true,
            bump: 255,
        }
    }

    fn put_position(f: &Fixture, p: &PositionAccount) {
        let address = f.deriver.position(p.company_id, &p.owner).unwrap().address;
        f.ledger
            .insert_account(address, f.program, fixtures::position(p));
    }

    fn put_company(f: &Fixture, c: &CompanyAccount) {
        let address = f.deriver.company(c.company_id).unwrap().address;
        f.ledger.insert_account(address, f.program, fixtures::company(c));
    }

    #[tokio::test]
    async fn missing_vault_is_none() {
        let f = setup();
        let vault = f.query.investor_vault(&Pubkey::new([1u8; 32])).await.unwrap();
        assert!(vault.is_none());
    }

    #[tokio::test]
    async fn fetches_vault_at_derived_address() {
        let f = setup();
        let investor = Pubkey::new([1u8; 32]);
        let vault = InvestorVault {
            owner: investor,
            cusd: Handle::new(1_000_000),
            bump: 253,
        };
        let address = f.deriver.investor_vault(&investor).unwrap().address;
        f.ledger
            .insert_account(address, f.program, fixtures::investor_vault(&vault));

        let fetched = f.query.investor_vault(&investor).await.unwrap().unwrap();
        assert_eq!(fetched.cusd, Handle::new(1_000_000));
    }

    #[tokio::test]
    async fn wrong_account_type_is_a_decode_error() {
        let f = setup();
        let investor = Pubkey::new([1u8; 32]);
        let address = f.deriver.investor_vault(&investor).unwrap().address;
        f.ledger.insert_account(
            address,
            f.program,
            fixtures::company(&company(1, investor)),
        );
        assert!(matches!(
            f.query.investor_vault(&investor).await,
            Err(AccountQueryError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn scans_positions_by_company_and_owner() {
        let f = setup();
        let alice = Pubkey::new([1u8; 32]);
        let bob = Pubkey::new([2u8; 32]);
        put_position(&f, &position(alice, 1, 10));
        put_position(&f, &position(bob, 1, 20));
        put_position(&f, &position(alice, 2, 30));
        put_company(&f, &company(1, alice));

        let holders = f.query.company_investors(1).await.unwrap();
        assert_eq!(holders.len(), 2);
        assert!(holders.iter().all(|p| p.company_id == 1));

        let mut mine = f.query.investor_positions(&alice).await.unwrap();
        mine.sort_by_key(|p| p.company_id);
        assert_eq!(
            mine.iter().map(|p| p.company_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn finds_company_by_admin() {
        let f = setup();
        let admin = Pubkey::new([7u8; 32]);
        put_company(&f, &company(5, Pubkey::new([8u8; 32])));
        put_company(&f, &company(9, admin));

        let found = f.query.company_by_admin(&admin).await.unwrap().unwrap();
        assert_eq!(found.company_id, 9);
        assert!(f
            .query
            .company_by_admin(&Pubkey::new([3u8; 32]))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn lists_companies_sorted_and_skips_garbage() {
        let f = setup();
        let admin = Pubkey::new([7u8; 32]);
        put_company(&f, &company(3, admin));
        put_company(&f, &company(1, admin));

        let mut truncated = fixtures::company(&company(2, admin));
        truncated.truncate(20);
        f.ledger
            .insert_account(Pubkey::new([50u8; 32]), f.program, truncated);

        let ids: Vec<u64> = f
            .query
            .all_companies()
            .await
            .unwrap()
            .iter()
            .map(|c| c.company_id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
