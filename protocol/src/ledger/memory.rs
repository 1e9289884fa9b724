//! In-process ledger and decryption service.
//!
//! [`InMemoryLedger`] keeps accounts in a map, verifies signatures on
//! submit, and applies the one state change the access layer cares about:
//! a confirmed `authorize_decryption` creates the allowance account.
//! Everything else a real program would do (balances, share counts) is out
//! of scope; those transactions confirm without touching state.
//!
//! [`InMemoryDecryptionService`] answers decryption requests from a table
//! of plaintexts, enforcing the same allowance check the real co-processor
//! does. Both expose counters and failure scripting for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ed25519_dalek::{Verifier, VerifyingKey};
use parking_lot::Mutex;
use tracing::debug;

use super::decryption::{
    decryption_challenge, DecryptResponse, DecryptionService, DecryptionServiceError,
};
use super::{Confirmation, Ledger, LedgerError, MemcmpFilter, ProgramAccount};
use crate::address::{AddressDeriver, Pubkey};
use crate::config::{ClientConfig, HANDLE_LENGTH};
use crate::handle::Handle;
use crate::transaction::{InstructionKind, SignedTransaction, TxSignature};
use crate::wallet::CanSignMessage;

// ---------------------------------------------------------------------------
// InMemoryLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredAccount {
    owner: Pubkey,
    data: Vec<u8>,
}

/// A ledger that lives in a few maps.
#[derive(Debug)]
pub struct InMemoryLedger {
    decryption_program_id: Pubkey,
    accounts: DashMap<Pubkey, StoredAccount>,
    outcomes: DashMap<TxSignature, Confirmation>,
    submitted: Mutex<Vec<SignedTransaction>>,
    scripted_failures: Mutex<VecDeque<String>>,
    reads: AtomicUsize,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl InMemoryLedger {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            decryption_program_id: config.decryption_program_id,
            accounts: DashMap::new(),
            outcomes: DashMap::new(),
            submitted: Mutex::new(Vec::new()),
            scripted_failures: Mutex::new(VecDeque::new()),
            reads: AtomicUsize::new(0),
        }
    }

    /// Creates or replaces an account.
    pub fn insert_account(&self, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        self.accounts.insert(address, StoredAccount { owner, data });
    }

    pub fn remove_account(&self, address: &Pubkey) -> bool {
        self.accounts.remove(address).is_some()
    }

    /// Existence check that does not count as a client read.
    pub fn contains(&self, address: &Pubkey) -> bool {
        self.accounts.contains_key(address)
    }

    /// The next submitted transaction executes and fails with `reason`.
    /// Queued failures apply in order.
    pub fn fail_next_transaction(&self, reason: impl Into<String>) {
        self.scripted_failures.lock().push_back(reason.into());
    }

    pub fn submitted(&self) -> Vec<SignedTransaction> {
        self.submitted.lock().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submitted.lock().len()
    }

    /// Number of account queries served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn apply(&self, tx: &SignedTransaction) {
        for ix in &tx.message.instructions {
            if ix.kind != InstructionKind::AuthorizeDecryption {
                continue;
            }
            // Accounts: investor, allowed, allowance, ...; data: disc ‖ handle.
            let (Some(allowed), Some(allowance)) = (ix.accounts.get(1), ix.accounts.get(2)) else {
                continue;
            };
            let Some(handle) = ix.data.get(8..8 + HANDLE_LENGTH) else {
                continue;
            };
            let mut data = handle.to_vec();
            data.extend_from_slice(allowed.pubkey.as_bytes());
            debug!(allowance = %allowance.pubkey, allowed = %allowed.pubkey, "allowance created");
            self.insert_account(allowance.pubkey, self.decryption_program_id, data);
        }
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn account_exists(&self, address: &Pubkey) -> Result<bool, LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.contains_key(address))
    }

    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.get(address).map(|a| a.data.clone()))
    }

    async fn get_program_accounts(
        &self,
        program: &Pubkey,
        filters: &[MemcmpFilter],
    ) -> Result<Vec<ProgramAccount>, LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut found: Vec<ProgramAccount> = self
            .accounts
            .iter()
            .filter(|entry| entry.owner == *program)
            .filter(|entry| filters.iter().all(|f| f.matches(&entry.data)))
            .map(|entry| ProgramAccount {
                address: *entry.key(),
                data: entry.data.clone(),
            })
            .collect();
        found.sort_by_key(|a| a.address);
        Ok(found)
    }

    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<TxSignature, LedgerError> {
        if !tx.verify() {
            return Err(LedgerError::Rejected("signature verification failed".into()));
        }
        let id = tx.id();
        if self.outcomes.contains_key(&id) {
            return Err(LedgerError::Rejected(format!("duplicate transaction {id}")));
        }

        let scripted = self.scripted_failures.lock().pop_front();
        let outcome = match scripted {
            Some(reason) => Confirmation::Failed(reason),
            None => {
                self.apply(tx);
                Confirmation::Confirmed
            }
        };
        debug!(signature = %id, ?outcome, "transaction processed");

        self.outcomes.insert(id, outcome);
        self.submitted.lock().push(tx.clone());
        Ok(id)
    }

    async fn await_confirmation(
        &self,
        signature: &TxSignature,
    ) -> Result<Confirmation, LedgerError> {
        self.outcomes
            .get(signature)
            .map(|o| o.clone())
            .ok_or(LedgerError::UnknownTransaction(*signature))
    }
}

// ---------------------------------------------------------------------------
// InMemoryDecryptionService
// ---------------------------------------------------------------------------

/// Message returned when the requester has no allowance.
pub const NOT_ALLOWED_MESSAGE: &str = "Address is not allowed to decrypt this handle";

/// A decryption service backed by a plaintext table and an
/// [`InMemoryLedger`]'s allowance accounts.
#[derive(Debug)]
pub struct InMemoryDecryptionService {
    ledger: Arc<InMemoryLedger>,
    deriver: AddressDeriver,
    plaintexts: DashMap<Handle, u128>,
    pending_denials: AtomicUsize,
    calls: AtomicUsize,
}

impl InMemoryDecryptionService {
    pub fn new(ledger: Arc<InMemoryLedger>, config: &ClientConfig) -> Self {
        Self {
            ledger,
            deriver: AddressDeriver::from_config(config),
            plaintexts: DashMap::new(),
            pending_denials: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Registers the value behind `handle`.
    pub fn insert(&self, handle: Handle, plaintext: u128) {
        self.plaintexts.insert(handle, plaintext);
    }

    /// The next `n` requests are denied with a 403 even if the allowance
    /// exists, the way the real service behaves while it catches up with
    /// the ledger.
    pub fn deny_next(&self, n: usize) {
        self.pending_denials.fetch_add(n, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_denial(&self) -> bool {
        self.pending_denials
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DecryptionService for InMemoryDecryptionService {
    async fn decrypt(
        &self,
        handles: &[String],
        signer: &dyn CanSignMessage,
    ) -> Result<DecryptResponse, DecryptionServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let challenge = decryption_challenge(handles);
        let signature = signer.sign_message(&challenge).await?;
        let requester = signer.address();
        let verified = VerifyingKey::from_bytes(requester.as_bytes())
            .map(|key| key.verify(&challenge, &signature).is_ok())
            .unwrap_or(false);
        if !verified {
            return Err(DecryptionServiceError::service(Some(401), "invalid signature"));
        }

        if self.take_denial() {
            return Err(DecryptionServiceError::service(Some(403), NOT_ALLOWED_MESSAGE));
        }

        let mut plaintexts = Vec::with_capacity(handles.len());
        for raw in handles {
            let handle = Handle::parse(raw).map_err(|e| {
                DecryptionServiceError::service(Some(400), format!("bad handle {raw}: {e}"))
            })?;
            let allowance = self
                .deriver
                .allowance(handle, &requester)
                .map_err(|e| DecryptionServiceError::service(Some(500), e.to_string()))?;
            if !self.ledger.contains(&allowance.address) {
                return Err(DecryptionServiceError::service(Some(403), NOT_ALLOWED_MESSAGE));
            }
            let value = self.plaintexts.get(&handle).map(|v| *v).ok_or_else(|| {
                DecryptionServiceError::service(Some(404), format!("unknown handle {raw}"))
            })?;
            plaintexts.push(value.to_string());
        }

        Ok(DecryptResponse { plaintexts })
    }
}
