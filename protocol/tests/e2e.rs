//! End-to-end reveal scenarios.
//!
//! Each test builds its own in-memory ledger, decryption service and
//! coordinator, then drives reveals the way a portfolio screen would:
//! decode accounts, pick out handles, reveal them. The ledger and service
//! counters prove which steps touched the network.

use std::sync::Arc;

use async_trait::async_trait;
use ed25519_dalek::Signature;
use tokio::sync::{broadcast, Notify};

use donatrade_protocol::accounts::{fixtures, AccountQuery, InvestorVault, PositionAccount};
use donatrade_protocol::address::{AddressDeriver, Pubkey};
use donatrade_protocol::config::ClientConfig;
use donatrade_protocol::handle::{Handle, HandleInput};
use donatrade_protocol::ledger::{InMemoryDecryptionService, InMemoryLedger};
use donatrade_protocol::reveal::{DisplayMode, RevealCoordinator, RevealEvent, RevealState};
use donatrade_protocol::transaction::{
    InstructionKind, SignedTransaction, UnsignedTransaction,
};
use donatrade_protocol::wallet::{
    CanSignMessage, CanSignTransaction, KeypairWallet, Wallet, WalletError, WalletIdentity,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

struct World {
    config: ClientConfig,
    ledger: Arc<InMemoryLedger>,
    service: Arc<InMemoryDecryptionService>,
    coordinator: RevealCoordinator,
    deriver: AddressDeriver,
}

fn world() -> World {
    let config = ClientConfig::default();
    let ledger = Arc::new(InMemoryLedger::new(&config));
    let service = Arc::new(InMemoryDecryptionService::new(ledger.clone(), &config));
    let coordinator = RevealCoordinator::new(ledger.clone(), service.clone(), config.clone());
    World {
        deriver: AddressDeriver::from_config(&config),
        config,
        ledger,
        service,
        coordinator,
    }
}

impl World {
    /// Creates the allowance account directly, as if authorized earlier.
    fn grant(&self, handle: Handle, identity: &Pubkey) {
        let allowance = self.deriver.allowance(handle, identity).unwrap();
        let mut data = handle.to_le_bytes16().to_vec();
        data.extend_from_slice(identity.as_bytes());
        self.ledger
            .insert_account(allowance.address, self.config.decryption_program_id, data);
    }

    fn has_allowance(&self, handle: Handle, identity: &Pubkey) -> bool {
        let allowance = self.deriver.allowance(handle, identity).unwrap();
        self.ledger.contains(&allowance.address)
    }

    fn counters(&self) -> (usize, usize, usize) {
        (
            self.ledger.read_count(),
            self.ledger.submission_count(),
            self.service.call_count(),
        )
    }
}

fn investor() -> KeypairWallet {
    KeypairWallet::from_seed(&[1u8; 32])
}

fn drain(rx: &mut broadcast::Receiver<RevealEvent>) -> Vec<RevealState> {
    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        states.push(event.state);
    }
    states
}

/// A wallet with configurable capabilities and refusals, optionally parking
/// every message signature until a gate is opened.
struct TestWallet {
    inner: KeypairWallet,
    signs_messages: bool,
    signs_transactions: bool,
    rejects_messages: bool,
    rejects_transactions: bool,
    gate: Option<Arc<Notify>>,
}

impl TestWallet {
    fn new(inner: KeypairWallet) -> Self {
        Self {
            inner,
            signs_messages: true,
            signs_transactions: true,
            rejects_messages: false,
            rejects_transactions: false,
            gate: None,
        }
    }
}

impl WalletIdentity for TestWallet {
    fn address(&self) -> Pubkey {
        self.inner.address()
    }
}

#[async_trait]
impl CanSignMessage for TestWallet {
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.rejects_messages {
            return Err(WalletError::UserRejected);
        }
        self.inner.sign_message(message).await
    }
}

#[async_trait]
impl CanSignTransaction for TestWallet {
    async fn sign_transaction(
        &self,
        tx: UnsignedTransaction,
    ) -> Result<SignedTransaction, WalletError> {
        if self.rejects_transactions {
            return Err(WalletError::UserRejected);
        }
        self.inner.sign_transaction(tx).await
    }
}

impl Wallet for TestWallet {
    fn as_message_signer(&self) -> Option<&dyn CanSignMessage> {
        if self.signs_messages {
            Some(self)
        } else {
            None
        }
    }

    fn as_transaction_signer(&self) -> Option<&dyn CanSignTransaction> {
        if self.signs_transactions {
            Some(self)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Full flow and caching
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reveal_without_allowance_walks_every_state() {
    let w = world();
    let wallet = investor();
    let handle = Handle::new(1_000_000);
    w.service.insert(handle, 250_000_000);
    let mut rx = w.coordinator.subscribe();

    assert_eq!(w.coordinator.state(handle, &wallet.address()), RevealState::Hidden);
    let state = w.coordinator.reveal(&wallet, handle).await;

    assert_eq!(state, RevealState::Revealed(250_000_000));
    assert_eq!(
        drain(&mut rx),
        vec![
            RevealState::CheckingAllowance,
            RevealState::Authorizing,
            RevealState::Decrypting,
            RevealState::Revealed(250_000_000),
        ]
    );

    let submitted = w.ledger.submitted();
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0]
        .message
        .contains(InstructionKind::AuthorizeDecryption));
    assert!(w.has_allowance(handle, &wallet.address()));
}

#[tokio::test]
async fn second_reveal_is_served_from_cache() {
    let w = world();
    let wallet = investor();
    let handle = Handle::new(1_000_000);
    w.service.insert(handle, 42);
    w.coordinator.reveal(&wallet, handle).await;

    let before = w.counters();
    let mut rx = w.coordinator.subscribe();
    let again = w.coordinator.reveal(&wallet, handle).await;

    assert_eq!(again, RevealState::Revealed(42));
    assert_eq!(w.counters(), before);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn existing_allowance_skips_authorization() {
    let w = world();
    let wallet = investor();
    let handle = Handle::new(77);
    w.grant(handle, &wallet.address());
    w.service.insert(handle, 5);
    let mut rx = w.coordinator.subscribe();

    assert_eq!(
        w.coordinator.reveal(&wallet, handle).await,
        RevealState::Revealed(5)
    );
    assert_eq!(w.ledger.submission_count(), 0);
    assert_eq!(
        drain(&mut rx),
        vec![
            RevealState::CheckingAllowance,
            RevealState::Decrypting,
            RevealState::Revealed(5),
        ]
    );
}

// ---------------------------------------------------------------------------
// Permission denied
// ---------------------------------------------------------------------------

#[tokio::test]
async fn denied_once_reauthorizes_exactly_once() {
    let w = world();
    let wallet = investor();
    let handle = Handle::new(1_000_000);
    w.grant(handle, &wallet.address());
    w.service.insert(handle, 9_000);
    w.service.deny_next(1);
    let mut rx = w.coordinator.subscribe();

    let state = w.coordinator.reveal(&wallet, handle).await;

    assert_eq!(state, RevealState::Revealed(9_000));
    assert_eq!(w.ledger.submission_count(), 1);
    assert_eq!(w.service.call_count(), 2);
    assert_eq!(
        drain(&mut rx),
        vec![
            RevealState::CheckingAllowance,
            RevealState::Decrypting,
            RevealState::Authorizing,
            RevealState::Decrypting,
            RevealState::Revealed(9_000),
        ]
    );
}

#[tokio::test]
async fn denied_twice_fails() {
    let w = world();
    let wallet = investor();
    let handle = Handle::new(1_000_000);
    w.grant(handle, &wallet.address());
    w.service.insert(handle, 9_000);
    w.service.deny_next(2);

    let state = w.coordinator.reveal(&wallet, handle).await;

    match state {
        RevealState::Failed(reason) => assert!(reason.contains("not allowed"), "{reason}"),
        other => panic!("expected failure, got {other}"),
    }
    assert_eq!(w.ledger.submission_count(), 1);
    assert_eq!(w.service.call_count(), 2);
}

#[tokio::test]
async fn persistent_denial_is_bounded() {
    let w = world();
    let wallet = investor();
    let handle = Handle::new(31337);
    w.service.insert(handle, 1);
    w.service.deny_next(10);

    let state = w.coordinator.reveal(&wallet, handle).await;

    assert!(matches!(state, RevealState::Failed(_)));
    // Initial authorization plus one recovery attempt.
    assert_eq!(w.ledger.submission_count(), 2);
    assert_eq!(w.service.call_count(), 2);
}

// ---------------------------------------------------------------------------
// Authorization failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_authorization_then_retry() {
    let w = world();
    let wallet = investor();
    let handle = Handle::new(500);
    w.service.insert(handle, 12);
    w.ledger.fail_next_transaction("custom program error: 0x1");

    let state = w.coordinator.reveal(&wallet, handle).await;
    assert_eq!(
        state,
        RevealState::Failed("authorization failed: custom program error: 0x1".into())
    );
    assert_eq!(w.service.call_count(), 0);
    assert!(!w.has_allowance(handle, &wallet.address()));

    // Failed is sticky.
    let before = w.counters();
    assert_eq!(w.coordinator.reveal(&wallet, handle).await, state);
    assert_eq!(w.counters(), before);

    assert_eq!(
        w.coordinator.retry(&wallet, handle).await,
        RevealState::Revealed(12)
    );
    assert_eq!(w.ledger.submission_count(), 2);
}

#[tokio::test]
async fn rejected_message_signature_is_not_retried() {
    let w = world();
    let mut wallet = TestWallet::new(investor());
    wallet.rejects_messages = true;
    let handle = Handle::new(1_000_000);
    w.grant(handle, &wallet.address());
    w.service.insert(handle, 1);

    let state = w.coordinator.reveal(&wallet, handle).await;

    assert_eq!(state, RevealState::Failed("user rejected".into()));
    assert_eq!(w.service.call_count(), 1);
    assert_eq!(w.ledger.submission_count(), 0);

    let before = w.counters();
    assert_eq!(w.coordinator.reveal(&wallet, handle).await, state);
    assert_eq!(w.counters(), before);
}

#[tokio::test]
async fn rejected_transaction_signature_fails() {
    let w = world();
    let mut wallet = TestWallet::new(investor());
    wallet.rejects_transactions = true;
    let handle = Handle::new(1_000_000);
    w.service.insert(handle, 1);

    let state = w.coordinator.reveal(&wallet, handle).await;

    assert_eq!(state, RevealState::Failed("user rejected".into()));
    assert_eq!(w.ledger.submission_count(), 0);
    assert_eq!(w.service.call_count(), 0);
}

#[tokio::test]
async fn missing_capabilities_fail_fast() {
    let w = world();
    let handle = Handle::new(1_000_000);
    w.service.insert(handle, 1);

    let mut no_messages = TestWallet::new(investor());
    no_messages.signs_messages = false;
    assert_eq!(
        w.coordinator.reveal(&no_messages, handle).await,
        RevealState::Failed("authorization failed: wallet cannot sign messages".into())
    );
    assert_eq!(w.counters(), (0, 0, 0));

    let mut no_transactions = TestWallet::new(KeypairWallet::from_seed(&[9u8; 32]));
    no_transactions.signs_transactions = false;
    assert_eq!(
        w.coordinator.reveal(&no_transactions, handle).await,
        RevealState::Failed("authorization failed: wallet cannot sign transactions".into())
    );
    assert_eq!(w.ledger.submission_count(), 0);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_reveal_of_same_pair_runs_one_flow() {
    let w = world();
    let gate = Arc::new(Notify::new());
    let mut wallet = TestWallet::new(investor());
    wallet.gate = Some(gate.clone());
    let handle = Handle::new(1_000_000);
    w.grant(handle, &wallet.address());
    w.service.insert(handle, 64);

    let first = w.coordinator.reveal(&wallet, handle);
    tokio::pin!(first);
    // Runs until the wallet parks on the gate.
    assert!(futures::poll!(first.as_mut()).is_pending());

    let second = w.coordinator.reveal(&wallet, handle).await;
    assert_eq!(second, RevealState::Decrypting);

    gate.notify_one();
    assert_eq!(first.await, RevealState::Revealed(64));
    assert_eq!(w.service.call_count(), 1);
}

#[tokio::test]
async fn distinct_handles_reveal_together() {
    let w = world();
    let wallet = investor();
    let handles = [Handle::new(10), Handle::new(20), Handle::new(30)];
    for (i, h) in handles.iter().enumerate() {
        w.service.insert(*h, (i as u128 + 1) * 100);
    }

    let results = w.coordinator.reveal_many(&wallet, &handles).await;

    assert_eq!(
        results,
        vec![
            (handles[0], RevealState::Revealed(100)),
            (handles[1], RevealState::Revealed(200)),
            (handles[2], RevealState::Revealed(300)),
        ]
    );
    assert_eq!(w.ledger.submission_count(), 3);
}

// ---------------------------------------------------------------------------
// Session scope
// ---------------------------------------------------------------------------

#[tokio::test]
async fn identity_switch_forgets_plaintexts() {
    let w = world();
    let alice = investor();
    let bob = KeypairWallet::from_seed(&[9u8; 32]);
    let handle = Handle::new(1_000_000);
    w.service.insert(handle, 7);

    assert_eq!(
        w.coordinator.reveal(&alice, handle).await,
        RevealState::Revealed(7)
    );
    assert_eq!(w.coordinator.reveal(&bob, handle).await, RevealState::Revealed(7));

    // Alice's cached value went away with the switch.
    assert_eq!(w.coordinator.state(handle, &alice.address()), RevealState::Hidden);
    assert_eq!(w.coordinator.session().active_identity(), Some(bob.address()));

    let calls = w.service.call_count();
    w.coordinator.reveal(&alice, handle).await;
    assert_eq!(w.service.call_count(), calls + 1);
}

#[tokio::test]
async fn hide_and_show_stay_local() {
    let w = world();
    let wallet = investor();
    let me = wallet.address();
    let handle = Handle::new(1_000_000);
    w.service.insert(handle, 3);
    w.coordinator.reveal(&wallet, handle).await;
    let before = w.counters();

    assert!(w.coordinator.hide(handle, &me));
    assert_eq!(w.coordinator.display(handle, &me), DisplayMode::Masked);
    assert_eq!(w.coordinator.session().visible_value(handle, &me), None);
    assert_eq!(w.coordinator.state(handle, &me), RevealState::Revealed(3));

    assert!(w.coordinator.show(handle, &me));
    assert_eq!(w.coordinator.session().visible_value(handle, &me), Some(3));

    // Revealing a masked value just unmasks it.
    w.coordinator.hide(handle, &me);
    assert_eq!(
        w.coordinator.reveal(&wallet, handle).await,
        RevealState::Revealed(3)
    );
    assert_eq!(w.coordinator.display(handle, &me), DisplayMode::Shown);

    assert_eq!(w.counters(), before);
}

// ---------------------------------------------------------------------------
// Accounts to plaintexts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn portfolio_from_decoded_accounts() {
    let w = world();
    let wallet = investor();
    let me = wallet.address();
    let program = w.config.program_id;

    let vault = InvestorVault {
        owner: me,
        cusd: Handle::new(1_000_000),
        bump: 253,
    };
    let vault_address = w.deriver.investor_vault(&me).unwrap().address;
    w.ledger
        .insert_account(vault_address, program, fixtures::investor_vault(&vault));
    w.service.insert(vault.cusd, 1_500_500_000);

    for (company_id, shares_handle, shares) in [(1u64, 2_000u128, 15u128), (42, 3_000, 250)] {
        let position = PositionAccount {
            owner: me,
            company_id,
            encrypted_shares: Handle::new(shares_handle),
            bump: 255,
        };
        let address = w.deriver.position(company_id, &me).unwrap().address;
        w.ledger
            .insert_account(address, program, fixtures::position(&position));
        w.service.insert(position.encrypted_shares, shares);
    }

    let query = AccountQuery::new(w.ledger.clone(), w.deriver.clone());
    let vault = query.investor_vault(&me).await.unwrap().unwrap();
    let mut positions = query.investor_positions(&me).await.unwrap();
    positions.sort_by_key(|p| p.company_id);

    let mut handles = vec![vault.cusd];
    handles.extend(positions.iter().map(|p| p.encrypted_shares));
    let revealed: Vec<Option<u128>> = w
        .coordinator
        .reveal_many(&wallet, &handles)
        .await
        .into_iter()
        .map(|(_, state)| state.plaintext())
        .collect();

    assert_eq!(revealed, vec![Some(1_500_500_000), Some(15), Some(250)]);
}

#[tokio::test]
async fn handle_from_rpc_json_reveals() {
    let w = world();
    let wallet = investor();
    let bytes = Handle::new(1_000_000).to_le_bytes16();
    let json = serde_json::json!({ "inner": bytes.to_vec() });
    let handle = Handle::from_input(&HandleInput::from_json(&json));
    assert_eq!(handle, Handle::new(1_000_000));

    w.service.insert(handle, 11);
    assert_eq!(
        w.coordinator.reveal(&wallet, handle).await,
        RevealState::Revealed(11)
    );
}

// ---------------------------------------------------------------------------
// Pinned values
// ---------------------------------------------------------------------------

#[test]
fn company_42_address_is_pinned() {
    let company = AddressDeriver::default().company(42).unwrap();
    assert_eq!(
        company.address.to_string(),
        "6hKFh16E51v1bGqPotk5zBS7tXa9QEo9U9iF4RhnffJW"
    );
    assert_eq!(company.bump, 255);
}

#[test]
fn investor_allowance_address_is_pinned() {
    let investor = Pubkey::new(std::array::from_fn(|i| (i + 1) as u8));
    let allowance = AddressDeriver::default()
        .allowance(Handle::new(1_000_000), &investor)
        .unwrap();
    assert_eq!(
        allowance.address.to_string(),
        "4GWrmPAMZytzYyeRX2J52EsrWk2sWtMftvZFsf4o85eJ"
    );
}
