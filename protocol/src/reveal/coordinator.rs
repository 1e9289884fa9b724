//! The authorize-then-decrypt flow.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::error::{classify_service_error, RevealError};
use super::session::{Begin, RevealSession, SharedCell};
use super::state::{DisplayMode, RevealEvent, RevealState};
use crate::address::{AddressDeriver, Pubkey};
use crate::config::{ClientConfig, MAX_PERMISSION_RETRIES};
use crate::handle::Handle;
use crate::ledger::{Confirmation, DecryptionService, Ledger};
use crate::transaction::{InstructionBuilder, TransactionBuilder};
use crate::wallet::{CanSignMessage, Wallet};

/// Drives reveals for one user session.
///
/// Holds the ledger and decryption-service clients plus the
/// [`RevealSession`] that caches results. Distinct (handle, identity)
/// pairs run independently; a pair already in flight is never started
/// twice.
pub struct RevealCoordinator {
    ledger: Arc<dyn Ledger>,
    decryption: Arc<dyn DecryptionService>,
    instructions: InstructionBuilder,
    session: RevealSession,
}

impl RevealCoordinator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        decryption: Arc<dyn DecryptionService>,
        config: ClientConfig,
    ) -> Self {
        Self {
            ledger,
            decryption,
            instructions: InstructionBuilder::new(config),
            session: RevealSession::new(),
        }
    }

    /// Replaces the session, e.g. to size the event channel.
    pub fn with_session(mut self, session: RevealSession) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> &RevealSession {
        &self.session
    }

    fn deriver(&self) -> &AddressDeriver {
        self.instructions.deriver()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RevealEvent> {
        self.session.subscribe()
    }

    pub fn state(&self, handle: Handle, identity: &Pubkey) -> RevealState {
        self.session.state(handle, identity)
    }

    pub fn display(&self, handle: Handle, identity: &Pubkey) -> DisplayMode {
        self.session.display(handle, identity)
    }

    pub fn hide(&self, handle: Handle, identity: &Pubkey) -> bool {
        self.session.hide(handle, identity)
    }

    pub fn show(&self, handle: Handle, identity: &Pubkey) -> bool {
        self.session.show(handle, identity)
    }

    pub fn reset(&self, handle: Handle, identity: &Pubkey) -> bool {
        self.session.reset(handle, identity)
    }

    /// Reveals `handle` for `wallet`'s identity and returns the resulting
    /// state.
    ///
    /// - `Hidden`: runs the full flow, returning `Revealed` or `Failed`.
    /// - `Revealed`: returns the cached value with no network calls.
    /// - In flight: returns the current state; the running flow continues.
    /// - `Failed`: returns the failure; use [`retry`](Self::retry).
    ///
    /// A wallet whose address differs from the session's active identity
    /// switches the session, dropping every cached plaintext first.
    pub async fn reveal(&self, wallet: &dyn Wallet, handle: Handle) -> RevealState {
        let identity = wallet.address();
        self.session.switch_identity(Some(identity));

        let cell = match self.session.begin(handle, &identity) {
            Begin::Started(cell) => cell,
            Begin::Existing(state) => return state,
        };

        let flow_id = Uuid::new_v4();
        let span = info_span!("reveal", %flow_id, %handle, %identity);
        let outcome = self
            .run(wallet, handle, identity, &cell)
            .instrument(span.clone())
            .await;

        let final_state = match outcome {
            Ok(value) => {
                span.in_scope(|| info!("revealed"));
                RevealState::Revealed(value)
            }
            Err(e) => {
                span.in_scope(|| warn!(error = %e, "reveal failed"));
                RevealState::Failed(e.to_string())
            }
        };
        self.session
            .transition(handle, &identity, &cell, final_state.clone());
        final_state
    }

    /// Resets a failed (or revealed) pair and reveals again.
    pub async fn retry(&self, wallet: &dyn Wallet, handle: Handle) -> RevealState {
        self.session.reset(handle, &wallet.address());
        self.reveal(wallet, handle).await
    }

    /// Reveals several handles for one wallet concurrently. Results are in
    /// input order.
    pub async fn reveal_many(
        &self,
        wallet: &dyn Wallet,
        handles: &[Handle],
    ) -> Vec<(Handle, RevealState)> {
        let flows = handles.iter().map(|&handle| async move {
            (handle, self.reveal(wallet, handle).await)
        });
        join_all(flows).await
    }

    async fn run(
        &self,
        wallet: &dyn Wallet,
        handle: Handle,
        identity: Pubkey,
        cell: &SharedCell,
    ) -> Result<u128, RevealError> {
        let signer = wallet
            .as_message_signer()
            .ok_or_else(|| RevealError::Authorization("wallet cannot sign messages".into()))?;
        if handle.is_zero() {
            return Err(RevealError::Encoding("zero handle has no value".into()));
        }

        let allowance = self.deriver().allowance(handle, &identity)?;
        if self.ledger.account_exists(&allowance.address).await? {
            info!(allowance = %allowance.address, "allowance present");
        } else {
            self.authorize(wallet, handle, identity, cell).await?;
        }

        let mut denials = 0;
        loop {
            self.session
                .transition(handle, &identity, cell, RevealState::Decrypting);
            match self.decrypt(handle, signer).await {
                Ok(value) => return Ok(value),
                Err(RevealError::PermissionPending(reason)) if denials < MAX_PERMISSION_RETRIES => {
                    denials += 1;
                    warn!(%reason, attempt = denials, "decryption denied, re-authorizing");
                    self.authorize(wallet, handle, identity, cell).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Submits `authorize_decryption` and waits for it to confirm.
    async fn authorize(
        &self,
        wallet: &dyn Wallet,
        handle: Handle,
        identity: Pubkey,
        cell: &SharedCell,
    ) -> Result<(), RevealError> {
        self.session
            .transition(handle, &identity, cell, RevealState::Authorizing);
        let signer = wallet
            .as_transaction_signer()
            .ok_or_else(|| RevealError::Authorization("wallet cannot sign transactions".into()))?;

        let ix = self
            .instructions
            .authorize_decryption(&identity, handle, &identity)?;
        let tx = TransactionBuilder::new(identity).instruction(ix).build();
        let signed = signer.sign_transaction(tx).await?;

        let signature = self
            .ledger
            .submit_transaction(&signed)
            .await
            .map_err(|e| RevealError::Authorization(e.to_string()))?;
        info!(%signature, "authorization submitted");

        match self
            .ledger
            .await_confirmation(&signature)
            .await
            .map_err(|e| RevealError::Authorization(e.to_string()))?
        {
            Confirmation::Confirmed => Ok(()),
            Confirmation::Failed(reason) => Err(RevealError::Authorization(reason)),
        }
    }

    async fn decrypt(&self, handle: Handle, signer: &dyn CanSignMessage) -> Result<u128, RevealError> {
        let response = self
            .decryption
            .decrypt(&[handle.to_string()], signer)
            .await
            .map_err(classify_service_error)?;
        let plaintext = response
            .plaintexts
            .first()
            .ok_or_else(|| RevealError::Decryption("service returned no plaintext".into()))?;
        plaintext
            .trim()
            .parse::<u128>()
            .map_err(|_| RevealError::Decryption(format!("malformed plaintext {plaintext:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{InMemoryDecryptionService, InMemoryLedger};
    use crate::wallet::{KeypairWallet, WalletIdentity};

    struct Harness {
        ledger: Arc<InMemoryLedger>,
        service: Arc<InMemoryDecryptionService>,
        coordinator: RevealCoordinator,
    }

    fn harness() -> Harness {
        let config = ClientConfig::default();
        let ledger = Arc::new(InMemoryLedger::new(&config));
        let service = Arc::new(InMemoryDecryptionService::new(ledger.clone(), &config));
        let coordinator = RevealCoordinator::new(ledger.clone(), service.clone(), config);
        Harness {
            ledger,
            service,
            coordinator,
        }
    }

    #[tokio::test]
    async fn zero_handle_fails_without_network() {
        let h = harness();
        let wallet = KeypairWallet::from_seed(&[1u8; 32]);
        let state = h.coordinator.reveal(&wallet, Handle::ZERO).await;
        assert!(matches!(state, RevealState::Failed(ref r) if r.contains("zero handle")));
        assert_eq!(h.ledger.read_count(), 0);
        assert_eq!(h.service.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_is_sticky_until_retry() {
        let h = harness();
        let wallet = KeypairWallet::from_seed(&[1u8; 32]);
        let handle = Handle::new(55);

        // No plaintext registered: the service answers 404.
        let first = h.coordinator.reveal(&wallet, handle).await;
        assert!(matches!(first, RevealState::Failed(_)));
        let calls = h.service.call_count();

        assert_eq!(h.coordinator.reveal(&wallet, handle).await, first);
        assert_eq!(h.service.call_count(), calls);

        h.service.insert(handle, 8);
        assert_eq!(
            h.coordinator.retry(&wallet, handle).await,
            RevealState::Revealed(8)
        );
    }

    #[tokio::test]
    async fn malformed_plaintext_is_a_decryption_error() {
        struct Garbage;

        #[async_trait::async_trait]
        impl DecryptionService for Garbage {
            async fn decrypt(
                &self,
                _handles: &[String],
                _signer: &dyn CanSignMessage,
            ) -> Result<crate::ledger::DecryptResponse, crate::ledger::DecryptionServiceError>
            {
                Ok(crate::ledger::DecryptResponse {
                    plaintexts: vec!["12abc".into()],
                })
            }
        }

        let config = ClientConfig::default();
        let ledger = Arc::new(InMemoryLedger::new(&config));
        let coordinator = RevealCoordinator::new(ledger, Arc::new(Garbage), config);
        let wallet = KeypairWallet::from_seed(&[2u8; 32]);

        let state = coordinator.reveal(&wallet, Handle::new(3)).await;
        assert_eq!(
            state,
            RevealState::Failed("decryption failed: malformed plaintext \"12abc\"".into())
        );
        assert_eq!(
            coordinator.state(Handle::new(3), &wallet.address()),
            state
        );
    }
}
