//! A wallet backed by a local Ed25519 keypair.
//!
//! Used by the CLI, by tests, and by anything running without a human in
//! the loop. It never rejects a request.
//!
//! Key bytes are never logged and `KeypairWallet` does not implement
//! `Serialize`. Exporting a secret should be a deliberate call to
//! [`KeypairWallet::secret_hex`], not a side effect of dumping a struct.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use std::fmt;

use super::{CanSignMessage, CanSignTransaction, Wallet, WalletError, WalletIdentity};
use crate::address::Pubkey;
use crate::transaction::{SignedTransaction, TxSignature, UnsignedTransaction};

pub struct KeypairWallet {
    signing_key: SigningKey,
}

impl KeypairWallet {
    /// Fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed. Weak seed, weak key.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Loads a hex-encoded 32-byte secret.
    pub fn from_hex(hex_str: &str) -> Result<Self, WalletError> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|_| WalletError::Signing("secret key is not valid hex".into()))?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| WalletError::Signing("secret key must be 32 bytes".into()))?;
        Ok(Self::from_seed(&seed))
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Synchronous signature, for callers that are not async.
    pub fn sign_bytes(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Signs a transaction without going through the async trait.
    pub fn sign(&self, tx: UnsignedTransaction) -> SignedTransaction {
        let signature = self.signing_key.sign(&tx.message_bytes());
        SignedTransaction::new(tx, TxSignature::new(signature.to_bytes()))
    }
}

impl fmt::Debug for KeypairWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeypairWallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl WalletIdentity for KeypairWallet {
    fn address(&self) -> Pubkey {
        Pubkey::new(self.signing_key.verifying_key().to_bytes())
    }
}

#[async_trait]
impl CanSignMessage for KeypairWallet {
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError> {
        Ok(self.sign_bytes(message))
    }
}

#[async_trait]
impl CanSignTransaction for KeypairWallet {
    async fn sign_transaction(
        &self,
        tx: UnsignedTransaction,
    ) -> Result<SignedTransaction, WalletError> {
        if tx.fee_payer != self.address() {
            return Err(WalletError::Signing(format!(
                "fee payer {} is not this wallet",
                tx.fee_payer
            )));
        }
        Ok(self.sign(tx))
    }
}

impl Wallet for KeypairWallet {
    fn as_message_signer(&self) -> Option<&dyn CanSignMessage> {
        Some(self)
    }

    fn as_transaction_signer(&self) -> Option<&dyn CanSignTransaction> {
        Some(self)
    }
}
