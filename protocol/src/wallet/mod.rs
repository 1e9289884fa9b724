//! # Wallet Capabilities
//!
//! A connected wallet can do some subset of: tell us its address, sign an
//! arbitrary message, sign a transaction. Browser and hardware wallets vary
//! in which of those they expose, and every signing call may sit waiting on
//! a human who can click "reject".
//!
//! The capabilities are separate traits so callers can check for them up
//! front and fail fast, instead of discovering halfway through a reveal
//! that the wallet cannot sign transactions:
//!
//! - [`WalletIdentity`]: the address. Every wallet has one.
//! - [`CanSignMessage`]: proves identity to the decryption service.
//! - [`CanSignTransaction`]: authorizes ledger state changes.
//! - [`Wallet`]: the connected wallet, queried for the two above.
//!
//! [`KeypairWallet`] implements all of them over a local Ed25519 key.

pub mod keypair;

use async_trait::async_trait;
use ed25519_dalek::Signature;
use thiserror::Error;

use crate::address::Pubkey;
use crate::transaction::{SignedTransaction, UnsignedTransaction};

pub use keypair::KeypairWallet;

/// Errors from a wallet signing request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The user declined the request.
    #[error("user rejected")]
    UserRejected,

    /// The wallet cannot perform this kind of signature at all.
    #[error("wallet does not support {0}")]
    Unsupported(&'static str),

    /// Anything else the wallet reports.
    #[error("signing failed: {0}")]
    Signing(String),
}

/// A wallet address.
pub trait WalletIdentity: Send + Sync {
    fn address(&self) -> Pubkey;
}

/// Signs arbitrary bytes. May suspend until the user responds.
#[async_trait]
pub trait CanSignMessage: WalletIdentity {
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError>;
}

/// Signs transactions. May suspend until the user responds.
#[async_trait]
pub trait CanSignTransaction: WalletIdentity {
    async fn sign_transaction(
        &self,
        tx: UnsignedTransaction,
    ) -> Result<SignedTransaction, WalletError>;
}

/// A connected wallet, queried for its capabilities.
pub trait Wallet: WalletIdentity {
    fn as_message_signer(&self) -> Option<&dyn CanSignMessage>;
    fn as_transaction_signer(&self) -> Option<&dyn CanSignTransaction>;
}
