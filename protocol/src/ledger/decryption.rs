//! The attested-decryption service contract.
//!
//! The service holds the co-processor's keys. Given decimal handles and a
//! signature proving who is asking, it checks the on-ledger allowance
//! records and returns plaintexts as decimal strings. Everything past that
//! boundary is a black box.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::wallet::{CanSignMessage, WalletError};

/// Plaintexts in the same order as the requested handles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptResponse {
    pub plaintexts: Vec<String>,
}

/// Errors from a decryption request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptionServiceError {
    /// The wallet refused or failed to sign the identity proof.
    #[error("wallet: {0}")]
    Wallet(#[from] WalletError),

    /// The service answered with an error. `status` is present only when
    /// the transport exposes one; `message` is free text.
    #[error("{message}")]
    Service {
        status: Option<u16>,
        message: String,
    },
}

impl DecryptionServiceError {
    pub fn service(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Service {
            status,
            message: message.into(),
        }
    }
}

/// Remote decryption.
#[async_trait]
pub trait DecryptionService: Send + Sync {
    /// Decrypts `handles` (canonical decimal strings) on behalf of `signer`.
    /// The implementation asks `signer` for a signature over
    /// [`decryption_challenge`] or its own equivalent.
    async fn decrypt(
        &self,
        handles: &[String],
        signer: &dyn CanSignMessage,
    ) -> Result<DecryptResponse, DecryptionServiceError>;
}

/// The message a wallet signs to prove its identity for one request.
pub fn decryption_challenge(handles: &[String]) -> Vec<u8> {
    format!("donatrade:decrypt:{}", handles.join(",")).into_bytes()
}
