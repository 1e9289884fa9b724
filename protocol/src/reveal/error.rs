//! Reveal failures and the translation from service errors.

use thiserror::Error;

use crate::address::DerivationError;
use crate::ledger::{DecryptionServiceError, LedgerError};
use crate::transaction::InstructionError;
use crate::wallet::WalletError;

/// Why a reveal flow stopped. The `Display` text becomes the reason carried
/// by [`RevealState::Failed`](super::RevealState::Failed).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RevealError {
    /// The user declined a wallet prompt. Never retried automatically.
    #[error("user rejected")]
    UserRejected,

    /// Missing wallet capability, or the authorization transaction failed.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The service says the identity may not decrypt the handle (yet).
    /// Recovered once by re-authorizing.
    #[error("permission pending: {0}")]
    PermissionPending(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("address derivation failed: {0}")]
    Derivation(#[from] DerivationError),

    #[error("invalid handle: {0}")]
    Encoding(String),

    #[error("ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),
}

impl From<WalletError> for RevealError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::UserRejected => Self::UserRejected,
            other => Self::Authorization(other.to_string()),
        }
    }
}

impl From<InstructionError> for RevealError {
    fn from(err: InstructionError) -> Self {
        match err {
            InstructionError::Derivation(e) => Self::Derivation(e),
            InstructionError::ZeroHandle => Self::Encoding(err.to_string()),
        }
    }
}

/// Status code the service uses for "not allowed".
const FORBIDDEN: u16 = 403;

/// Whether a service error means the allowance is missing or not yet
/// visible to the service.
///
/// A structured 403 is authoritative. Without one, the message text is
/// searched for "not allowed" or "403". That heuristic breaks if the
/// service rewords its errors; keep it in this one function.
pub fn is_permission_denied(err: &DecryptionServiceError) -> bool {
    match err {
        DecryptionServiceError::Wallet(_) => false,
        DecryptionServiceError::Service { status, message } => {
            if *status == Some(FORBIDDEN) {
                return true;
            }
            let message = message.to_ascii_lowercase();
            message.contains("not allowed") || message.contains("403")
        }
    }
}

/// Maps a decryption-service error into the reveal taxonomy.
pub fn classify_service_error(err: DecryptionServiceError) -> RevealError {
    if is_permission_denied(&err) {
        return RevealError::PermissionPending(err.to_string());
    }
    match err {
        DecryptionServiceError::Wallet(w) => w.into(),
        DecryptionServiceError::Service { message, .. } => RevealError::Decryption(message),
    }
}
