//! # Reveal Protocol
//!
//! Seeing the number behind a handle takes two independent proofs:
//!
//! 1. **On-ledger authorization.** An allowance account, derived from the
//!    handle and the requester under the decryption program, must exist.
//!    If it doesn't, the requester signs an `authorize_decryption`
//!    transaction and we wait for it to confirm.
//! 2. **Identity proof.** The requester signs a challenge for the
//!    attested-decryption service, which checks the allowance and returns
//!    the plaintext.
//!
//! The service can lag the ledger, so a permission-denied answer right
//! after authorization is retried once by re-authorizing. A second denial
//! fails the reveal.
//!
//! ## Layout
//!
//! - [`state`]: [`RevealState`], [`DisplayMode`], [`RevealEvent`].
//! - [`error`]: [`RevealError`] and the permission-denied classifier.
//! - [`session`]: [`RevealSession`], the per-user cache and event channel.
//! - [`coordinator`]: [`RevealCoordinator`], which drives the flow.

pub mod coordinator;
pub mod error;
pub mod session;
pub mod state;

pub use coordinator::RevealCoordinator;
pub use error::{classify_service_error, is_permission_denied, RevealError};
pub use session::RevealSession;
pub use state::{DisplayMode, RevealEvent, RevealState};
