//! Reveal states, display mode and progress events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::Pubkey;
use crate::handle::Handle;

/// Where one (handle, identity) pair stands in the reveal protocol.
///
/// ```text
/// Hidden ─► CheckingAllowance ─┬─────────────────► Decrypting ─► Revealed
///                              └─► Authorizing ─►─┘    │  ▲
///                                       ▲              │  │
///                                       └─ denied once ┘  │
///                                          (confirmed) ───┘
/// any step ─► Failed(reason) ─ retry ─► Hidden
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum RevealState {
    Hidden,
    CheckingAllowance,
    Authorizing,
    Decrypting,
    /// Terminal; the plaintext is cached for the session.
    Revealed(#[serde(with = "decimal")] u128),
    /// Terminal until the caller retries.
    Failed(String),
}

impl RevealState {
    /// True while a flow owns the pair.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::CheckingAllowance | Self::Authorizing | Self::Decrypting
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revealed(_) | Self::Failed(_))
    }

    pub fn plaintext(&self) -> Option<u128> {
        match self {
            Self::Revealed(v) => Some(*v),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::CheckingAllowance => "checking_allowance",
            Self::Authorizing => "authorizing",
            Self::Decrypting => "decrypting",
            Self::Revealed(_) => "revealed",
            Self::Failed(_) => "failed",
        }
    }
}

impl Default for RevealState {
    fn default() -> Self {
        Self::Hidden
    }
}

impl fmt::Display for RevealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Revealed(v) => write!(f, "revealed({v})"),
            Self::Failed(reason) => write!(f, "failed({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Plaintexts travel as decimal strings, like handles.
mod decimal {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let text = String::deserialize(d)?;
        text.parse().map_err(D::Error::custom)
    }
}

/// Client-side visibility of a revealed value. Toggling it never touches
/// the network and never discards the cached plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Shown,
    Masked,
}

/// One state transition, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealEvent {
    pub handle: Handle,
    pub identity: Pubkey,
    pub state: RevealState,
    pub at: DateTime<Utc>,
}

impl RevealEvent {
    pub fn now(handle: Handle, identity: Pubkey, state: RevealState) -> Self {
        Self {
            handle,
            identity,
            state,
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_states() {
        assert!(!RevealState::Hidden.is_in_flight());
        assert!(RevealState::CheckingAllowance.is_in_flight());
        assert!(RevealState::Authorizing.is_in_flight());
        assert!(RevealState::Decrypting.is_in_flight());
        assert!(!RevealState::Revealed(1).is_in_flight());
        assert!(!RevealState::Failed("x".into()).is_in_flight());
    }

    #[test]
    fn display() {
        assert_eq!(RevealState::Decrypting.to_string(), "decrypting");
        assert_eq!(RevealState::Revealed(5).to_string(), "revealed(5)");
        assert_eq!(
            RevealState::Failed("user rejected".into()).to_string(),
            "failed(user rejected)"
        );
    }

    #[test]
    fn event_serializes_with_tagged_state() {
        let event = RevealEvent::now(
            Handle::new(1_000_000),
            Pubkey::new([1u8; 32]),
            RevealState::Revealed(42),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["handle"], "1000000");
        assert_eq!(json["state"]["state"], "revealed");
        assert_eq!(json["state"]["detail"], "42");

        let back: RevealEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
