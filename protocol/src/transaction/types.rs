//! Core value types for trading-program transactions.
//!
//! Small, `Copy`-friendly vocabulary shared by the instruction builders,
//! the ledger interface, and the CLI.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{USDC_DECIMALS, USDC_DISPLAY_DECIMALS};
use crate::crypto::hash::{instruction_discriminator, DISCRIMINATOR_LENGTH};

// ---------------------------------------------------------------------------
// InstructionKind
// ---------------------------------------------------------------------------

/// Every trading-program instruction this client knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionKind {
    Deposit,
    Withdraw,
    BuyShares,
    SellShares,
    TransferShares,
    CreateOffer,
    ExecuteTrade,
    AuthorizeDecryption,
    SubmitApplication,
    ActivateCompany,
    UpdateOffering,
    WithdrawCompanyFunds,
}

impl InstructionKind {
    /// The program-side instruction name. Discriminators are derived from
    /// this, so it must match the deployed program exactly.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::BuyShares => "buy_shares",
            Self::SellShares => "sell_shares",
            Self::TransferShares => "transfer_shares",
            Self::CreateOffer => "create_offer",
            Self::ExecuteTrade => "execute_trade",
            Self::AuthorizeDecryption => "authorize_decryption",
            Self::SubmitApplication => "submit_application",
            Self::ActivateCompany => "activate_company",
            Self::UpdateOffering => "update_offering",
            Self::WithdrawCompanyFunds => "withdraw_company_funds",
        }
    }

    pub fn discriminator(&self) -> [u8; DISCRIMINATOR_LENGTH] {
        instruction_discriminator(self.name())
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// TxSignature
// ---------------------------------------------------------------------------

/// A 64-byte Ed25519 transaction signature. Doubles as the transaction id
/// on the ledger, rendered in base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxSignature([u8; 64]);

/// Errors parsing a [`TxSignature`] from text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureParseError {
    #[error("invalid base58 signature: {0}")]
    InvalidBase58(String),

    #[error("signature must be 64 bytes, got {0}")]
    InvalidLength(usize),
}

impl TxSignature {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Display for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxSignature({})", self)
    }
}

impl FromStr for TxSignature {
    type Err = SignatureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| SignatureParseError::InvalidBase58(e.to_string()))?;
        let bytes: [u8; 64] = raw
            .as_slice()
            .try_into()
            .map_err(|_| SignatureParseError::InvalidLength(raw.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for TxSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TxSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// UsdcAmount
// ---------------------------------------------------------------------------

/// Errors parsing a human-entered USDC amount.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountParseError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid character in amount: {0:?}")]
    InvalidDigit(char),

    #[error("amount has more than one decimal point")]
    MultipleDecimalPoints,

    #[error("amount exceeds u64 base units")]
    Overflow,
}

/// A USDC amount in base units (6 decimals). `1_000_000` is one dollar.
///
/// No floating point anywhere near money: both formatting and parsing work
/// on the digit strings directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UsdcAmount(pub u64);

fn parse_digits(digits: &str) -> Result<u64, AmountParseError> {
    let mut value: u64 = 0;
    for c in digits.chars() {
        let d = c.to_digit(10).ok_or(AmountParseError::InvalidDigit(c))?;
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(d)))
            .ok_or(AmountParseError::Overflow)?;
    }
    Ok(value)
}

impl UsdcAmount {
    const UNIT: u64 = 10u64.pow(USDC_DECIMALS);

    pub const fn base_units(self) -> u64 {
        self.0
    }

    /// `$<whole>.<cents>`; sub-cent digits are truncated, not rounded.
    pub fn format(self) -> String {
        let whole = self.0 / Self::UNIT;
        let fraction = format!(
            "{:0>width$}",
            self.0 % Self::UNIT,
            width = USDC_DECIMALS as usize
        );
        format!("${}.{}", whole, &fraction[..USDC_DISPLAY_DECIMALS])
    }

    /// Parses `"$1,234.56"`-style text. `$` and `,` are ignored; fractional
    /// digits beyond six are truncated and missing ones are zero.
    pub fn parse(text: &str) -> Result<Self, AmountParseError> {
        let cleaned: String = text
            .trim()
            .chars()
            .filter(|c| *c != '$' && *c != ',')
            .collect();
        if cleaned.is_empty() {
            return Err(AmountParseError::Empty);
        }

        let mut parts = cleaned.split('.');
        let whole = parts.next().unwrap_or_default();
        let fraction = parts.next().unwrap_or_default();
        if parts.next().is_some() {
            return Err(AmountParseError::MultipleDecimalPoints);
        }

        let whole = parse_digits(whole)?;
        let fraction: String = fraction
            .chars()
            .chain(std::iter::repeat('0'))
            .take(USDC_DECIMALS as usize)
            .collect();
        let fraction = parse_digits(&fraction)?;

        whole
            .checked_mul(Self::UNIT)
            .and_then(|v| v.checked_add(fraction))
            .map(Self)
            .ok_or(AmountParseError::Overflow)
    }
}

impl fmt::Display for UsdcAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for UsdcAmount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
