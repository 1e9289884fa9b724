//! # Program Accounts
//!
//! Decoders for the trading program's account types and the queries that
//! fetch them. Every encrypted quantity in these accounts surfaces as a
//! [`Handle`](crate::handle::Handle); turning one into a number is the
//! reveal coordinator's job, not this module's.
//!
//! | Account | Encrypted field |
//! |---|---|
//! | [`InvestorVault`] | `cusd` (USDC balance) |
//! | [`CompanyAccount`] | `cusd` (raised funds) |
//! | [`PositionAccount`] | `encrypted_shares` |
//! | [`OfferAccount`] | `escrowed_shares` |
//! | [`GlobalProgramVault`] | none |

pub mod layout;
pub mod query;

pub use layout::{
    fixtures, AccountDecodeError, CompanyAccount, GlobalProgramVault, InvestorVault, OfferAccount,
    PositionAccount, ProgramAccountLayout,
};
pub use query::{AccountQuery, AccountQueryError};
