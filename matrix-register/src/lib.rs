// solana-matrix-register — client library registering participants in the
//                          referral matrix program
// © 2024 by Composable Foundation
// © 2025 by Michał Nazarewicz <mina86@mina86.com>
//
// This program is free software; you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation; either version 2 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program; if not, see <https://www.gnu.org/licenses/>.

//! Client library for registering a participant in the referral matrix
//! program.
//!
//! Registration is a single `register_with_sol_deposit` call.  Depending on
//! how many child slots of the referrer are already filled, the call may
//! recursively pay up to six ancestors and notify an external airdrop ledger
//! program.  All accounts those steps touch are passed to the matrix program
//! as *remaining accounts* whose order is a positional contract with the
//! program.
//!
//! Solana limits transaction size to at most 1232 bytes.  With over forty
//! accounts the call doesn’t fit unless the accounts are referenced through
//! an address lookup table.  This library therefore:
//!
//! 1. reads the referrer’s record and classifies the [`SlotVariant`],
//! 2. resolves the referrer’s upline chain and airdrop ledger accounts when
//!    the referrer’s matrix is about to complete,
//! 3. assembles the remaining accounts in the order the program expects,
//! 4. creates (or reuses a cached) address lookup table with all the
//!    accounts and waits for it to propagate and
//! 5. compiles, size-checks, signs, submits and confirms a v0 transaction.
//!
//! [`register::Registrar`] ties the steps together.  Every network and
//! storage dependency sits behind a trait ([`chain::Chain`],
//! [`lookup_table::TableService`], [`cache::TableCache`] and, with the
//! `relay` feature, [`relay::BundleRelay`]) so that each step can be driven
//! on its own.
//!
//! # Features
#![doc = document_features::document_features!()]

pub mod accounts;
pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lookup_table;
pub mod pda;
pub mod record;
pub mod referrer;
pub mod register;
#[cfg(feature = "relay")]
pub mod relay;
pub mod retry;
pub mod submit;
pub mod transaction;
pub mod upline;

#[cfg(test)]
mod testutil;

pub use config::Config;
pub use error::{Error, Result};
pub use record::{ParticipantRecord, SlotVariant};
pub use register::{Outcome, Registrar};
pub use submit::Confirmation;
