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

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::TransactionError;

pub type Result<T = (), E = Error> = core::result::Result<T, E>;


/// Errors aborting a registration.
///
/// Upline accounts which can’t be read are excluded with a warning rather
/// than reported here.  Likewise, a transaction which wasn’t confirmed in
/// time is reported as [`crate::Confirmation::Unconfirmed`] rather than an
/// error since it may still land.
#[derive(Debug, derive_more::From, derive_more::Display)]
pub enum Error {
    #[display("invalid deposit amount: {_0}")]
    InvalidAmount(String),

    #[display("insufficient balance: need {needed} lamports, have {available}")]
    InsufficientBalance { needed: u64, available: u64 },

    #[display("referrer {_0} is not registered")]
    ReferrerNotRegistered(Pubkey),

    #[display("referrer {_0} is not registered in the airdrop ledger")]
    ReferrerNotInLedger(Pubkey),

    #[display("invalid filled slot count {_0}; expected 0, 1 or 2")]
    InvalidSlotCount(u8),

    #[display("invalid seeds: {_0}")]
    Seed(&'static str),

    #[display("invalid config: {_0}")]
    Config(String),

    #[display("airdrop ledger program state is unavailable")]
    LedgerStateUnavailable,

    #[display("airdrop ledger registration of {_0} wasn’t confirmed")]
    LedgerRegistrationFailed(Pubkey),

    #[display("{account}: {reason}")]
    Decode { account: Pubkey, reason: String },

    /// Upline account list doesn’t consist of (record, wallet) pairs.
    #[display("upline account list has odd length {_0}")]
    UplineConsistency(usize),

    #[display("matrix completion requires airdrop ledger accounts")]
    MissingLedgerAccounts,

    #[display(
        "failed to create address lookup table after {attempts} attempts: \
         {last}"
    )]
    TableCreationFailed { attempts: u32, last: Box<Error> },

    #[display(
        "failed to extend address lookup table {table} with batch {batch} \
         after {attempts} attempts: {last}"
    )]
    TableExtendFailed {
        table: Pubkey,
        batch: usize,
        attempts: u32,
        last: Box<Error>,
    },

    #[display(
        "address lookup table {table} not ready: {observed} of {expected} \
         addresses"
    )]
    TableNotReady { table: Pubkey, observed: usize, expected: usize },

    #[display("transaction too large: {size} > {limit} bytes")]
    TransactionTooLarge { size: usize, limit: usize },

    /// Transaction executed and failed on chain.  `error` is reported as
    /// returned by the cluster.
    #[display("transaction {signature} failed: {error}")]
    Execution {
        signature: Signature,
        error: TransactionError,
        logs: Vec<String>,
    },

    /// Auxiliary transaction wasn’t confirmed in time.
    #[display("transaction {_0} not confirmed in time")]
    NotConfirmed(Signature),

    #[cfg(feature = "relay")]
    #[display("relay: {_0}")]
    RelayRejected(String),

    #[from]
    #[display("rpc: {_0}")]
    Client(solana_client::client_error::ClientError),

    #[from]
    #[display("compile: {_0}")]
    Compile(solana_sdk::message::CompileError),

    #[from]
    #[display("signing: {_0}")]
    Signer(solana_sdk::signer::SignerError),

    #[from]
    #[display("encoding: {_0}")]
    Encode(bincode::Error),

    #[from]
    #[display("{_0}")]
    Io(std::io::Error),

    #[from]
    #[display("json: {_0}")]
    Json(serde_json::Error),

    #[cfg(feature = "relay")]
    #[from]
    #[display("relay: {_0}")]
    Relay(reqwest::Error),
}

impl std::error::Error for Error {}
