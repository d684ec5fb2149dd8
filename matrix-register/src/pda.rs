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

//! Derivation of program addresses used by the matrix and airdrop ledger
//! programs.

use solana_program::pubkey::{Pubkey, MAX_SEEDS, MAX_SEED_LEN};

use crate::{Error, Result};

/// Seed tag of participant records in both the matrix and the ledger
/// program.
pub const USER_ACCOUNT_SEED: &[u8] = b"user_account";
pub const SOL_VAULT_SEED: &[u8] = b"program_sol_vault";
pub const LEDGER_STATE_SEED: &[u8] = b"program_state";
pub const PERIOD_DATA_SEED: &[u8] = b"weekly_data";

pub const TOKEN_PROGRAM_ID: Pubkey =
    solana_program::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// Derives program address from a seed tag followed by key parts.
///
/// Fails if any of the seeds is longer than [`MAX_SEED_LEN`] or if there are
/// too many of them.  The bump seed is searched for, so the total number of
/// seeds must leave room for it.
pub fn derive(tag: &[u8], parts: &[&[u8]], program: &Pubkey) -> Result<Pubkey> {
    if parts.len() + 2 > MAX_SEEDS {
        return Err(Error::Seed("too many seeds"));
    }
    let mut seeds = Vec::with_capacity(parts.len() + 1);
    seeds.push(tag);
    seeds.extend_from_slice(parts);
    if seeds.iter().any(|seed| seed.len() > MAX_SEED_LEN) {
        return Err(Error::Seed("seed too long"));
    }
    Pubkey::try_find_program_address(&seeds, program)
        .map(|(address, _bump)| address)
        .ok_or(Error::Seed("no viable bump seed"))
}

/// Address of participant record of given wallet in the matrix program.
pub fn participant_record(program: &Pubkey, wallet: &Pubkey) -> Pubkey {
    derive_fixed(USER_ACCOUNT_SEED, &[wallet.as_ref()], program)
}

/// Address of the matrix program’s SOL reserve.
pub fn sol_vault(program: &Pubkey) -> Pubkey {
    derive_fixed(SOL_VAULT_SEED, &[], program)
}

/// Address of the airdrop ledger program state.
pub fn ledger_state(ledger: &Pubkey) -> Pubkey {
    derive_fixed(LEDGER_STATE_SEED, &[], ledger)
}

/// Address of wallet’s record in the airdrop ledger.  The record exists only
/// if the wallet registered with the ledger.
pub fn ledger_record(ledger: &Pubkey, wallet: &Pubkey) -> Pubkey {
    derive_fixed(USER_ACCOUNT_SEED, &[wallet.as_ref()], ledger)
}

/// Address of airdrop ledger’s data for given period.
pub fn period_data(ledger: &Pubkey, period: u8) -> Pubkey {
    derive_fixed(PERIOD_DATA_SEED, &[&[period]], ledger)
}

/// Associated token account of `owner` for `mint`.
pub fn token_account(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account_client::address::get_associated_token_address_with_program_id(
        owner,
        mint,
        &TOKEN_PROGRAM_ID,
    )
}

/// Derives address from seeds known to be well-formed.
fn derive_fixed(tag: &[u8], parts: &[&[u8]], program: &Pubkey) -> Pubkey {
    let mut seeds = Vec::with_capacity(parts.len() + 1);
    seeds.push(tag);
    seeds.extend_from_slice(parts);
    Pubkey::find_program_address(&seeds, program).0
}
