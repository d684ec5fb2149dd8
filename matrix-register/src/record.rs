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

//! Decoding of on-chain records owned by the matrix and the airdrop ledger
//! programs.
//!
//! Both programs are Anchor programs so every account starts with an 8-byte
//! discriminator followed by borsh-serialised fields.  Accounts are allocated
//! at their maximum size so trailing bytes are ignored.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;

use crate::{Error, Result};

/// Maximum number of ancestors stored in participant’s upline.
pub const MAX_UPLINE_DEPTH: usize = 6;

/// Minimum length of the ledger program state data covering all the fields
/// we read.
const LEDGER_STATE_MIN_LEN: usize = 113;


/// Registration slot the new participant will fill in referrer’s matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SlotVariant {
    /// Deposit is swapped and burned.
    First,
    /// Deposit is reserved for the referrer.
    Second,
    /// Reserved deposit is paid out, the matrix completes and the upline is
    /// paid recursively.
    Third,
}

impl TryFrom<u8> for SlotVariant {
    type Error = Error;

    fn try_from(filled_slots: u8) -> Result<Self> {
        match filled_slots {
            0 => Ok(Self::First),
            1 => Ok(Self::Second),
            2 => Ok(Self::Third),
            n => Err(Error::InvalidSlotCount(n)),
        }
    }
}


/// Participant record of the matrix program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParticipantRecord {
    pub is_registered: bool,
    pub referrer: Option<Pubkey>,
    pub owner_wallet: Pubkey,
    /// Distance of the participant from the root of the referral tree.
    pub depth: u8,
    /// Ancestors recorded at registration, nearest first.
    pub upline: Vec<UplineEntry>,
    pub chain_id: u32,
    pub filled_slots: u8,
}

/// Ancestor recorded in participant’s upline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UplineEntry {
    /// Ancestor’s participant record.
    pub pda: Pubkey,
    /// Wallet the ancestor claimed at registration.
    pub wallet: Pubkey,
}

impl ParticipantRecord {
    /// Decodes record from account data.  `account` is used for error
    /// reporting only.
    pub fn decode(account: &Pubkey, data: &[u8]) -> Result<Self> {
        let wire: wire::UserAccount =
            decode_anchor(account, "UserAccount", data)?;
        Ok(Self {
            is_registered: wire.is_registered,
            referrer: wire.referrer.map(Pubkey::new_from_array),
            owner_wallet: Pubkey::new_from_array(wire.owner_wallet),
            depth: wire.upline.depth,
            upline: wire
                .upline
                .upline
                .into_iter()
                .map(|entry| UplineEntry {
                    pda: Pubkey::new_from_array(entry.pda),
                    wallet: Pubkey::new_from_array(entry.wallet),
                })
                .collect(),
            chain_id: wire.chain.id,
            filled_slots: wire.chain.filled_slots,
        })
    }

    /// Returns slot the next referral fills.
    pub fn slot_variant(&self) -> Result<SlotVariant> {
        SlotVariant::try_from(self.filled_slots)
    }
}


/// The airdrop ledger program state fields the client needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerState {
    /// Current period index as stored by the ledger.  The ledger updates it
    /// lazily so it may lag behind wall-clock time.
    pub current_period: u8,
    /// Unix timestamp of the start of the first period.
    pub start_timestamp: i64,
}

impl LedgerState {
    pub fn decode(account: &Pubkey, data: &[u8]) -> Result<Self> {
        if data.len() < LEDGER_STATE_MIN_LEN {
            return Err(Error::Decode {
                account: *account,
                reason: format!(
                    "ledger state too short: {} < {LEDGER_STATE_MIN_LEN}",
                    data.len()
                ),
            });
        }
        let wire: wire::LedgerStatePrefix =
            decode_anchor(account, "ProgramState", data)?;
        Ok(Self {
            current_period: wire.current_week,
            start_timestamp: wire.start_timestamp,
        })
    }
}


/// Returns Anchor account discriminator for account type `name`.
pub fn account_discriminator(name: &str) -> [u8; 8] {
    let hash = solana_sdk::hash::hashv(&[b"account:", name.as_bytes()]);
    let mut discriminator = [0; 8];
    discriminator.copy_from_slice(&hash.to_bytes()[..8]);
    discriminator
}

fn decode_anchor<T: BorshDeserialize>(
    account: &Pubkey,
    name: &str,
    data: &[u8],
) -> Result<T> {
    let decode_err = |reason: String| Error::Decode { account: *account, reason };
    let (discriminator, mut data) = data
        .split_first_chunk::<8>()
        .ok_or_else(|| decode_err("account data too short".into()))?;
    if *discriminator != account_discriminator(name) {
        return Err(decode_err(format!("not a {name} account")));
    }
    T::deserialize(&mut data).map_err(|err| decode_err(err.to_string()))
}


/// Borsh layouts of the on-chain accounts.
pub(crate) mod wire {
    use super::*;

    /// Allocated size of `UserAccount` data, excluding the discriminator.
    #[cfg(test)]
    pub const USER_ACCOUNT_SIZE: usize = 1 + 33 + 32 +
        (4 + 1 + 4 + MAX_UPLINE_DEPTH * 64) +
        (4 + 3 * 33 + 1) +
        8;

    #[derive(BorshSerialize, BorshDeserialize)]
    pub struct UserAccount {
        pub is_registered: bool,
        pub referrer: Option<[u8; 32]>,
        pub owner_wallet: [u8; 32],
        pub upline: ReferralUpline,
        pub chain: ReferralChain,
        pub reserved_sol: u64,
    }

    #[derive(BorshSerialize, BorshDeserialize)]
    pub struct ReferralUpline {
        pub id: u32,
        pub depth: u8,
        pub upline: Vec<UplineEntry>,
    }

    #[derive(BorshSerialize, BorshDeserialize)]
    pub struct UplineEntry {
        pub pda: [u8; 32],
        pub wallet: [u8; 32],
    }

    #[derive(BorshSerialize, BorshDeserialize)]
    pub struct ReferralChain {
        pub id: u32,
        pub slots: [Option<[u8; 32]>; 3],
        pub filled_slots: u8,
    }

    /// Leading fields of the ledger’s `ProgramState`.  `current_week` ends up
    /// at offset 72 and `start_timestamp` at offset 105 of the account data.
    #[derive(BorshSerialize, BorshDeserialize)]
    pub struct LedgerStatePrefix {
        pub admin: [u8; 32],
        pub donut_token_mint: [u8; 32],
        pub current_week: u8,
        pub matrix_program_id: [u8; 32],
        pub start_timestamp: i64,
    }
}
