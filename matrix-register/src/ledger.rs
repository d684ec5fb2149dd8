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

//! Airdrop ledger accounts.
//!
//! When a referrer’s matrix completes, the matrix program notifies the
//! airdrop ledger program by cross-program invocation.  The ledger counts
//! completed matrices per period; it runs for a fixed number of periods after
//! which notifications are ignored.  The ledger’s accounts must nevertheless
//! be passed to the matrix program even once it has ended.

use solana_program::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::chain::Chain;
use crate::config::LedgerConfig;
use crate::record::LedgerState;
use crate::{pda, Config, Error, Result};

/// Anchor discriminator of the ledger’s `register_user` instruction.
const REGISTER_USER_DISCRIMINATOR: [u8; 8] = [2, 241, 150, 223, 99, 214, 116, 97];


/// Phase of the airdrop ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerStatus {
    Active(LedgerState),
    /// All periods have elapsed.  Notifications are no-ops.
    Ended(LedgerState),
    /// Program state account is missing or malformed.
    Unavailable,
}

impl LedgerStatus {
    /// Reads ledger program state and classifies it at time `now` (Unix
    /// timestamp).
    ///
    /// Failure to read or decode the state is reported as `Unavailable`
    /// rather than an error.  Whether that’s fatal depends on the caller.
    pub async fn read(chain: &dyn Chain, config: &Config, now: i64) -> Self {
        let address = pda::ledger_state(&config.ledger.program_id);
        let account = match chain.get_account(&address).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                tracing::warn!(%address, "airdrop ledger state missing");
                return Self::Unavailable;
            }
            Err(err) => {
                tracing::warn!(%address, %err, "failed reading airdrop ledger state");
                return Self::Unavailable;
            }
        };
        match LedgerState::decode(&address, &account.data) {
            Ok(state) => {
                let status = Self::classify(&config.ledger, state, now);
                tracing::info!(?status, "airdrop ledger");
                status
            }
            Err(err) => {
                tracing::warn!(%err, "malformed airdrop ledger state");
                Self::Unavailable
            }
        }
    }

    /// Classifies decoded ledger state at time `now`.
    pub fn classify(config: &LedgerConfig, state: LedgerState, now: i64) -> Self {
        let duration = i64::from(config.max_periods)
            .saturating_mul(config.period_seconds);
        let elapsed = now.saturating_sub(state.start_timestamp);
        if state.current_period < config.max_periods && elapsed < duration {
            Self::Active(state)
        } else {
            Self::Ended(state)
        }
    }

    pub fn is_active(&self) -> bool { matches!(self, Self::Active(_)) }
}


/// Airdrop ledger accounts passed to the matrix program when the referrer’s
/// matrix completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerAccounts {
    metas: [AccountMeta; 7],
    /// Whether the ledger will actually record the completion.
    pub active: bool,
    pub current_period: u8,
    pub next_period: u8,
}

impl LedgerAccounts {
    /// Returns the accounts in the order the matrix program expects: program
    /// state, referrer’s ledger record, current and next period data,
    /// referrer’s wallet, ledger program and instructions sysvar.
    pub fn metas(&self) -> &[AccountMeta; 7] { &self.metas }

    /// Referrer’s record in the ledger.
    pub fn referrer_record(&self) -> &Pubkey { &self.metas[1].pubkey }
}

/// Prepares ledger accounts for completion of `referrer_wallet`’s matrix.
///
/// Period indices are clamped to the configured number of periods so an
/// ended ledger still gets well-formed accounts.
pub fn prepare(
    config: &Config,
    status: &LedgerStatus,
    referrer_wallet: &Pubkey,
) -> Result<LedgerAccounts> {
    let (state, active) = match status {
        LedgerStatus::Active(state) => (state, true),
        LedgerStatus::Ended(state) => (state, false),
        LedgerStatus::Unavailable => return Err(Error::LedgerStateUnavailable),
    };
    let ledger = &config.ledger.program_id;
    let max = config.ledger.max_periods;
    let current_period = state.current_period.min(max);
    let next_period = current_period.saturating_add(1).min(max);
    let metas = [
        AccountMeta::new(pda::ledger_state(ledger), false),
        AccountMeta::new(pda::ledger_record(ledger, referrer_wallet), false),
        AccountMeta::new(pda::period_data(ledger, current_period), false),
        AccountMeta::new(pda::period_data(ledger, next_period), false),
        AccountMeta::new(*referrer_wallet, false),
        AccountMeta::new_readonly(*ledger, false),
        AccountMeta::new_readonly(solana_program::sysvar::instructions::ID, false),
    ];
    tracing::debug!(current_period, next_period, active, "prepared ledger accounts");
    Ok(LedgerAccounts { metas, active, current_period, next_period })
}

/// Checks whether `wallet` has a record in the airdrop ledger.
///
/// A record counts only if it exists and is owned by the ledger program.
pub async fn is_registered(
    chain: &dyn Chain,
    config: &Config,
    wallet: &Pubkey,
) -> Result<bool> {
    let ledger = &config.ledger.program_id;
    let address = pda::ledger_record(ledger, wallet);
    Ok(chain
        .get_account(&address)
        .await?
        .is_some_and(|account| account.owner == *ledger))
}

/// Builds instruction registering `wallet` in the airdrop ledger.  `wallet`
/// signs and pays for the record.
pub fn register_instruction(config: &Config, wallet: &Pubkey) -> Instruction {
    let ledger = config.ledger.program_id;
    Instruction {
        program_id: ledger,
        accounts: vec![
            AccountMeta::new(pda::ledger_state(&ledger), false),
            AccountMeta::new(*wallet, true),
            AccountMeta::new(pda::ledger_record(&ledger, wallet), false),
            AccountMeta::new_readonly(solana_program::system_program::ID, false),
        ],
        data: REGISTER_USER_DISCRIMINATOR.to_vec(),
    }
}
