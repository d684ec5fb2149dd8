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

//! Resolution of the referrer’s upline.
//!
//! When the referrer’s matrix completes, the matrix program pays the
//! referrer’s ancestors.  Each of them is passed as a (record, wallet) pair.
//! Ancestors which can’t be verified are left out; the program skips
//! whatever it doesn’t get so that’s preferable to failing the whole
//! registration.

use solana_program::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;

use crate::chain::Chain;
use crate::record::{ParticipantRecord, MAX_UPLINE_DEPTH};
use crate::{ledger, Config, Error, Result};


/// Ancestor which passed verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Survivor {
    pub pda: Pubkey,
    pub wallet: Pubkey,
    pub depth: u8,
}

/// Upline accounts as (record, wallet) pairs, both writable.
///
/// The only way to construct the value is from survivors or from a list of
/// account metas of even length so a well-formed pair sequence is
/// guaranteed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UplinePairs(Vec<AccountMeta>);

impl UplinePairs {
    pub fn new(survivors: &[Survivor]) -> Self {
        Self(
            survivors
                .iter()
                .flat_map(|survivor| {
                    [
                        AccountMeta::new(survivor.pda, false),
                        AccountMeta::new(survivor.wallet, false),
                    ]
                })
                .collect(),
        )
    }

    pub fn metas(&self) -> &[AccountMeta] { &self.0 }

    pub fn len(&self) -> usize { self.0.len() / 2 }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Returns ancestors’ wallets in pair order.
    pub fn wallets(&self) -> impl Iterator<Item = &Pubkey> + '_ {
        self.0.chunks_exact(2).map(|pair| &pair[1].pubkey)
    }

    pub fn into_metas(self) -> Vec<AccountMeta> { self.0 }
}

impl TryFrom<Vec<AccountMeta>> for UplinePairs {
    type Error = Error;

    fn try_from(metas: Vec<AccountMeta>) -> Result<Self> {
        if metas.len() % 2 == 0 {
            Ok(Self(metas))
        } else {
            Err(Error::UplineConsistency(metas.len()))
        }
    }
}


/// Resolves referrer’s ancestors which the matrix program should pay.
///
/// Each upline entry’s record is fetched and verified.  If `ledger_active`
/// is set, ancestors without an airdrop ledger record are excluded as well
/// since the program notifies the ledger on their behalf.  Survivors are
/// ordered by depth, deepest first.
pub async fn resolve(
    chain: &dyn Chain,
    config: &Config,
    referrer: &ParticipantRecord,
    ledger_active: bool,
) -> Result<UplinePairs> {
    let survivors = survivors(chain, config, referrer, ledger_active).await;
    tracing::info!(
        entries = referrer.upline.len().min(MAX_UPLINE_DEPTH),
        survivors = survivors.len(),
        "resolved upline"
    );
    Ok(UplinePairs::new(&survivors))
}

async fn survivors(
    chain: &dyn Chain,
    config: &Config,
    referrer: &ParticipantRecord,
    ledger_active: bool,
) -> Vec<Survivor> {
    let mut survivors = Vec::with_capacity(MAX_UPLINE_DEPTH);
    for entry in referrer.upline.iter().take(MAX_UPLINE_DEPTH) {
        let pda = entry.pda;
        let account = match chain.get_account(&pda).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                tracing::warn!(%pda, "upline record missing; skipping");
                continue;
            }
            Err(err) => {
                tracing::warn!(%pda, %err, "failed fetching upline record; skipping");
                continue;
            }
        };
        let record = match ParticipantRecord::decode(&pda, &account.data) {
            Ok(record) if record.is_registered => record,
            Ok(_) => {
                tracing::warn!(%pda, "upline participant not registered; skipping");
                continue;
            }
            Err(err) => {
                tracing::warn!(%err, "malformed upline record; skipping");
                continue;
            }
        };
        let wallet = record.owner_wallet;
        if wallet != entry.wallet {
            tracing::warn!(
                %pda,
                claimed = %entry.wallet,
                owner = %wallet,
                "upline wallet mismatch; using record owner"
            );
        }
        if ledger_active {
            match ledger::is_registered(chain, config, &wallet).await {
                Ok(true) => (),
                Ok(false) => {
                    tracing::warn!(%wallet, "upline not in airdrop ledger; skipping");
                    continue;
                }
                Err(err) => {
                    tracing::warn!(%wallet, %err, "failed checking airdrop ledger; skipping");
                    continue;
                }
            }
        }
        survivors.push(Survivor { pda, wallet, depth: record.depth });
    }
    survivors.sort_by(|a, b| b.depth.cmp(&a.depth));
    survivors
}
