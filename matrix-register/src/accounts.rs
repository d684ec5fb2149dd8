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

//! Accounts of the `register_with_sol_deposit` instruction.
//!
//! The matrix program reads its remaining accounts by position:
//!
//! | Index         | Accounts                                           |
//! |---------------|----------------------------------------------------|
//! | 0–3           | vault A: vault, LP, LP mint, token vault           |
//! | 4–5           | price feed: SOL/USD feed, oracle program           |
//! | 6–12          | airdrop ledger base (third slot only)              |
//! | 13..13+N      | uplines’ airdrop ledger records (third slot only)  |
//! | 13+N..        | upline (record, wallet) pairs (third slot only)    |
//!
//! where N is the number of upline pairs.  [`RemainingAccounts`] keeps the
//! segments apart and flattens them in that order.

use solana_program::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::ledger::LedgerAccounts;
use crate::record::SlotVariant;
use crate::upline::UplinePairs;
use crate::{pda, Config, Error, Result};


/// Remaining accounts of the registration instruction split into segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemainingAccounts {
    vault: [AccountMeta; 4],
    price_feed: [AccountMeta; 2],
    completion: Option<CompletionSegment>,
}

/// Accounts needed only when the registration completes referrer’s matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
struct CompletionSegment {
    ledger_base: [AccountMeta; 7],
    upline_ledger: Vec<AccountMeta>,
    upline_pairs: UplinePairs,
}

impl RemainingAccounts {
    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.vault.len() +
            self.price_feed.len() +
            self.completion.as_ref().map_or(0, |segment| {
                segment.ledger_base.len() +
                    segment.upline_ledger.len() +
                    segment.upline_pairs.metas().len()
            })
    }

    /// Always false; vault and price feed accounts are always present.
    pub fn is_empty(&self) -> bool { false }

    /// Flattens the segments in the order the program expects.
    pub fn into_metas(self) -> Vec<AccountMeta> {
        let mut metas = Vec::with_capacity(self.len());
        metas.extend(self.vault);
        metas.extend(self.price_feed);
        if let Some(segment) = self.completion {
            metas.extend(segment.ledger_base);
            metas.extend(segment.upline_ledger);
            metas.extend(segment.upline_pairs.into_metas());
        }
        metas
    }
}

/// Assembles remaining accounts for registration filling `variant` slot.
///
/// `uplines` and `ledger` are used for the third slot only; `ledger` is
/// mandatory in that case.
pub fn assemble(
    config: &Config,
    variant: SlotVariant,
    uplines: &UplinePairs,
    ledger: Option<&LedgerAccounts>,
) -> Result<RemainingAccounts> {
    let addresses = &config.addresses;
    let vault = [
        AccountMeta::new(addresses.a_vault, false),
        AccountMeta::new(addresses.a_vault_lp, false),
        AccountMeta::new(addresses.a_vault_lp_mint, false),
        AccountMeta::new(addresses.a_token_vault, false),
    ];
    let price_feed = [
        AccountMeta::new_readonly(addresses.sol_usd_feed, false),
        AccountMeta::new_readonly(addresses.chainlink_program, false),
    ];
    let completion = match variant {
        SlotVariant::First | SlotVariant::Second => None,
        SlotVariant::Third => {
            let ledger = ledger.ok_or(Error::MissingLedgerAccounts)?;
            let ledger_program = &config.ledger.program_id;
            let upline_ledger = uplines
                .wallets()
                .map(|wallet| {
                    let record = pda::ledger_record(ledger_program, wallet);
                    AccountMeta::new(record, false)
                })
                .collect();
            Some(CompletionSegment {
                ledger_base: ledger.metas().clone(),
                upline_ledger,
                upline_pairs: uplines.clone(),
            })
        }
    };
    Ok(RemainingAccounts { vault, price_feed, completion })
}


/// Returns Anchor instruction discriminator for instruction `name`.
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let hash = solana_sdk::hash::hashv(&[b"global:", name.as_bytes()]);
    let mut discriminator = [0; 8];
    discriminator.copy_from_slice(&hash.to_bytes()[..8]);
    discriminator
}

/// Builds the `register_with_sol_deposit` instruction registering `wallet`
/// under `referrer_wallet` with `deposit` lamports.
pub fn register_instruction(
    config: &Config,
    wallet: &Pubkey,
    referrer_wallet: &Pubkey,
    deposit: u64,
    remaining: RemainingAccounts,
) -> Instruction {
    let program = &config.program_id;
    let addr = &config.addresses;
    let mut accounts = vec![
        AccountMeta::new(config.state_address, false),
        AccountMeta::new(*wallet, true),
        AccountMeta::new(pda::participant_record(program, referrer_wallet), false),
        AccountMeta::new(*referrer_wallet, false),
        AccountMeta::new(pda::participant_record(program, wallet), false),
        AccountMeta::new(pda::token_account(wallet, &addr.wsol_mint), false),
        AccountMeta::new(pda::token_account(wallet, &addr.token_mint), false),
        AccountMeta::new_readonly(addr.wsol_mint, false),
        AccountMeta::new(addr.pool, false),
        AccountMeta::new(addr.b_vault, false),
        AccountMeta::new(addr.b_token_vault, false),
        AccountMeta::new(addr.b_vault_lp_mint, false),
        AccountMeta::new(addr.b_vault_lp, false),
        AccountMeta::new_readonly(addr.vault_program, false),
        AccountMeta::new(pda::sol_vault(program), false),
        AccountMeta::new(addr.token_mint, false),
        AccountMeta::new(addr.protocol_token_fee, false),
        AccountMeta::new_readonly(addr.amm_program, false),
        AccountMeta::new_readonly(pda::TOKEN_PROGRAM_ID, false),
        AccountMeta::new_readonly(solana_program::system_program::ID, false),
        AccountMeta::new_readonly(
            spl_associated_token_account_client::program::ID,
            false,
        ),
        AccountMeta::new_readonly(solana_program::sysvar::rent::ID, false),
    ];
    accounts.extend(remaining.into_metas());

    let data = [
        &instruction_discriminator("register_with_sol_deposit")[..],
        &deposit.to_le_bytes()[..],
    ]
    .concat();

    Instruction { program_id: *program, accounts, data }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ledger::{self, LedgerStatus};
    use crate::record::LedgerState;
    use crate::testutil::test_config;
    use crate::upline::Survivor;

    fn survivors(n: u8) -> UplinePairs {
        let survivors: Vec<_> = (0..n)
            .map(|depth| Survivor {
                pda: Pubkey::new_unique(),
                wallet: Pubkey::new_unique(),
                depth: n - depth,
            })
            .collect();
        UplinePairs::new(&survivors)
    }

    fn ledger_accounts(config: &Config, referrer: &Pubkey) -> LedgerAccounts {
        let status = LedgerStatus::Active(LedgerState {
            current_period: 3,
            start_timestamp: 0,
        });
        ledger::prepare(config, &status, referrer).unwrap()
    }

    fn check_prefix(config: &Config, metas: &[AccountMeta]) {
        let addr = &config.addresses;
        let want = [
            (addr.a_vault, true),
            (addr.a_vault_lp, true),
            (addr.a_vault_lp_mint, true),
            (addr.a_token_vault, true),
            (addr.sol_usd_feed, false),
            (addr.chainlink_program, false),
        ];
        let got: Vec<_> = metas[..6]
            .iter()
            .map(|meta| (meta.pubkey, meta.is_writable))
            .collect();
        assert_eq!(want.to_vec(), got);
        assert!(metas.iter().all(|meta| !meta.is_signer));
    }

    #[test]
    fn test_first_and_second_slot() {
        let config = test_config();
        for variant in [SlotVariant::First, SlotVariant::Second] {
            let remaining = assemble(
                &config,
                variant,
                &UplinePairs::default(),
                None,
            )
            .unwrap();
            assert_eq!(6, remaining.len());
            let metas = remaining.into_metas();
            assert_eq!(6, metas.len());
            check_prefix(&config, &metas);
        }
    }

    #[test]
    fn test_third_slot() {
        let config = test_config();
        let referrer = Pubkey::new_unique();
        let ledger = ledger_accounts(&config, &referrer);
        let uplines = survivors(3);

        let remaining = assemble(
            &config,
            SlotVariant::Third,
            &uplines,
            Some(&ledger),
        )
        .unwrap();
        assert_eq!(6 + 7 + 3 + 6, remaining.len());
        let metas = remaining.into_metas();
        assert_eq!(22, metas.len());
        check_prefix(&config, &metas);
        assert_eq!(&ledger.metas()[..], &metas[6..13]);
        let want_ledger: Vec<_> = uplines
            .wallets()
            .map(|wallet| {
                AccountMeta::new(
                    pda::ledger_record(&config.ledger.program_id, wallet),
                    false,
                )
            })
            .collect();
        assert_eq!(want_ledger.as_slice(), &metas[13..16]);
        assert_eq!(uplines.metas(), &metas[16..]);
        assert_eq!(0, metas[16..].len() % 2);
    }

    #[test]
    fn test_third_slot_without_uplines() {
        let config = test_config();
        let referrer = Pubkey::new_unique();
        let ledger = ledger_accounts(&config, &referrer);
        let metas = assemble(
            &config,
            SlotVariant::Third,
            &UplinePairs::default(),
            Some(&ledger),
        )
        .unwrap()
        .into_metas();
        assert_eq!(13, metas.len());
        assert_eq!(referrer, metas[10].pubkey);
    }

    #[test]
    fn test_third_slot_requires_ledger() {
        let config = test_config();
        assert!(matches!(
            assemble(
                &config,
                SlotVariant::Third,
                &survivors(1),
                None,
            ),
            Err(Error::MissingLedgerAccounts)
        ));
    }

    #[test]
    fn test_register_instruction() {
        let config = test_config();
        let wallet = Pubkey::new_unique();
        let referrer = Pubkey::new_unique();
        let remaining = assemble(
            &config,
            SlotVariant::First,
            &UplinePairs::default(),
            None,
        )
        .unwrap();
        let ix = register_instruction(
            &config,
            &wallet,
            &referrer,
            100_000_000,
            remaining,
        );

        assert_eq!(config.program_id, ix.program_id);
        assert_eq!(22 + 6, ix.accounts.len());
        assert_eq!(AccountMeta::new(wallet, true), ix.accounts[1]);
        assert_eq!(
            pda::participant_record(&config.program_id, &referrer),
            ix.accounts[2].pubkey
        );
        assert_eq!(
            pda::participant_record(&config.program_id, &wallet),
            ix.accounts[4].pubkey
        );
        assert_eq!(
            AccountMeta::new_readonly(solana_program::sysvar::rent::ID, false),
            ix.accounts[21]
        );
        assert_eq!(1, ix.accounts.iter().filter(|meta| meta.is_signer).count());

        let mut want = instruction_discriminator("register_with_sol_deposit").to_vec();
        want.extend_from_slice(&100_000_000u64.to_le_bytes());
        assert_eq!(want, ix.data);
    }
}
