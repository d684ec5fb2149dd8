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

use solana_program::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;

use crate::chain::Chain;
use crate::ledger::{self, LedgerStatus};
use crate::lookup_table::Orchestrator;
use crate::record::{ParticipantRecord, SlotVariant};
use crate::submit::{Confirmation, Submitter};
use crate::transaction::{self, Plan};
use crate::upline::UplinePairs;
use crate::{accounts, referrer, upline, Config, Error, Result};


/// Result of a registration attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The wallet has been registered before; nothing was sent.
    AlreadyRegistered(ParticipantRecord),
    Submitted {
        variant: SlotVariant,
        /// Lookup table the transaction referenced.
        table: Pubkey,
        confirmation: Confirmation,
    },
}


/// Registers `signer`’s wallet in the referral matrix.
pub struct Registrar<'a> {
    config: &'a Config,
    submitter: &'a Submitter<'a>,
    tables: Orchestrator<'a>,
    signer: &'a dyn Signer,
}

impl<'a> Registrar<'a> {
    pub fn new(
        config: &'a Config,
        submitter: &'a Submitter<'a>,
        mut tables: Orchestrator<'a>,
        signer: &'a dyn Signer,
    ) -> Self {
        tables.policy.accept_partial = config.accept_partial_table;
        Self { config, submitter, tables, signer }
    }

    fn chain(&self) -> &'a dyn Chain { self.submitter.chain() }

    /// Registers the wallet under `referrer_wallet` depositing `deposit`
    /// lamports.
    pub async fn register(
        &self,
        referrer_wallet: &Pubkey,
        deposit: u64,
    ) -> Result<Outcome> {
        let config = self.config;
        let chain = self.chain();
        let wallet = self.signer.pubkey();

        if deposit == 0 {
            return Err(Error::InvalidAmount("deposit must be positive".into()));
        }
        let needed = deposit.saturating_add(config.reserve_lamports);
        let available = chain.get_balance(&wallet).await?;
        if available < needed {
            return Err(Error::InsufficientBalance { needed, available });
        }

        let (referrer, variant) =
            referrer::read_referrer(chain, config, referrer_wallet).await?;
        if let Some(record) =
            referrer::read_participant(chain, config, &wallet).await?
        {
            if record.is_registered {
                tracing::info!(%wallet, "already registered");
                return Ok(Outcome::AlreadyRegistered(record));
            }
        }

        let now = chrono::Utc::now().timestamp();
        let status = LedgerStatus::read(chain, config, now).await;
        self.ledger_checks(&status, variant, referrer_wallet).await?;

        let addr = &config.addresses;
        let setup = transaction::token_account_setup(
            chain,
            &wallet,
            &wallet,
            &[addr.wsol_mint, addr.token_mint],
        )
        .await?;

        let (uplines, ledger_accounts) = match variant {
            SlotVariant::Third => {
                let uplines =
                    upline::resolve(chain, config, &referrer, status.is_active())
                        .await?;
                let ledger_accounts =
                    ledger::prepare(config, &status, referrer_wallet)?;
                (uplines, Some(ledger_accounts))
            }
            SlotVariant::First | SlotVariant::Second => {
                (UplinePairs::default(), None)
            }
        };
        let remaining = accounts::assemble(
            config,
            variant,
            &uplines,
            ledger_accounts.as_ref(),
        )?;
        tracing::info!(%variant, accounts = remaining.len(), uplines = uplines.len(), "assembled accounts");
        let ix = accounts::register_instruction(
            config,
            &wallet,
            referrer_wallet,
            deposit,
            remaining,
        );

        let addresses: Vec<Pubkey> = ix
            .accounts
            .iter()
            .filter(|meta| !meta.is_signer)
            .map(|meta| meta.pubkey)
            .collect();
        let table = self.tables.ensure(&wallet, &addresses).await?;

        let blockhash = chain.get_latest_blockhash().await?;
        let build = |tip: Option<Instruction>| -> Result<VersionedTransaction> {
            let plan = Plan {
                setup: setup.clone(),
                tip,
                ..Plan::new(
                    config.unit_limit(variant),
                    config.compute.unit_price,
                    vec![ix.clone()],
                )
            };
            let tx = transaction::compile(
                &wallet,
                &plan.into_instructions(),
                core::slice::from_ref(&table.account),
                blockhash,
            )?;
            tracing::info!(size = tx.size(), table = %table.address(), "compiled registration");
            tx.sign(&[self.signer])
        };
        // Tip goes only to the relay; a transaction sent over plain RPC
        // doesn’t pay it.
        let direct = build(None)?;
        let confirmation = match self.tip(&wallet, blockhash.as_ref()) {
            Some(tip) => {
                let relayed = build(Some(tip))?;
                self.submitter.submit_with_fallback(&relayed, &direct).await?
            }
            None => self.submitter.submit(&direct).await?,
        };
        Ok(Outcome::Submitted {
            variant,
            table: *table.address(),
            confirmation,
        })
    }

    /// Verifies airdrop ledger preconditions and registers the wallet in
    /// the ledger if needed.
    ///
    /// The ledger matters only while it’s active.  An unavailable ledger is
    /// reported later, when preparing its accounts, and only if the matrix
    /// completes.
    async fn ledger_checks(
        &self,
        status: &LedgerStatus,
        variant: SlotVariant,
        referrer_wallet: &Pubkey,
    ) -> Result {
        match status {
            LedgerStatus::Active(_) => (),
            LedgerStatus::Ended(_) => return Ok(()),
            LedgerStatus::Unavailable => {
                if variant != SlotVariant::Third {
                    tracing::warn!("airdrop ledger unavailable; skipping ledger registration");
                }
                return Ok(());
            }
        }
        let chain = self.chain();
        if variant == SlotVariant::Third &&
            !ledger::is_registered(chain, self.config, referrer_wallet).await?
        {
            return Err(Error::ReferrerNotInLedger(*referrer_wallet));
        }
        let wallet = self.signer.pubkey();
        if ledger::is_registered(chain, self.config, &wallet).await? {
            tracing::debug!(%wallet, "already in airdrop ledger");
            return Ok(());
        }
        self.register_in_ledger(ledger::register_instruction(self.config, &wallet))
            .await
    }

    async fn register_in_ledger(&self, ix: Instruction) -> Result {
        let wallet = self.signer.pubkey();
        tracing::info!(%wallet, "registering in airdrop ledger");
        let compute = &self.config.compute;
        let ixs = Plan::new(
            compute.ledger_registration_unit_limit,
            compute.ledger_registration_unit_price,
            vec![ix],
        )
        .into_instructions();
        let blockhash = self.chain().get_latest_blockhash().await?;
        let tx = transaction::compile(&wallet, &ixs, &[], blockhash)?
            .sign(&[self.signer])?;
        match self.submitter.submit_direct(&tx).await? {
            Confirmation::Confirmed { .. } => Ok(()),
            Confirmation::Unconfirmed { signature } => {
                tracing::warn!(%signature, "airdrop ledger registration not confirmed");
                Err(Error::LedgerRegistrationFailed(wallet))
            }
        }
    }

    /// Returns relay tip transfer if the transaction goes through a relay.
    /// `seed` picks one of the tip accounts.
    fn tip(&self, payer: &Pubkey, seed: &[u8]) -> Option<Instruction> {
        if !self.submitter.has_relay() {
            return None;
        }
        let relay = self.config.active_relay()?;
        let index = usize::from(seed.first().copied().unwrap_or(0));
        let account = relay.tip_accounts.get(index % relay.tip_accounts.len().max(1))?;
        Some(transaction::tip_instruction(payer, account, relay.tip_lamports))
    }
}
