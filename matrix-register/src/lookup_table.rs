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

//! Address lookup table lifecycle.
//!
//! A table is created once per wallet and remembered in a [`TableCache`].
//! Extending a table happens in several transactions and the new addresses
//! take a while to become visible to all nodes, so a freshly extended table
//! is polled until it looks complete.

use std::collections::HashSet;

use core::time::Duration;

use solana_sdk::address_lookup_table::instruction::{
    create_lookup_table, extend_lookup_table,
};
use solana_sdk::address_lookup_table::state::AddressLookupTable;
use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::Signer;

use crate::cache::{CacheError, CachedTable, TableCache};
use crate::retry::Retry;
use crate::submit::{Confirmation, Submitter};
use crate::transaction::{self, Plan};
use crate::{Error, Result};

/// Maximum number of addresses added to a table in a single transaction.
pub const EXTEND_BATCH_SIZE: usize = 20;


/// Operations on address lookup tables owned by a single authority.
#[async_trait::async_trait]
pub trait TableService: Send + Sync {
    /// Creates an empty table; returns its address.
    async fn create(&self) -> Result<Pubkey>;

    /// Appends addresses to the table.
    async fn extend(&self, table: &Pubkey, addresses: &[Pubkey]) -> Result;

    /// Fetches the table; returns `None` if it doesn’t exist.
    async fn fetch(&self, table: &Pubkey)
        -> Result<Option<AddressLookupTableAccount>>;
}


/// Timing and batching of table operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TablePolicy {
    pub batch_size: usize,
    pub create: Retry,
    /// Retry of a single extend batch.
    pub extend: Retry,
    /// Pause between consecutive extend batches.
    pub batch_pause: Duration,
    /// Polling for the extended table to become visible.
    pub propagation: Retry,
    /// Number of consecutive polls with unchanged non-zero address count
    /// after which the table is considered ready even if it has fewer
    /// addresses than expected.
    pub stable_polls: u32,
    /// Whether to use a table which isn’t complete once polling gives up.
    pub accept_partial: bool,
}

impl Default for TablePolicy {
    fn default() -> Self {
        Self {
            batch_size: EXTEND_BATCH_SIZE,
            create: Retry::fixed(3, Duration::from_secs(2)),
            extend: Retry::fixed(3, Duration::from_secs(2)),
            batch_pause: Duration::from_secs(2),
            propagation: Retry::fixed(20, Duration::from_secs(3)),
            stable_polls: 3,
            accept_partial: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Table was found in the cache and on chain.
    Reused,
    Created,
}

/// Table ready to be referenced by a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyTable {
    pub account: AddressLookupTableAccount,
    pub origin: Origin,
    /// Number of distinct addresses requested.
    pub expected: usize,
}

impl ReadyTable {
    pub fn address(&self) -> &Pubkey { &self.account.key }
}


/// Provides a lookup table containing requested addresses.
pub struct Orchestrator<'a> {
    service: &'a dyn TableService,
    cache: &'a dyn TableCache,
    pub policy: TablePolicy,
}

impl<'a> Orchestrator<'a> {
    pub fn new(service: &'a dyn TableService, cache: &'a dyn TableCache) -> Self {
        Self { service, cache, policy: TablePolicy::default() }
    }

    /// Returns `owner`’s cached table or creates a new one with `addresses`.
    ///
    /// A cached table is reused as is.  Addresses it lacks are reported but
    /// not added; the compiled transaction will carry them inline.
    pub async fn ensure(
        &self,
        owner: &Pubkey,
        addresses: &[Pubkey],
    ) -> Result<ReadyTable> {
        let addresses = dedup(addresses);
        let expected = addresses.len();

        if let Some(account) = self.cached(owner).await {
            let present: HashSet<_> = account.addresses.iter().collect();
            let missing =
                addresses.iter().filter(|addr| !present.contains(addr)).count();
            if missing > 0 {
                tracing::warn!(
                    table = %account.key,
                    missing,
                    "cached lookup table lacks some addresses"
                );
            }
            tracing::info!(table = %account.key, "reusing lookup table");
            return Ok(ReadyTable { account, origin: Origin::Reused, expected });
        }

        let table = self
            .policy
            .create
            .run("create lookup table", |_| self.service.create())
            .await
            .map_err(|exhausted| Error::TableCreationFailed {
                attempts: exhausted.attempts,
                last: Box::new(exhausted.last),
            })?;
        tracing::info!(%table, "created lookup table");

        self.extend(&table, &addresses).await?;
        let account = self.await_ready(&table, &addresses).await?;

        let record = CachedTable {
            address: table,
            created: chrono::Utc::now(),
            address_count: account.addresses.len(),
        };
        if let Err(err) = self.cache.put(owner, &record) {
            tracing::warn!(%table, %err, "failed caching lookup table");
        }
        Ok(ReadyTable { account, origin: Origin::Created, expected })
    }

    /// Looks up owner’s table in the cache and fetches it.  Returns `None`
    /// if there’s no usable table.
    async fn cached(&self, owner: &Pubkey) -> Option<AddressLookupTableAccount> {
        let cached = match self.cache.get(owner) {
            Ok(cached) => cached,
            Err(CacheError::Miss) => {
                tracing::debug!(%owner, "no cached lookup table");
                return None;
            }
            Err(err) => {
                tracing::warn!(%owner, %err, "unusable lookup table cache");
                return None;
            }
        };
        match self.service.fetch(&cached.address).await {
            Ok(Some(account)) if !account.addresses.is_empty() => Some(account),
            Ok(_) => {
                tracing::warn!(table = %cached.address, "cached lookup table missing or empty");
                None
            }
            Err(err) => {
                tracing::warn!(table = %cached.address, %err, "failed fetching cached lookup table");
                None
            }
        }
    }

    /// Extends table in batches, one batch at a time.
    ///
    /// A batch whose transaction failed to confirm may still have landed so
    /// before it is retried the table is fetched and only addresses it lacks
    /// are sent again.
    async fn extend(&self, table: &Pubkey, addresses: &[Pubkey]) -> Result {
        let batch_size = self.policy.batch_size.max(1);
        let batches = addresses.len().div_ceil(batch_size);
        for (batch, chunk) in addresses.chunks(batch_size).enumerate() {
            if batch > 0 {
                tokio::time::sleep(self.policy.batch_pause).await;
            }
            tracing::info!(%table, batch, batches, len = chunk.len(), "extending lookup table");
            self.policy
                .extend
                .run("extend lookup table", |attempt| {
                    self.extend_batch(table, chunk, attempt)
                })
                .await
                .map_err(|exhausted| Error::TableExtendFailed {
                    table: *table,
                    batch,
                    attempts: exhausted.attempts,
                    last: Box::new(exhausted.last),
                })?;
        }
        Ok(())
    }

    async fn extend_batch(
        &self,
        table: &Pubkey,
        chunk: &[Pubkey],
        attempt: u32,
    ) -> Result {
        if attempt == 0 {
            return self.service.extend(table, chunk).await;
        }
        let present: HashSet<Pubkey> = self
            .service
            .fetch(table)
            .await?
            .map(|account| account.addresses.into_iter().collect())
            .unwrap_or_default();
        let missing: Vec<Pubkey> = chunk
            .iter()
            .filter(|addr| !present.contains(addr))
            .copied()
            .collect();
        if missing.is_empty() {
            tracing::info!(%table, attempt, "batch already in lookup table");
            return Ok(());
        }
        self.service.extend(table, &missing).await
    }

    /// Polls table until it contains all of `addresses` or the number of
    /// them present stops changing.
    ///
    /// Only distinct requested addresses are counted.  A retried extend may
    /// have left duplicates which mustn’t make the table look complete.
    async fn await_ready(
        &self,
        table: &Pubkey,
        addresses: &[Pubkey],
    ) -> Result<AddressLookupTableAccount> {
        let wanted: HashSet<&Pubkey> = addresses.iter().collect();
        let expected = wanted.len();
        let present = |account: &AddressLookupTableAccount| {
            account
                .addresses
                .iter()
                .filter(|addr| wanted.contains(addr))
                .collect::<HashSet<_>>()
                .len()
        };
        let stable_polls = self.policy.stable_polls;
        let mut last_count = 0;
        let mut stable = 0;
        let accept = |res: &Result<Option<AddressLookupTableAccount>>| {
            let count = match res {
                Ok(Some(account)) => present(account),
                Ok(None) => return false,
                Err(err) => {
                    tracing::warn!(%table, %err, "failed fetching lookup table");
                    return false;
                }
            };
            tracing::debug!(%table, count, expected, "lookup table propagation");
            if count == last_count {
                stable += 1;
            } else {
                stable = 0;
            }
            last_count = count;
            count >= expected || (count > 0 && stable >= stable_polls)
        };
        let res = self
            .policy
            .propagation
            .poll("lookup table propagation", |_| self.service.fetch(table), accept)
            .await;
        let account = match res {
            Ok(res) => res?.ok_or(Error::TableNotReady {
                table: *table,
                observed: 0,
                expected,
            })?,
            Err(exhausted) => {
                let last = exhausted.last.ok().flatten();
                let observed = last.as_ref().map_or(0, present);
                match last {
                    Some(account) if self.policy.accept_partial && observed > 0 => {
                        tracing::warn!(%table, observed, expected, "using incomplete lookup table");
                        account
                    }
                    _ => {
                        return Err(Error::TableNotReady {
                            table: *table,
                            observed,
                            expected,
                        })
                    }
                }
            }
        };
        let observed = present(&account);
        if observed < expected {
            tracing::warn!(
                %table,
                observed,
                expected,
                "lookup table stopped growing before receiving all addresses"
            );
        }
        Ok(account)
    }
}

/// Removes duplicates keeping first occurrences in order.
fn dedup(addresses: &[Pubkey]) -> Vec<Pubkey> {
    let mut seen = HashSet::with_capacity(addresses.len());
    addresses.iter().copied().filter(|addr| seen.insert(*addr)).collect()
}


/// Table service sending create and extend transactions to the cluster.
///
/// `authority` owns the tables and pays for them.
pub struct RpcTableService<'a> {
    submitter: &'a Submitter<'a>,
    authority: &'a (dyn Signer + Sync),
    unit_price: u64,
}

impl<'a> RpcTableService<'a> {
    const UNIT_LIMIT: u32 = 200_000;

    pub fn new(
        submitter: &'a Submitter<'a>,
        authority: &'a (dyn Signer + Sync),
        unit_price: u64,
    ) -> Self {
        Self { submitter, authority, unit_price }
    }

    async fn execute(&self, what: &str, ix: solana_program::instruction::Instruction) -> Result {
        let payer = self.authority.pubkey();
        let ixs = Plan::new(Self::UNIT_LIMIT, self.unit_price, vec![ix])
            .into_instructions();
        let blockhash = self.submitter.chain().get_latest_blockhash().await?;
        let tx = transaction::compile(&payer, &ixs, &[], blockhash)?
            .sign(&[self.authority])?;
        match self.submitter.submit_direct(&tx).await? {
            Confirmation::Confirmed { signature } => {
                tracing::debug!(what, %signature, "lookup table transaction confirmed");
                Ok(())
            }
            Confirmation::Unconfirmed { signature } => {
                Err(Error::NotConfirmed(signature))
            }
        }
    }
}

#[async_trait::async_trait]
impl TableService for RpcTableService<'_> {
    async fn create(&self) -> Result<Pubkey> {
        let authority = self.authority.pubkey();
        let slot = self.submitter.chain().get_slot().await?;
        let (ix, table) = create_lookup_table(authority, authority, slot);
        self.execute("create", ix).await?;
        Ok(table)
    }

    async fn extend(&self, table: &Pubkey, addresses: &[Pubkey]) -> Result {
        let authority = self.authority.pubkey();
        let ix = extend_lookup_table(
            *table,
            authority,
            Some(authority),
            addresses.to_vec(),
        );
        self.execute("extend", ix).await
    }

    async fn fetch(
        &self,
        table: &Pubkey,
    ) -> Result<Option<AddressLookupTableAccount>> {
        let Some(account) = self.submitter.chain().get_account(table).await?
        else {
            return Ok(None);
        };
        let state = AddressLookupTable::deserialize(&account.data).map_err(
            |err| Error::Decode { account: *table, reason: err.to_string() },
        )?;
        Ok(Some(AddressLookupTableAccount {
            key: *table,
            addresses: state.addresses.to_vec(),
        }))
    }
}
