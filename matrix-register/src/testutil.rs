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

//! In-memory fakes of the cluster, lookup table service and cache.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use solana_sdk::account::Account;
use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::clock::Slot;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

use crate::cache::{CacheError, CachedTable, TableCache};
use crate::chain::{Chain, ExecutedTransaction, SignatureState};
use crate::lookup_table::TableService;
#[cfg(feature = "relay")]
use crate::relay::{BundleRelay, BundleState};
use crate::record::{testing, LedgerState, ParticipantRecord};
use crate::{pda, Config, Error, Result};


pub fn test_config() -> Config {
    Config::new(Pubkey::new_unique(), Pubkey::new_unique())
}


/// Cluster kept in memory.
///
/// Signature statuses and executed transactions are taken from scripts.
/// Once the status script runs out, `final_status` is reported.
pub struct FakeChain {
    pub accounts: Mutex<HashMap<Pubkey, Account>>,
    pub sent: Mutex<Vec<VersionedTransaction>>,
    pub statuses: Mutex<VecDeque<SignatureState>>,
    pub final_status: Mutex<SignatureState>,
    pub executed: Mutex<VecDeque<Option<ExecutedTransaction>>>,
    /// Number of upcoming sends which fail.
    pub send_failures: Mutex<u32>,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self {
            accounts: Default::default(),
            sent: Default::default(),
            statuses: Default::default(),
            final_status: Mutex::new(SignatureState::Confirmed),
            executed: Default::default(),
            send_failures: Mutex::new(0),
        }
    }
}

impl FakeChain {
    pub fn put_data(&self, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        let account = Account {
            lamports: 1_000_000,
            data,
            owner,
            executable: false,
            rent_epoch: 0,
        };
        self.accounts.lock().unwrap().insert(address, account);
    }

    pub fn remove(&self, address: &Pubkey) {
        self.accounts.lock().unwrap().remove(address);
    }

    pub fn set_balance(&self, address: Pubkey, lamports: u64) {
        let mut accounts = self.accounts.lock().unwrap();
        accounts
            .entry(address)
            .or_insert_with(|| Account::new(0, 0, &solana_program::system_program::ID))
            .lamports = lamports;
    }

    pub fn put_participant(&self, config: &Config, record: &ParticipantRecord) {
        let address =
            pda::participant_record(&config.program_id, &record.owner_wallet);
        let data = testing::encode_participant(record);
        self.put_data(address, config.program_id, data);
    }

    pub fn put_ledger_state(&self, config: &Config, state: &LedgerState) {
        let ledger = config.ledger.program_id;
        let data = testing::encode_ledger_state(state);
        self.put_data(pda::ledger_state(&ledger), ledger, data);
    }

    pub fn put_ledger_record(&self, config: &Config, wallet: &Pubkey) {
        let ledger = config.ledger.program_id;
        self.put_data(pda::ledger_record(&ledger, wallet), ledger, vec![1; 64]);
    }

    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = SignatureState>) {
        self.statuses.lock().unwrap().extend(statuses);
    }

    pub fn set_final_status(&self, status: SignatureState) {
        *self.final_status.lock().unwrap() = status;
    }

    pub fn sent(&self) -> Vec<VersionedTransaction> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Chain for FakeChain {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(address)
            .map_or(0, |account| account.lamports))
    }

    async fn get_slot(&self) -> Result<Slot> { Ok(42) }

    async fn get_latest_blockhash(&self) -> Result<Hash> {
        Ok(Hash::new_unique())
    }

    async fn send_transaction(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Signature> {
        {
            let mut failures = self.send_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::Io(std::io::Error::other("send failed")));
            }
        }
        self.sent.lock().unwrap().push(tx.clone());
        Ok(tx.signatures[0])
    }

    async fn signature_state(
        &self,
        _signature: &Signature,
    ) -> Result<SignatureState> {
        let next = self.statuses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.final_status.lock().unwrap().clone()))
    }

    async fn executed_transaction(
        &self,
        _signature: &Signature,
    ) -> Result<Option<ExecutedTransaction>> {
        Ok(self.executed.lock().unwrap().pop_front().flatten())
    }
}


/// Lookup table service kept in memory.
#[derive(Default)]
pub struct FakeTableService {
    pub tables: Mutex<HashMap<Pubkey, Vec<Pubkey>>>,
    pub creates: Mutex<u32>,
    /// Sizes of extend batches in call order.
    pub extends: Mutex<Vec<usize>>,
    pub create_failures: Mutex<u32>,
    /// Number of upcoming extends which land but report failure.
    pub unconfirmed_extends: Mutex<u32>,
    /// Extends with batches of this length always fail.
    pub failing_batch_len: Mutex<Option<usize>>,
    /// Number of addresses visible to consecutive fetches; once exhausted
    /// all addresses are visible.
    pub visible: Mutex<VecDeque<usize>>,
}

impl FakeTableService {
    pub fn with_table(addresses: Vec<Pubkey>) -> (Self, Pubkey) {
        let service = Self::default();
        let table = Pubkey::new_unique();
        service.tables.lock().unwrap().insert(table, addresses);
        (service, table)
    }

    pub fn creates(&self) -> u32 { *self.creates.lock().unwrap() }

    pub fn extends(&self) -> Vec<usize> { self.extends.lock().unwrap().clone() }
}

fn take_failure(counter: &Mutex<u32>) -> Result {
    let mut counter = counter.lock().unwrap();
    if *counter > 0 {
        *counter -= 1;
        return Err(Error::Io(std::io::Error::other("scripted failure")));
    }
    Ok(())
}

#[async_trait::async_trait]
impl TableService for FakeTableService {
    async fn create(&self) -> Result<Pubkey> {
        *self.creates.lock().unwrap() += 1;
        take_failure(&self.create_failures)?;
        let table = Pubkey::new_unique();
        self.tables.lock().unwrap().insert(table, Vec::new());
        Ok(table)
    }

    async fn extend(&self, table: &Pubkey, addresses: &[Pubkey]) -> Result {
        self.extends.lock().unwrap().push(addresses.len());
        if *self.failing_batch_len.lock().unwrap() == Some(addresses.len()) {
            return Err(Error::Io(std::io::Error::other("batch rejected")));
        }
        self.tables
            .lock()
            .unwrap()
            .entry(*table)
            .or_default()
            .extend_from_slice(addresses);
        let mut unconfirmed = self.unconfirmed_extends.lock().unwrap();
        if *unconfirmed > 0 {
            *unconfirmed -= 1;
            return Err(Error::NotConfirmed(Signature::default()));
        }
        Ok(())
    }

    async fn fetch(
        &self,
        table: &Pubkey,
    ) -> Result<Option<AddressLookupTableAccount>> {
        let Some(mut addresses) = self.tables.lock().unwrap().get(table).cloned()
        else {
            return Ok(None);
        };
        if let Some(visible) = self.visible.lock().unwrap().pop_front() {
            addresses.truncate(visible);
        }
        Ok(Some(AddressLookupTableAccount { key: *table, addresses }))
    }
}


/// Table cache kept in memory.
#[derive(Default)]
pub struct MemoryCache {
    pub tables: Mutex<HashMap<Pubkey, CachedTable>>,
    pub corrupt: Mutex<bool>,
}

impl TableCache for MemoryCache {
    fn get(&self, owner: &Pubkey) -> Result<CachedTable, CacheError> {
        if *self.corrupt.lock().unwrap() {
            return Err(CacheError::Corrupt("scripted".into()));
        }
        self.tables.lock().unwrap().get(owner).cloned().ok_or(CacheError::Miss)
    }

    fn put(&self, owner: &Pubkey, table: &CachedTable) -> Result<(), CacheError> {
        self.tables.lock().unwrap().insert(*owner, table.clone());
        Ok(())
    }
}


/// Relay replaying scripted bundle states; once the script runs out
/// bundles stay pending.
#[cfg(feature = "relay")]
#[derive(Default)]
pub struct FakeRelay {
    pub reject: bool,
    /// Popped from the back.
    pub states: Mutex<Vec<BundleState>>,
    pub bundles: Mutex<usize>,
}

#[cfg(feature = "relay")]
#[async_trait::async_trait]
impl BundleRelay for FakeRelay {
    async fn send_bundle(&self, txs: &[VersionedTransaction]) -> Result<String> {
        assert_eq!(1, txs.len());
        if self.reject {
            return Err(Error::RelayRejected("rate limited".into()));
        }
        *self.bundles.lock().unwrap() += 1;
        Ok("bundle".into())
    }

    async fn bundle_state(&self, _bundle_id: &str) -> Result<BundleState> {
        Ok(self.states.lock().unwrap().pop().unwrap_or(BundleState::Pending))
    }
}
