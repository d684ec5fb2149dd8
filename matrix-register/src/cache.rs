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

//! Cache of address lookup tables created for a wallet.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;


/// Cached address lookup table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedTable {
    #[serde(with = "crate::config::base58")]
    pub address: Pubkey,
    pub created: DateTime<Utc>,
    /// Number of addresses the table was extended with.
    pub address_count: usize,
}

#[derive(Debug, derive_more::Display)]
pub enum CacheError {
    #[display("no cached table")]
    Miss,
    #[display("corrupt cache record: {_0}")]
    Corrupt(String),
    #[display("{_0}")]
    Io(std::io::Error),
}

impl std::error::Error for CacheError {}


/// Storage of lookup tables keyed by the owning wallet.
///
/// Failures are never fatal to a registration; the worst case is creating
/// a fresh table.
pub trait TableCache: Send + Sync {
    fn get(&self, owner: &Pubkey) -> Result<CachedTable, CacheError>;
    fn put(&self, owner: &Pubkey, table: &CachedTable) -> Result<(), CacheError>;
}


/// Cache keeping one JSON file per owner in a directory.
///
/// The file is named `.alt-cache-<prefix>.json` where prefix is the first
/// eight characters of owner’s base58 address.
#[derive(Clone, Debug)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    pub fn path(&self, owner: &Pubkey) -> PathBuf {
        let owner = owner.to_string();
        let prefix = owner.get(..8).unwrap_or(&owner);
        self.dir.join(format!(".alt-cache-{prefix}.json"))
    }
}

impl TableCache for FileCache {
    fn get(&self, owner: &Pubkey) -> Result<CachedTable, CacheError> {
        let data = match std::fs::read(self.path(owner)) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::Miss)
            }
            Err(err) => return Err(CacheError::Io(err)),
        };
        serde_json::from_slice(&data)
            .map_err(|err| CacheError::Corrupt(err.to_string()))
    }

    fn put(&self, owner: &Pubkey, table: &CachedTable) -> Result<(), CacheError> {
        let data = serde_json::to_vec_pretty(table)
            .map_err(|err| CacheError::Corrupt(err.to_string()))?;
        std::fs::write(self.path(owner), data).map_err(CacheError::Io)
    }
}
