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

//! Registration configuration.
//!
//! [`Config`] is read once from a JSON file and then passed by reference to
//! every component.  Only `programId` and `stateAddress` are required; all
//! other fields default to the devnet deployment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::record::SlotVariant;
use crate::Result;


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Address of the referral matrix program.
    #[serde(with = "base58")]
    pub program_id: Pubkey,

    /// Address of the matrix program’s state account.
    #[serde(with = "base58")]
    pub state_address: Pubkey,

    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default)]
    pub cluster: Cluster,

    #[serde(default)]
    pub addresses: VerifiedAddresses,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub compute: ComputeConfig,

    /// Bundle relay settings.  Ignored unless `cluster` is `mainnet-beta`.
    #[serde(default)]
    pub relay: Option<RelayConfig>,

    /// Directory holding address lookup table cache files.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Whether to use an address lookup table which hasn’t received all
    /// addresses once propagation polling gives up.
    #[serde(default)]
    pub accept_partial_table: bool,

    /// Lamports the wallet must hold on top of the deposit to cover fees,
    /// rent and the table.
    #[serde(default = "default_reserve_lamports")]
    pub reserve_lamports: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    #[default]
    Devnet,
    MainnetBeta,
    Localnet,
}

/// Fixed protocol accounts the matrix program checks against its own
/// hard-coded list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerifiedAddresses {
    #[serde(with = "base58")]
    pub pool: Pubkey,
    #[serde(with = "base58")]
    pub a_vault: Pubkey,
    #[serde(with = "base58")]
    pub a_vault_lp: Pubkey,
    #[serde(with = "base58")]
    pub a_vault_lp_mint: Pubkey,
    #[serde(with = "base58")]
    pub a_token_vault: Pubkey,
    #[serde(with = "base58")]
    pub b_vault: Pubkey,
    #[serde(with = "base58")]
    pub b_token_vault: Pubkey,
    #[serde(with = "base58")]
    pub b_vault_lp_mint: Pubkey,
    #[serde(with = "base58")]
    pub b_vault_lp: Pubkey,
    #[serde(with = "base58")]
    pub token_mint: Pubkey,
    #[serde(with = "base58")]
    pub wsol_mint: Pubkey,
    #[serde(with = "base58")]
    pub vault_program: Pubkey,
    #[serde(with = "base58")]
    pub amm_program: Pubkey,
    #[serde(with = "base58")]
    pub protocol_token_fee: Pubkey,
    #[serde(with = "base58")]
    pub chainlink_program: Pubkey,
    #[serde(with = "base58")]
    pub sol_usd_feed: Pubkey,
}

/// Airdrop ledger program settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerConfig {
    #[serde(with = "base58")]
    pub program_id: Pubkey,
    /// Number of periods after which the ledger stops counting.
    pub max_periods: u8,
    /// Length of a single period in seconds.
    pub period_seconds: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComputeConfig {
    /// Compute unit limit for the first and second slot.
    pub unit_limit: u32,
    /// Compute unit limit for the third slot which pays the upline.
    pub completion_unit_limit: u32,
    /// Compute unit price in micro-lamports.
    pub unit_price: u64,
    pub ledger_registration_unit_limit: u32,
    pub ledger_registration_unit_price: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Block engine base URL; bundles are posted to `<url>/api/v1/bundles`.
    #[serde(default = "default_relay_url")]
    pub url: String,
    #[serde(default = "default_tip_lamports")]
    pub tip_lamports: u64,
    #[serde(default = "default_tip_accounts", with = "base58::seq")]
    pub tip_accounts: Vec<Pubkey>,
}


impl Config {
    /// Constructs configuration with defaults for everything but the
    /// program addresses.
    pub fn new(program_id: Pubkey, state_address: Pubkey) -> Self {
        Self {
            program_id,
            state_address,
            rpc_url: default_rpc_url(),
            cluster: Cluster::default(),
            addresses: VerifiedAddresses::default(),
            ledger: LedgerConfig::default(),
            compute: ComputeConfig::default(),
            relay: None,
            cache_dir: default_cache_dir(),
            accept_partial_table: false,
            reserve_lamports: default_reserve_lamports(),
        }
    }

    /// Reads configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result {
        if self.ledger.max_periods == 0 {
            return Err(crate::Error::Config("ledger.maxPeriods is zero".into()));
        }
        if self.ledger.period_seconds <= 0 {
            return Err(crate::Error::Config(
                "ledger.periodSeconds must be positive".into(),
            ));
        }
        if self.relay.as_ref().is_some_and(|relay| relay.tip_accounts.is_empty())
        {
            return Err(crate::Error::Config("relay.tipAccounts is empty".into()));
        }
        Ok(())
    }

    /// Returns relay settings if the relay should be used on the configured
    /// cluster.
    pub fn active_relay(&self) -> Option<&RelayConfig> {
        self.relay.as_ref().filter(|_| self.cluster == Cluster::MainnetBeta)
    }

    /// Compute unit limit for registration filling given slot.
    pub fn unit_limit(&self, variant: SlotVariant) -> u32 {
        match variant {
            SlotVariant::Third => self.compute.completion_unit_limit,
            SlotVariant::First | SlotVariant::Second => self.compute.unit_limit,
        }
    }
}

impl Default for VerifiedAddresses {
    /// Returns the devnet deployment.
    fn default() -> Self {
        use solana_sdk::pubkey;
        Self {
            pool: pubkey!("FrQ5KsAgjCe3FFg6ZENri8feDft54tgnATxyffcasuxU"),
            a_vault: pubkey!("4ndfcH16GKY76bzDkKfyVwHMoF8oY75KES2VaAhUYksN"),
            a_vault_lp: pubkey!("CocstBGbeDVyTJWxbWs4docwWapVADAo1xXQSh9RfPMz"),
            a_vault_lp_mint: pubkey!(
                "6f2FVX5UT5uBtgknc8fDj119Z7DQoLJeKRmBq7j1zsVi"
            ),
            a_token_vault: pubkey!(
                "6m1wvYoPrwjAnbuGMqpMoodQaq4VnZXRjrzufXnPSjmj"
            ),
            b_vault: pubkey!("FERjPVNEa7Udq8CEv68h6tPL46Tq7ieE49HrE2wea3XT"),
            b_token_vault: pubkey!(
                "HZeLxbZ9uHtSpwZC3LBr4Nubd14iHwz7bRSghRZf5VCG"
            ),
            b_vault_lp_mint: pubkey!(
                "BvoAjwEDhpLzs3jtu4H72j96ShKT5rvZE9RP1vgpfSM"
            ),
            b_vault_lp: pubkey!("HJNs8hPTzs9i6AVFkRDDMFVEkrrUoV7H7LDZHdCWvxn7"),
            token_mint: pubkey!("F1vCKXMix75KigbwZUXkVU97NiE1H2ToopttH67ydqvq"),
            wsol_mint: pubkey!("So11111111111111111111111111111111111111112"),
            vault_program: pubkey!(
                "24Uqj9JCLxUeoC3hGfh5W3s9FM9uCHDS2SG3LYwBpyTi"
            ),
            amm_program: pubkey!("Eo7WjKq67rjJQSZxS6z3YkapzY3eMj6Xy8X5EQVn5UaB"),
            protocol_token_fee: pubkey!(
                "88fLv3iEY7ubFCjwCzfzA7FsPG8xSBFicSPS8T8fX4Kq"
            ),
            chainlink_program: pubkey!(
                "HEvSKofvBgfaexv23kMabbYqxasxU3mQ4ibBMEmJWHny"
            ),
            sol_usd_feed: pubkey!(
                "99B2bTijsU6f1GCT73HmdR7HCFFjGMBcPZY6jZ96ynrR"
            ),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            program_id: solana_sdk::pubkey!(
                "BQy1rRHFACsvMvccCptTiHgK7Kv8fWvMRp6g2optDHHT"
            ),
            max_periods: 36,
            period_seconds: 7 * 24 * 60 * 60,
        }
    }
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            unit_limit: 1_000_000,
            completion_unit_limit: 1_400_000,
            unit_price: 250_000,
            ledger_registration_unit_limit: 200_000,
            ledger_registration_unit_price: 50_000,
        }
    }
}

fn default_rpc_url() -> String { "https://api.devnet.solana.com".into() }
fn default_cache_dir() -> PathBuf { PathBuf::from(".") }
fn default_reserve_lamports() -> u64 { 50_000_000 }
fn default_relay_url() -> String {
    "https://frankfurt.mainnet.block-engine.jito.wtf".into()
}
fn default_tip_lamports() -> u64 { 10_000 }

fn default_tip_accounts() -> Vec<Pubkey> {
    [
        "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5",
        "HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe",
        "Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY",
        "ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49",
        "DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh",
        "ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt",
        "DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL",
        "3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT",
    ]
    .into_iter()
    .filter_map(|key| key.parse().ok())
    .collect()
}


/// (De)serialises public keys as base58 strings.
pub(crate) mod base58 {
    use core::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;

    pub fn serialize<S: Serializer>(
        key: &Pubkey,
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        ser.collect_str(key)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<Pubkey, D::Error> {
        let key = String::deserialize(de)?;
        Pubkey::from_str(&key).map_err(serde::de::Error::custom)
    }

    pub mod seq {
        use serde::ser::SerializeSeq;

        use super::*;

        pub fn serialize<S: Serializer>(
            keys: &[Pubkey],
            ser: S,
        ) -> Result<S::Ok, S::Error> {
            let mut seq = ser.serialize_seq(Some(keys.len()))?;
            for key in keys {
                seq.serialize_element(&key.to_string())?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            de: D,
        ) -> Result<Vec<Pubkey>, D::Error> {
            Vec::<String>::deserialize(de)?
                .iter()
                .map(|key| Pubkey::from_str(key))
                .collect::<Result<_, _>>()
                .map_err(serde::de::Error::custom)
        }
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_minimal_config() {
        let program = Pubkey::new_unique();
        let state = Pubkey::new_unique();
        let json = format!(
            r#"{{"programId": "{program}", "stateAddress": "{state}"}}"#
        );
        let config: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(Config::new(program, state), config);
        assert_eq!(None, config.active_relay());
    }

    #[test]
    fn test_relay_only_on_mainnet() {
        let program = Pubkey::new_unique();
        let state = Pubkey::new_unique();
        let json = format!(
            r#"{{
                "programId": "{program}",
                "stateAddress": "{state}",
                "cluster": "mainnet-beta",
                "relay": {{"tipLamports": 5000}},
                "ledger": {{"maxPeriods": 12}}
            }}"#
        );
        let mut config: Config = serde_json::from_str(&json).unwrap();
        config.validate().unwrap();
        let relay = config.active_relay().unwrap();
        assert_eq!(5000, relay.tip_lamports);
        assert_eq!(8, relay.tip_accounts.len());
        assert_eq!(12, config.ledger.max_periods);
        assert_eq!(7 * 24 * 60 * 60, config.ledger.period_seconds);

        config.cluster = Cluster::Devnet;
        assert_eq!(None, config.active_relay());
    }

    #[test]
    fn test_bad_pubkey() {
        let json = r#"{"programId": "nope", "stateAddress": "nope"}"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn test_unit_limit() {
        let config = Config::new(Pubkey::new_unique(), Pubkey::new_unique());
        assert_eq!(1_000_000, config.unit_limit(SlotVariant::First));
        assert_eq!(1_000_000, config.unit_limit(SlotVariant::Second));
        assert_eq!(1_400_000, config.unit_limit(SlotVariant::Third));
    }
}
