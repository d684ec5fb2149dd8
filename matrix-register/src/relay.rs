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

//! Submission of transaction bundles through a block engine relay.

use base64::Engine;
use serde::Deserialize;
use solana_sdk::transaction::VersionedTransaction;

use crate::config::RelayConfig;
use crate::{Error, Result};


/// State of a submitted bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BundleState {
    /// Relay doesn’t know the bundle’s fate (yet).
    Pending,
    Landed,
    Failed(String),
}

/// Relay accepting transaction bundles.
#[async_trait::async_trait]
pub trait BundleRelay: Send + Sync {
    /// Submits transactions as a single bundle; returns bundle id.
    async fn send_bundle(&self, txs: &[VersionedTransaction]) -> Result<String>;

    async fn bundle_state(&self, bundle_id: &str) -> Result<BundleState>;
}


/// Jito block engine JSON-RPC client.
pub struct JitoRelay {
    http: reqwest::Client,
    endpoint: String,
}

impl JitoRelay {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/api/v1/bundles", config.url.trim_end_matches('/')),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response: RpcResponse<T> = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response.into_result(method)
    }
}

#[async_trait::async_trait]
impl BundleRelay for JitoRelay {
    async fn send_bundle(&self, txs: &[VersionedTransaction]) -> Result<String> {
        let bundle_id: String = self.call("sendBundle", bundle_params(txs)?).await?;
        tracing::info!(%bundle_id, "bundle accepted by relay");
        Ok(bundle_id)
    }

    async fn bundle_state(&self, bundle_id: &str) -> Result<BundleState> {
        let statuses: BundleStatuses = self
            .call("getBundleStatuses", serde_json::json!([[bundle_id]]))
            .await?;
        Ok(statuses.state())
    }
}

/// Returns `sendBundle` parameters carrying base64-encoded transactions.
fn bundle_params(txs: &[VersionedTransaction]) -> Result<serde_json::Value> {
    let encoded = txs
        .iter()
        .map(|tx| {
            let bytes = bincode::serialize(tx)?;
            Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(serde_json::json!([encoded, { "encoding": "base64" }]))
}


#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl<T> RpcResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        if let Some(err) = self.error {
            return Err(Error::RelayRejected(format!(
                "{method}: {} ({})",
                err.message, err.code
            )));
        }
        self.result
            .ok_or_else(|| Error::RelayRejected(format!("{method}: empty result")))
    }
}

#[derive(Deserialize)]
struct BundleStatuses {
    value: Vec<Option<BundleStatus>>,
}

#[derive(Deserialize)]
struct BundleStatus {
    confirmation_status: Option<String>,
    /// `{"Ok": null}` on success.
    err: Option<serde_json::Value>,
}

impl BundleStatuses {
    fn state(&self) -> BundleState {
        let Some(Some(status)) = self.value.first() else {
            return BundleState::Pending;
        };
        match &status.err {
            Some(err) if !err.is_null() && err.get("Ok").is_none() => {
                return BundleState::Failed(err.to_string());
            }
            _ => (),
        }
        match status.confirmation_status.as_deref() {
            Some("confirmed" | "finalized") => BundleState::Landed,
            _ => BundleState::Pending,
        }
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use solana_sdk::hash::Hash;
    use solana_sdk::signer::keypair::Keypair;
    use solana_sdk::signer::Signer;

    use super::*;

    fn state(json: &str) -> BundleState {
        let response: RpcResponse<BundleStatuses> =
            serde_json::from_str(json).unwrap();
        response.into_result("getBundleStatuses").unwrap().state()
    }

    #[test]
    fn test_bundle_state() {
        assert_eq!(
            BundleState::Pending,
            state(r#"{"result": {"context": {"slot": 1}, "value": [null]}}"#)
        );
        assert_eq!(
            BundleState::Pending,
            state(r#"{"result": {"value": [{"confirmation_status": "processed", "err": {"Ok": null}}]}}"#)
        );
        assert_eq!(
            BundleState::Landed,
            state(r#"{"result": {"value": [{"bundle_id": "x", "slot": 5, "confirmation_status": "finalized", "err": {"Ok": null}}]}}"#)
        );
        assert_eq!(
            BundleState::Failed(r#"{"Err":"BundleDropped"}"#.into()),
            state(r#"{"result": {"value": [{"confirmation_status": "confirmed", "err": {"Err": "BundleDropped"}}]}}"#)
        );
    }

    #[test]
    fn test_rpc_error() {
        let response: RpcResponse<String> = serde_json::from_str(
            r#"{"error": {"code": -32602, "message": "bundle invalid"}}"#,
        )
        .unwrap();
        assert!(matches!(
            response.into_result("sendBundle"),
            Err(Error::RelayRejected(msg)) if msg.contains("bundle invalid")
        ));
    }

    #[test]
    fn test_bundle_params() {
        let payer = Keypair::new();
        let ix = solana_system_interface::instruction::transfer(
            &payer.pubkey(),
            &payer.pubkey(),
            1,
        );
        let message = solana_sdk::message::v0::Message::try_compile(
            &payer.pubkey(),
            &[ix],
            &[],
            Hash::new_unique(),
        )
        .unwrap();
        let tx = VersionedTransaction::try_new(
            solana_sdk::message::VersionedMessage::V0(message),
            &[&payer],
        )
        .unwrap();

        let params = bundle_params(core::slice::from_ref(&tx)).unwrap();
        assert_eq!("base64", params[1]["encoding"]);
        let encoded = params[0][0].as_str().unwrap();
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
        let decoded: VersionedTransaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(tx, decoded);
    }
}
