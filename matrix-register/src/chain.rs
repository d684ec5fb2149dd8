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

//! Access to the cluster.

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcTransactionConfig};
use solana_sdk::account::Account;
use solana_sdk::clock::Slot;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{TransactionError, VersionedTransaction};
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    TransactionConfirmationStatus, UiTransactionEncoding,
};

use crate::Result;


/// Status of a submitted transaction as reported by signature status lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignatureState {
    /// The node doesn’t know the signature (yet).
    Unknown,
    Processed,
    /// Confirmed or finalised.
    Confirmed,
    Failed(TransactionError),
}

/// Execution result as reported by full transaction lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutedTransaction {
    pub slot: Slot,
    pub error: Option<TransactionError>,
    pub logs: Vec<String>,
}


/// Cluster operations the registration needs.
///
/// Implemented for the nonblocking [`RpcClient`].  All reads use the
/// `confirmed` commitment.
#[async_trait::async_trait]
pub trait Chain: Send + Sync {
    /// Fetches account; returns `None` if it doesn’t exist.
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>>;

    async fn get_balance(&self, address: &Pubkey) -> Result<u64>;

    async fn get_slot(&self) -> Result<Slot>;

    async fn get_latest_blockhash(&self) -> Result<Hash>;

    /// Sends transaction skipping preflight; returns its signature.
    async fn send_transaction(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Signature>;

    /// Looks up status of a transaction by its signature.
    async fn signature_state(&self, signature: &Signature)
        -> Result<SignatureState>;

    /// Fetches the whole executed transaction; returns `None` if it’s not
    /// (yet) available.
    async fn executed_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<ExecutedTransaction>>;
}


#[async_trait::async_trait]
impl Chain for RpcClient {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        let resp = self
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await?;
        Ok(resp.value)
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        let resp = self
            .get_balance_with_commitment(address, CommitmentConfig::confirmed())
            .await?;
        Ok(resp.value)
    }

    async fn get_slot(&self) -> Result<Slot> {
        Ok(self.get_slot_with_commitment(CommitmentConfig::confirmed()).await?)
    }

    async fn get_latest_blockhash(&self) -> Result<Hash> {
        let (blockhash, _) = self
            .get_latest_blockhash_with_commitment(CommitmentConfig::confirmed())
            .await?;
        Ok(blockhash)
    }

    async fn send_transaction(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            max_retries: Some(5),
            ..Default::default()
        };
        Ok(self.send_transaction_with_config(tx, config).await?)
    }

    async fn signature_state(
        &self,
        signature: &Signature,
    ) -> Result<SignatureState> {
        let resp =
            self.get_signature_statuses(core::slice::from_ref(signature)).await?;
        let Some(status) = resp.value.into_iter().next().flatten() else {
            return Ok(SignatureState::Unknown);
        };
        if let Some(err) = status.err {
            return Ok(SignatureState::Failed(TransactionError::from(err)));
        }
        Ok(match status.confirmation_status {
            Some(TransactionConfirmationStatus::Confirmed) |
            Some(TransactionConfirmationStatus::Finalized) => {
                SignatureState::Confirmed
            }
            // Nodes which don’t report confirmation status only return
            // statuses for rooted transactions.
            None if status.confirmations.is_none() => SignatureState::Confirmed,
            _ => SignatureState::Processed,
        })
    }

    async fn executed_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<ExecutedTransaction>> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        // The node reports unknown transactions as a null result which the
        // client turns into a deserialisation error.  There’s no telling it
        // apart from other failures so treat all of them as ‘not yet’.
        let resp =
            match self.get_transaction_with_config(signature, config).await {
                Ok(resp) => resp,
                Err(err) => {
                    tracing::debug!(%signature, %err, "transaction lookup failed");
                    return Ok(None);
                }
            };
        let slot = resp.slot;
        let Some(meta) = resp.transaction.meta else {
            return Ok(Some(ExecutedTransaction {
                slot,
                error: None,
                logs: Vec::new(),
            }));
        };
        let logs = match meta.log_messages {
            OptionSerializer::Some(logs) => logs,
            _ => Vec::new(),
        };
        Ok(Some(ExecutedTransaction {
            slot,
            error: meta.err.map(TransactionError::from),
            logs,
        }))
    }
}
