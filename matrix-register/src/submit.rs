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

//! Submission and confirmation of signed transactions.

use core::time::Duration;

use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

use crate::chain::{Chain, SignatureState};
#[cfg(feature = "relay")]
use crate::relay::{BundleRelay, BundleState};
use crate::retry::{Delay, Retry};
use crate::{Error, Result};


/// Outcome of a submitted transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed { signature: Signature },
    /// Confirmation polling gave up.  The transaction may still land; check
    /// the signature later.
    Unconfirmed { signature: Signature },
}

impl Confirmation {
    pub fn signature(&self) -> &Signature {
        match self {
            Self::Confirmed { signature } | Self::Unconfirmed { signature } => {
                signature
            }
        }
    }

    pub fn is_confirmed(&self) -> bool { matches!(self, Self::Confirmed { .. }) }
}


/// Sends signed transactions and waits for their confirmation.
pub struct Submitter<'a> {
    chain: &'a dyn Chain,
    #[cfg(feature = "relay")]
    relay: Option<&'a dyn BundleRelay>,
    /// Retry of the send call itself.
    pub send: Retry,
    /// Polling of transaction status.
    pub confirm: Retry,
    /// Polling of bundle status.
    pub bundle: Retry,
}

impl<'a> Submitter<'a> {
    pub fn new(chain: &'a dyn Chain) -> Self {
        Self {
            chain,
            #[cfg(feature = "relay")]
            relay: None,
            send: Retry {
                attempts: 3,
                delay: Delay::Exponential {
                    base: Duration::from_millis(500),
                    cap: Duration::from_secs(4),
                },
            },
            confirm: Retry::fixed(30, Duration::from_secs(3)),
            bundle: Retry::fixed(30, Duration::from_secs(1)),
        }
    }

    /// Routes [`Self::submit`] through `relay` first.
    #[cfg(feature = "relay")]
    pub fn with_relay(self, relay: &'a dyn BundleRelay) -> Self {
        Self { relay: Some(relay), ..self }
    }

    pub fn chain(&self) -> &'a dyn Chain { self.chain }

    /// Whether transactions submitted with [`Self::submit`] go through
    /// a relay and should therefore carry a tip.
    pub fn has_relay(&self) -> bool {
        #[cfg(feature = "relay")]
        return self.relay.is_some();
        #[cfg(not(feature = "relay"))]
        return false;
    }

    /// Submits transaction through the relay, if any, falling back to plain
    /// RPC submission.
    pub async fn submit(&self, tx: &VersionedTransaction) -> Result<Confirmation> {
        self.submit_with_fallback(tx, tx).await
    }

    /// Submits `tx` through the relay, if any.  If the relay fails or the
    /// bundle doesn’t land, sends `fallback` via RPC instead.
    ///
    /// `fallback` is normally the same call without the relay tip.
    #[cfg_attr(not(feature = "relay"), allow(unused_variables))]
    pub async fn submit_with_fallback(
        &self,
        tx: &VersionedTransaction,
        fallback: &VersionedTransaction,
    ) -> Result<Confirmation> {
        #[cfg(feature = "relay")]
        {
            if let Some(relay) = self.relay {
                match self.submit_bundle(relay, tx).await {
                    Ok(Some(confirmation)) => return Ok(confirmation),
                    Ok(None) => {
                        tracing::warn!("bundle didn’t land in time; sending via RPC")
                    }
                    Err(err) => {
                        tracing::warn!(%err, "relay failed; sending via RPC")
                    }
                }
            }
        }
        self.submit_direct(fallback).await
    }

    /// Sends transaction via RPC and waits for its confirmation.
    pub async fn submit_direct(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Confirmation> {
        let signature = self
            .send
            .run("send transaction", |_| self.chain.send_transaction(tx))
            .await
            .map_err(|exhausted| exhausted.last)?;
        tracing::info!(%signature, "transaction sent");
        self.confirm(signature).await
    }

    /// Polls the cluster until transaction is confirmed, fails or polling
    /// gives up.
    pub async fn confirm(&self, signature: Signature) -> Result<Confirmation> {
        let res = self
            .confirm
            .poll(
                "confirm transaction",
                |_| self.check(&signature),
                |res| !matches!(res, Ok(false)),
            )
            .await
            .unwrap_or_else(|exhausted| exhausted.last);
        match res {
            Ok(true) => {
                tracing::info!(%signature, "transaction confirmed");
                Ok(Confirmation::Confirmed { signature })
            }
            Ok(false) => {
                tracing::warn!(%signature, "transaction not confirmed in time");
                Ok(Confirmation::Unconfirmed { signature })
            }
            Err(err) => Err(err),
        }
    }

    /// Checks transaction status first through signature status and then by
    /// fetching the transaction.  Nodes may lag each other so a status
    /// lookup can miss a transaction which another query finds.
    ///
    /// Returns `Ok(false)` if the transaction isn’t confirmed yet; lookup
    /// failures are treated the same way.  An execution failure is returned
    /// as an error.
    async fn check(&self, signature: &Signature) -> Result<bool> {
        match self.chain.signature_state(signature).await {
            Ok(SignatureState::Confirmed) => return Ok(true),
            Ok(SignatureState::Failed(error)) => {
                let logs = match self.chain.executed_transaction(signature).await {
                    Ok(Some(executed)) => executed.logs,
                    _ => Vec::new(),
                };
                return Err(Error::Execution { signature: *signature, error, logs });
            }
            Ok(SignatureState::Processed | SignatureState::Unknown) => (),
            Err(err) => tracing::debug!(%signature, %err, "status lookup failed"),
        }
        match self.chain.executed_transaction(signature).await {
            Ok(Some(executed)) => match executed.error {
                None => Ok(true),
                Some(error) => Err(Error::Execution {
                    signature: *signature,
                    error,
                    logs: executed.logs,
                }),
            },
            Ok(None) => Ok(false),
            Err(err) => {
                tracing::debug!(%signature, %err, "transaction lookup failed");
                Ok(false)
            }
        }
    }

    /// Sends transaction as a single-transaction bundle.  Returns `None` if
    /// the bundle didn’t land before polling gave up.
    #[cfg(feature = "relay")]
    async fn submit_bundle(
        &self,
        relay: &dyn BundleRelay,
        tx: &VersionedTransaction,
    ) -> Result<Option<Confirmation>> {
        let bundle_id = relay.send_bundle(core::slice::from_ref(tx)).await?;
        let state = self
            .bundle
            .poll(
                "bundle status",
                |_| relay.bundle_state(&bundle_id),
                |state| !matches!(state, Ok(BundleState::Pending) | Err(_)),
            )
            .await;
        match state {
            Ok(Ok(BundleState::Landed)) => {
                let signature = tx.signatures.first().copied().unwrap_or_default();
                tracing::info!(%bundle_id, %signature, "bundle landed");
                Ok(Some(Confirmation::Confirmed { signature }))
            }
            Ok(Ok(BundleState::Failed(reason))) => Err(Error::RelayRejected(reason)),
            _ => Ok(None),
        }
    }
}
