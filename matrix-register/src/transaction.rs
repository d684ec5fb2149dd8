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

//! Building of version 0 transactions.

use solana_program::instruction::Instruction;
use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::hash::Hash;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::packet::PACKET_DATA_SIZE;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;

use crate::chain::Chain;
use crate::{pda, Error, Result};


/// Instructions of a transaction grouped by purpose.
///
/// [`Self::into_instructions`] orders them as: compute unit limit, compute
/// unit price, setup, main instructions and finally the tip.
#[derive(Clone, Debug, Default)]
pub struct Plan {
    pub unit_limit: u32,
    /// Compute unit price in micro-lamports.
    pub unit_price: u64,
    /// Instructions creating accounts the main instructions need.
    pub setup: Vec<Instruction>,
    pub main: Vec<Instruction>,
    /// Transfer to the relay’s tip account.
    pub tip: Option<Instruction>,
}

impl Plan {
    pub fn new(unit_limit: u32, unit_price: u64, main: Vec<Instruction>) -> Self {
        Self { unit_limit, unit_price, setup: Vec::new(), main, tip: None }
    }

    pub fn into_instructions(self) -> Vec<Instruction> {
        let mut ixs = Vec::with_capacity(
            2 + self.setup.len() + self.main.len() + usize::from(self.tip.is_some()),
        );
        ixs.extend(compute_budget(self.unit_limit, self.unit_price));
        ixs.extend(self.setup);
        ixs.extend(self.main);
        ixs.extend(self.tip);
        ixs
    }
}

/// Returns instructions setting compute unit limit and price.
pub fn compute_budget(limit: u32, price: u64) -> [Instruction; 2] {
    [
        ComputeBudgetInstruction::set_compute_unit_limit(limit),
        ComputeBudgetInstruction::set_compute_unit_price(price),
    ]
}

/// Returns instructions creating `owner`’s associated token accounts for
/// those of `mints` which don’t exist yet.  `payer` funds the accounts.
pub async fn token_account_setup(
    chain: &dyn Chain,
    payer: &Pubkey,
    owner: &Pubkey,
    mints: &[Pubkey],
) -> Result<Vec<Instruction>> {
    let mut ixs = Vec::new();
    for mint in mints {
        let address = pda::token_account(owner, mint);
        if chain.get_account(&address).await?.is_some() {
            continue;
        }
        tracing::info!(%address, %mint, "token account missing; creating");
        ixs.push(
            spl_associated_token_account_client::instruction::create_associated_token_account_idempotent(
                payer,
                owner,
                mint,
                &pda::TOKEN_PROGRAM_ID,
            ),
        );
    }
    Ok(ixs)
}

/// Returns instruction transferring relay tip.
pub fn tip_instruction(payer: &Pubkey, tip_account: &Pubkey, lamports: u64) -> Instruction {
    solana_system_interface::instruction::transfer(payer, tip_account, lamports)
}


/// Compiled transaction which fits in a packet and awaits signatures.
#[derive(Clone, Debug)]
pub struct PendingTransaction {
    message: VersionedMessage,
    size: usize,
}

impl PendingTransaction {
    /// Serialised size of the transaction once signed.
    pub fn size(&self) -> usize { self.size }

    pub fn message(&self) -> &VersionedMessage { &self.message }

    pub fn sign(self, signers: &[&dyn Signer]) -> Result<VersionedTransaction> {
        Ok(VersionedTransaction::try_new(self.message, signers)?)
    }
}

/// Compiles version 0 message referencing accounts through `tables` and
/// checks that the signed transaction would fit in a packet.
pub fn compile(
    payer: &Pubkey,
    ixs: &[Instruction],
    tables: &[AddressLookupTableAccount],
    blockhash: Hash,
) -> Result<PendingTransaction> {
    let message = v0::Message::try_compile(payer, ixs, tables, blockhash)?;
    let message = VersionedMessage::V0(message);
    let signatures = usize::from(message.header().num_required_signatures);
    let size = bincode::serialized_size(&VersionedTransaction {
        signatures: vec![Signature::default(); signatures],
        message: message.clone(),
    })?;
    let size = usize::try_from(size).unwrap_or(usize::MAX);
    if size > PACKET_DATA_SIZE {
        return Err(Error::TransactionTooLarge { size, limit: PACKET_DATA_SIZE });
    }
    tracing::debug!(size, instructions = ixs.len(), tables = tables.len(), "compiled transaction");
    Ok(PendingTransaction { message, size })
}


#[cfg(test)]
mod tests {
    use solana_program::instruction::AccountMeta;
    use solana_sdk::signer::keypair::Keypair;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testutil::FakeChain;

    fn wide_instruction(accounts: usize) -> Instruction {
        Instruction {
            program_id: Pubkey::new_unique(),
            accounts: (0..accounts)
                .map(|_| AccountMeta::new(Pubkey::new_unique(), false))
                .collect(),
            data: vec![1; 16],
        }
    }

    #[test]
    fn test_instruction_order() {
        let payer = Pubkey::new_unique();
        let main = wide_instruction(1);
        let setup = wide_instruction(2);
        let tip = tip_instruction(&payer, &Pubkey::new_unique(), 1000);
        let plan = Plan {
            setup: vec![setup.clone()],
            tip: Some(tip.clone()),
            ..Plan::new(1_400_000, 250_000, vec![main.clone()])
        };
        let ixs = plan.into_instructions();
        let [limit, price] = compute_budget(1_400_000, 250_000);
        assert_eq!(vec![limit, price, setup, main, tip], ixs);
    }

    #[test]
    fn test_compile_and_sign() {
        let payer = Keypair::new();
        let ixs = Plan::new(1000, 1, vec![wide_instruction(5)]).into_instructions();
        let pending =
            compile(&payer.pubkey(), &ixs, &[], Hash::new_unique()).unwrap();
        let size = pending.size();
        let tx = pending.sign(&[&payer]).unwrap();
        assert_eq!(size, bincode::serialized_size(&tx).unwrap() as usize);
        assert!(tx.verify_with_results().iter().all(|ok| *ok));
    }

    #[test]
    fn test_too_large_without_table() {
        let payer = Pubkey::new_unique();
        let ixs = vec![wide_instruction(45)];
        let err = compile(&payer, &ixs, &[], Hash::new_unique()).unwrap_err();
        assert!(matches!(
            err,
            Error::TransactionTooLarge { size, limit: PACKET_DATA_SIZE }
                if size > PACKET_DATA_SIZE
        ));
    }

    #[test]
    fn test_fits_with_table() {
        let payer = Pubkey::new_unique();
        let ix = wide_instruction(45);
        let table = AddressLookupTableAccount {
            key: Pubkey::new_unique(),
            addresses: ix.accounts.iter().map(|meta| meta.pubkey).collect(),
        };
        let pending =
            compile(&payer, &[ix], &[table], Hash::new_unique()).unwrap();
        assert!(pending.size() <= PACKET_DATA_SIZE);
        match pending.message() {
            VersionedMessage::V0(msg) => {
                assert_eq!(1, msg.address_table_lookups.len());
                assert_eq!(45, msg.address_table_lookups[0].writable_indexes.len());
            }
            VersionedMessage::Legacy(_) => panic!("expected v0 message"),
        }
    }

    #[tokio::test]
    async fn test_token_account_setup() {
        let chain = FakeChain::default();
        let owner = Pubkey::new_unique();
        let existing = Pubkey::new_unique();
        let missing = Pubkey::new_unique();
        chain.put_data(
            pda::token_account(&owner, &existing),
            pda::TOKEN_PROGRAM_ID,
            vec![0; 165],
        );
        let ixs = token_account_setup(&chain, &owner, &owner, &[existing, missing])
            .await
            .unwrap();
        assert_eq!(1, ixs.len());
        assert_eq!(spl_associated_token_account_client::program::ID, ixs[0].program_id);
        assert_eq!(pda::token_account(&owner, &missing), ixs[0].accounts[1].pubkey);
        // `CreateIdempotent` so that an account created meanwhile is fine.
        assert_eq!(vec![1], ixs[0].data);
    }
}
