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

use solana_sdk::pubkey::Pubkey;

use crate::chain::Chain;
use crate::record::{ParticipantRecord, SlotVariant};
use crate::{pda, Config, Error, Result};


/// Reads participant record of given wallet.
///
/// Returns `None` if the record doesn’t exist.  An existing record is
/// returned even if it isn’t marked as registered.
pub async fn read_participant(
    chain: &dyn Chain,
    config: &Config,
    wallet: &Pubkey,
) -> Result<Option<ParticipantRecord>> {
    let address = pda::participant_record(&config.program_id, wallet);
    let Some(account) = chain.get_account(&address).await? else {
        return Ok(None);
    };
    ParticipantRecord::decode(&address, &account.data).map(Some)
}

/// Reads referrer’s record and determines which slot the new participant
/// fills.
pub async fn read_referrer(
    chain: &dyn Chain,
    config: &Config,
    wallet: &Pubkey,
) -> Result<(ParticipantRecord, SlotVariant)> {
    let record = read_participant(chain, config, wallet)
        .await?
        .filter(|record| record.is_registered)
        .ok_or(Error::ReferrerNotRegistered(*wallet))?;
    let variant = record.slot_variant()?;
    tracing::info!(
        referrer = %wallet,
        filled_slots = record.filled_slots,
        %variant,
        "read referrer"
    );
    Ok((record, variant))
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::record::testing::participant;
    use crate::testutil::{test_config, FakeChain};

    #[tokio::test]
    async fn test_read_referrer() {
        let config = test_config();
        let chain = FakeChain::default();
        let wallet = Pubkey::new_unique();
        let record = participant(wallet, 1, 1, Vec::new());
        chain.put_participant(&config, &record);

        let (got, variant) =
            read_referrer(&chain, &config, &wallet).await.unwrap();
        assert_eq!(record, got);
        assert_eq!(SlotVariant::Second, variant);
    }

    #[tokio::test]
    async fn test_referrer_not_registered() {
        let config = test_config();
        let chain = FakeChain::default();
        let wallet = Pubkey::new_unique();
        assert!(matches!(
            read_referrer(&chain, &config, &wallet).await,
            Err(Error::ReferrerNotRegistered(got)) if got == wallet
        ));

        let mut record = participant(wallet, 1, 0, Vec::new());
        record.is_registered = false;
        chain.put_participant(&config, &record);
        assert!(matches!(
            read_referrer(&chain, &config, &wallet).await,
            Err(Error::ReferrerNotRegistered(_))
        ));
        assert_eq!(
            Some(record),
            read_participant(&chain, &config, &wallet).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_invalid_slot_count() {
        let config = test_config();
        let chain = FakeChain::default();
        let wallet = Pubkey::new_unique();
        chain.put_participant(&config, &participant(wallet, 1, 3, Vec::new()));
        assert!(matches!(
            read_referrer(&chain, &config, &wallet).await,
            Err(Error::InvalidSlotCount(3))
        ));
    }
}
