use crate::amount::Amount;
use crate::error::EngineError;
use crate::outputs::OutputPager;
use crate::sequencer::{OutputQuery, SequencerApi};
use crate::types::{Hash, OutputState, UnspentOutput};
use std::collections::BTreeMap;

/// Running per-asset totals over unspent outputs.
#[derive(Default, Debug, Clone)]
pub struct BalanceAccumulator {
    balance_by_asset: BTreeMap<Hash, Amount>,
    outputs_by_asset: BTreeMap<Hash, usize>,
}

impl BalanceAccumulator {
    pub fn add_outputs(&mut self, outputs: &[UnspentOutput]) -> Result<(), EngineError> {
        for output in outputs.iter().filter(|o| o.state == OutputState::Unspent) {
            let balance = self.balance_by_asset.entry(output.asset).or_default();
            *balance = balance.checked_add(&output.amount).ok_or_else(|| {
                EngineError::MalformedResponse(format!(
                    "balance of asset {} overflows at output {}",
                    output.asset, output.output_id
                ))
            })?;
            *self.outputs_by_asset.entry(output.asset).or_default() += 1;
        }
        Ok(())
    }

    pub fn get_balance(&self, asset: &Hash) -> Amount {
        self.balance_by_asset
            .get(asset)
            .cloned()
            .unwrap_or_default()
    }

    pub fn output_count(&self, asset: &Hash) -> usize {
        self.outputs_by_asset.get(asset).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.balance_by_asset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_balances(self) -> BTreeMap<Hash, Amount> {
        self.balance_by_asset
    }
}

async fn accumulate<A: SequencerApi + ?Sized>(
    api: &A,
    query: OutputQuery,
) -> Result<BalanceAccumulator, EngineError> {
    let mut pager = OutputPager::new(query.with_state(OutputState::Unspent));
    let mut accumulator = BalanceAccumulator::default();
    while let Some(page) = pager.next_page(api).await? {
        accumulator.add_outputs(&page)?;
    }
    Ok(accumulator)
}

/// Exact sum of every unspent output of `asset` owned by `members` at
/// `threshold`. Read-only; runs alongside in-flight spends and reflects
/// them once the sequencer does.
pub async fn compute_balance<A: SequencerApi + ?Sized>(
    api: &A,
    asset: Hash,
    members: Vec<String>,
    threshold: u8,
    page_size: usize,
) -> Result<Amount, EngineError> {
    let accumulator = accumulate(
        api,
        OutputQuery::new(members, threshold, page_size).with_asset(asset),
    )
    .await?;
    let balance = accumulator.get_balance(&asset);
    tracing::debug!(
        "balance of asset {}: {} over {} outputs",
        asset,
        balance,
        accumulator.output_count(&asset)
    );
    Ok(balance)
}

/// Totals for every asset held by `members` at `threshold`, in one scan.
pub async fn balances_by_asset<A: SequencerApi + ?Sized>(
    api: &A,
    members: Vec<String>,
    threshold: u8,
    page_size: usize,
) -> Result<BTreeMap<Hash, Amount>, EngineError> {
    let accumulator = accumulate(api, OutputQuery::new(members, threshold, page_size)).await?;
    Ok(accumulator.into_balances())
}
