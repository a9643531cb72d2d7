use crate::amount::Amount;
use crate::config::EngineLimits;
use crate::error::EngineError;
use crate::outputs::OutputPager;
use crate::sequencer::{OutputQuery, SequencerApi};
use crate::types::{Hash, OutputState, UnspentOutput};
use itertools::Itertools;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionResult {
    pub outputs: Vec<UnspentOutput>,
    pub total: Amount,
    pub change: Amount,
}

impl SelectionResult {
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// Greedy first-fit over pages in sequence order.
///
/// Outputs are taken in the order the sequencer returns them until the
/// running total covers the target; there is no search for a smaller or
/// less wasteful subset.
#[derive(Debug)]
pub struct CoinSelector {
    desired: Amount,
    max_inputs: usize,
    selected: Vec<UnspentOutput>,
    total: Amount,
}

impl CoinSelector {
    pub fn new(desired: Amount, max_inputs: usize) -> Result<Self, EngineError> {
        if !desired.is_positive() {
            return Err(EngineError::InvalidAmount(format!(
                "desired amount must be positive, got {desired}"
            )));
        }
        if max_inputs == 0 {
            return Err(EngineError::InvalidState(
                "input ceiling must be positive".to_string(),
            ));
        }
        Ok(Self {
            desired,
            max_inputs,
            selected: vec![],
            total: Amount::zero(),
        })
    }

    pub fn is_satisfied(&self) -> bool {
        self.total >= self.desired
    }

    pub fn total(&self) -> Amount {
        self.total
    }

    /// Takes outputs from `page` in order until satisfied. Returns how many
    /// were taken.
    pub fn accept_page(&mut self, page: Vec<UnspentOutput>) -> Result<usize, EngineError> {
        let mut taken = 0;
        for output in page.into_iter() {
            if self.is_satisfied() {
                break;
            }
            self.total = self.total.checked_add(&output.amount).ok_or_else(|| {
                EngineError::MalformedResponse(format!(
                    "selected total overflows at output {}",
                    output.output_id
                ))
            })?;
            self.selected.push(output);
            taken += 1;
        }
        Ok(taken)
    }

    pub fn finish(self) -> Result<SelectionResult, EngineError> {
        if !self.is_satisfied() {
            return Err(EngineError::NotEnoughOutputs {
                available: self.total,
                required: self.desired,
            });
        }
        if self.selected.len() >= self.max_inputs {
            return Err(EngineError::MaxCountNotEnoughUtxo {
                count: self.selected.len(),
                ceiling: self.max_inputs,
            });
        }
        if !self
            .selected
            .iter()
            .map(|output| output.output_id.as_str())
            .all_unique()
        {
            return Err(EngineError::Consistency(
                "selection contains the same output twice".to_string(),
            ));
        }
        let change = self
            .total
            .checked_sub(&self.desired)
            .ok_or_else(|| EngineError::Consistency("negative change".to_string()))?;
        Ok(SelectionResult {
            outputs: self.selected,
            total: self.total,
            change,
        })
    }
}

/// Picks unspent outputs of `asset` owned solely by `user_id` that cover
/// `desired`.
///
/// Spending is only supported from the caller's own outputs; multi-member
/// receiver sets can be read but not selected from.
pub async fn select_outputs<A: SequencerApi + ?Sized>(
    api: &A,
    user_id: &str,
    asset: Hash,
    threshold: u8,
    desired: Amount,
    limits: &EngineLimits,
) -> Result<SelectionResult, EngineError> {
    if user_id.is_empty() {
        return Err(EngineError::InvalidState(
            "acting user id is empty".to_string(),
        ));
    }
    let mut selector = CoinSelector::new(desired, limits.max_inputs)?;
    let query = OutputQuery::new(vec![user_id.to_string()], threshold, limits.selection_page_size)
        .with_asset(asset)
        .with_state(OutputState::Unspent);
    let mut pager = OutputPager::new(query);

    while let Some(page) = pager.next_page(api).await? {
        selector.accept_page(page)?;
        if selector.is_satisfied() {
            break;
        }
    }

    let result = selector.finish()?;
    tracing::debug!(
        "selected {} outputs of asset {}, total: {}, change: {}",
        result.len(),
        asset,
        result.total,
        result.change
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use crate::amount::Amount;
    use crate::config::EngineLimits;
    use crate::error::EngineError;
    use crate::selection::{select_outputs, CoinSelector};
    use crate::testing::{unspent, Call, MockSequencer, ASSET, OWNER};
    use itertools::Itertools;
    use std::str::FromStr;

    fn amount(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn greedy_in_page_order() {
        let mock = MockSequencer::with_outputs(vec![
            unspent(10, "1.0", OWNER),
            unspent(11, "1.0", OWNER),
        ]);
        let result = select_outputs(&mock, OWNER, ASSET, 1, amount("1.5"), &EngineLimits::default())
            .await
            .unwrap();
        assert_eq!(
            result.outputs.iter().map(|o| o.sequence).collect::<Vec<_>>(),
            vec![10, 11]
        );
        assert_eq!(result.total, amount("2.0"));
        assert_eq!(result.change, amount("0.5"));
    }

    #[tokio::test]
    async fn stops_at_first_covering_output() {
        let mock = MockSequencer::with_outputs(vec![
            unspent(1, "3", OWNER),
            unspent(2, "100", OWNER),
            unspent(3, "1", OWNER),
        ]);
        let result = select_outputs(&mock, OWNER, ASSET, 1, amount("3"), &EngineLimits::default())
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.change.is_zero());
    }

    #[tokio::test]
    async fn stops_paging_once_covered() {
        let mock = MockSequencer::with_outputs(
            (1..=30u64).map(|i| unspent(i, "1", OWNER)).collect(),
        );
        let limits = EngineLimits {
            selection_page_size: 10,
            ..Default::default()
        };
        let result = select_outputs(&mock, OWNER, ASSET, 1, amount("15"), &limits)
            .await
            .unwrap();
        assert_eq!(result.len(), 15);
        assert_eq!(
            mock.calls(),
            vec![
                Call::ListOutputs {
                    offset: 0,
                    limit: 10
                },
                Call::ListOutputs {
                    offset: 11,
                    limit: 10
                },
            ]
        );
    }

    #[tokio::test]
    async fn insufficient_funds_is_reported_without_partial_result() {
        let mock = MockSequencer::with_outputs(vec![
            unspent(1, "1", OWNER),
            unspent(2, "2", OWNER),
        ]);
        let err = select_outputs(&mock, OWNER, ASSET, 1, amount("5"), &EngineLimits::default())
            .await
            .unwrap_err();
        match err {
            EngineError::NotEnoughOutputs {
                available,
                required,
            } => {
                assert_eq!(available, amount("3"));
                assert_eq!(required, amount("5"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn too_many_inputs_fails_even_with_enough_funds() {
        let mock = MockSequencer::with_outputs(
            (1..=300u64).map(|i| unspent(i, "0.01", OWNER)).collect(),
        );
        let err = select_outputs(&mock, OWNER, ASSET, 1, amount("2.6"), &EngineLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::MaxCountNotEnoughUtxo {
                count: 260,
                ceiling: 256
            }
        ));
    }

    #[tokio::test]
    async fn just_below_the_ceiling_succeeds() {
        let mock = MockSequencer::with_outputs(
            (1..=300u64).map(|i| unspent(i, "0.01", OWNER)).collect(),
        );
        let result = select_outputs(&mock, OWNER, ASSET, 1, amount("2.55"), &EngineLimits::default())
            .await
            .unwrap();
        assert_eq!(result.len(), 255);
        assert!(result.outputs.iter().map(|o| &o.output_id).all_unique());

        let err = select_outputs(&mock, OWNER, ASSET, 1, amount("2.56"), &EngineLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MaxCountNotEnoughUtxo { .. }));
    }

    #[tokio::test]
    async fn empty_user_fails_before_any_call() {
        let mock = MockSequencer::with_outputs(vec![unspent(1, "1", OWNER)]);
        let err = select_outputs(&mock, "", ASSET, 1, amount("1"), &EngineLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn duplicate_output_ids_abort_selection() {
        let mut twin = unspent(2, "1", OWNER);
        twin.output_id = unspent(1, "1", OWNER).output_id;
        let mock = MockSequencer::with_outputs(vec![unspent(1, "1", OWNER), twin]);
        let err = select_outputs(&mock, OWNER, ASSET, 1, amount("2"), &EngineLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Consistency(_)));
    }

    #[test]
    fn non_positive_target_is_rejected() {
        assert!(matches!(
            CoinSelector::new(Amount::zero(), 256),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn selector_leaves_rest_of_page_untouched() {
        let mut selector = CoinSelector::new(amount("2"), 256).unwrap();
        let taken = selector
            .accept_page(vec![
                unspent(1, "1", OWNER),
                unspent(2, "1", OWNER),
                unspent(3, "1", OWNER),
            ])
            .unwrap();
        assert_eq!(taken, 2);
        assert!(selector.is_satisfied());
        assert_eq!(selector.accept_page(vec![unspent(4, "1", OWNER)]).unwrap(), 0);
        let result = selector.finish().unwrap();
        assert_eq!(result.total, amount("2"));
        assert!(result.change.is_zero());
    }

    #[test]
    fn overflowing_total_is_a_malformed_response() {
        let largest = Amount::MAX.to_string();
        let mut selector = CoinSelector::new(Amount::MAX, 256).unwrap();
        let result = selector.accept_page(vec![
            unspent(1, "0.5", OWNER),
            unspent(2, &largest, OWNER),
        ]);
        assert!(matches!(result, Err(EngineError::MalformedResponse(_))));
    }
}
