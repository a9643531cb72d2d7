use crate::error::EngineError;
use crate::sequencer::{OutputQuery, SequencerApi};
use crate::types::UnspentOutput;

/// Fetches one page and checks it before anything downstream sees it.
pub async fn fetch_outputs<A: SequencerApi + ?Sized>(
    api: &A,
    query: &OutputQuery,
) -> Result<Vec<UnspentOutput>, EngineError> {
    let page = api.list_outputs(query).await?;
    validate_page(query, &page)?;
    tracing::debug!(
        "fetched outputs page, offset: {}, limit: {}, returned: {}",
        query.offset,
        query.limit,
        page.len()
    );
    Ok(page)
}

pub(crate) fn validate_page(query: &OutputQuery, page: &[UnspentOutput]) -> Result<(), EngineError> {
    if page.len() > query.limit {
        return Err(EngineError::MalformedResponse(format!(
            "page holds {} outputs, limit was {}",
            page.len(),
            query.limit
        )));
    }

    let mut previous: Option<u64> = None;
    for output in page.iter() {
        output.validate()?;
        if output.sequence < query.offset {
            return Err(EngineError::MalformedResponse(format!(
                "output {} has sequence {} below offset {}",
                output.output_id, output.sequence, query.offset
            )));
        }
        if previous.map_or(false, |previous| output.sequence <= previous) {
            return Err(EngineError::MalformedResponse(format!(
                "output {} breaks ascending sequence order",
                output.output_id
            )));
        }
        if query.state.map_or(false, |state| state != output.state) {
            return Err(EngineError::MalformedResponse(format!(
                "output {} has state {:?}, requested {:?}",
                output.output_id, output.state, query.state
            )));
        }
        if query.asset.map_or(false, |asset| asset != output.asset) {
            return Err(EngineError::MalformedResponse(format!(
                "output {} belongs to asset {}",
                output.output_id, output.asset
            )));
        }
        previous = Some(output.sequence);
    }
    Ok(())
}

/// Resumable walk over all outputs matching a query.
///
/// Each page starts strictly after the highest sequence seen so far, so
/// outputs written concurrently are neither skipped nor repeated. The walk
/// ends at the first short page.
pub struct OutputPager {
    query: OutputQuery,
    finished: bool,
}

impl OutputPager {
    pub fn new(query: OutputQuery) -> Self {
        Self {
            query,
            finished: false,
        }
    }

    /// Sequence the next page will start from.
    pub fn offset(&self) -> u64 {
        self.query.offset
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn next_page<A: SequencerApi + ?Sized>(
        &mut self,
        api: &A,
    ) -> Result<Option<Vec<UnspentOutput>>, EngineError> {
        if self.finished {
            return Ok(None);
        }
        if self.query.limit == 0 {
            return Err(EngineError::InvalidState(
                "page size must be positive".to_string(),
            ));
        }

        let page = fetch_outputs(api, &self.query).await?;
        if page.len() < self.query.limit {
            self.finished = true;
        }
        if let Some(last) = page.last() {
            match last.sequence.checked_add(1) {
                Some(offset) => self.query.offset = offset,
                None => self.finished = true,
            }
        }
        Ok(Some(page))
    }
}

/// Concatenation of every page for `query`, in sequence order.
pub async fn fetch_all_outputs<A: SequencerApi + ?Sized>(
    api: &A,
    query: OutputQuery,
) -> Result<Vec<UnspentOutput>, EngineError> {
    let mut pager = OutputPager::new(query);
    let mut outputs = vec![];
    while let Some(mut page) = pager.next_page(api).await? {
        outputs.append(&mut page);
    }
    Ok(outputs)
}
