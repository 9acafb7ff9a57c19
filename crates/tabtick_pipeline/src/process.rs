//! Process stage: one source row per tick.

use serde_json::Value;
use tracing::{debug, info};

use crate::config::SpecTickContext;
use crate::error::PipelineResult;
use crate::service::TickService;
use crate::source::OrderedDataSource;
use crate::spec::{EnumTickRow, EnumTickStatus, SpecTickState};

pub fn prepare_process(
    filters: Value,
    source: &dyn OrderedDataSource,
    service: &mut dyn TickService,
    ctx: &SpecTickContext,
) -> PipelineResult<SpecTickState> {
    let mut state = SpecTickState::new(EnumTickStatus::Process);
    state.stop = source.get_total_count(&filters)?;
    state.filters = filters;
    state.batch_size = 1;
    info!(stop = state.stop, "prepared process");
    service.prepare(state, ctx)
}

/// Advance `offset` by one and run the service on the row at that 1-based
/// position. Past the end of the source the service is not called.
pub fn run_process_tick(
    state: SpecTickState,
    source: &dyn OrderedDataSource,
    service: &mut dyn TickService,
    ctx: &SpecTickContext,
) -> PipelineResult<SpecTickState> {
    let mut state = state;
    state.offset += 1;
    let l_rows = source.get_batch(state.offset - 1, 1, &state.filters, &state.sort)?;
    state.row = l_rows.into_iter().next().map(EnumTickRow::Record);
    if state.row.is_some() {
        state = service.run(state, ctx)?;
    }
    debug!(offset = state.offset, stop = state.stop, "process tick");
    Ok(state)
}
