//! Export stage: sink creation and row-cursor ticks.

use serde_json::Value;
use tabtick_io_fs::{derive_sink_file_path, prepare_sink_directory};
use tracing::{debug, info};

use crate::config::SpecTickContext;
use crate::error::{PipelineError, PipelineResult};
use crate::service::{ColumnAnnotations, TickService};
use crate::source::OrderedDataSource;
use crate::spec::{EnumExportValue, EnumSinkKind, EnumTickRow, EnumTickStatus, SpecExportRow, SpecTickState};

/// Caller request starting one export.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecExportRequest {
    /// Export id; the file is `<id>.csv` or `<id>.xlsx`.
    pub id: String,
    pub kind: EnumSinkKind,
    pub filters: Value,
    pub sort: Value,
}

impl SpecExportRequest {
    pub fn new(id: impl Into<String>, kind: EnumSinkKind) -> Self {
        Self {
            id: id.into(),
            kind,
            filters: Value::Null,
            sort: Value::Null,
        }
    }

    pub fn status(&self) -> EnumTickStatus {
        match self.kind {
            EnumSinkKind::Text => EnumTickStatus::Export,
            EnumSinkKind::Spreadsheet => EnumTickStatus::Excel,
        }
    }
}

/// Create the export directory and file with its header row, then build the
/// initial export state.
///
/// Header columns are those of the first source row that are dates or not
/// hidden, labelled through `annotations`.
pub fn prepare_export(
    request: &SpecExportRequest,
    source: &dyn OrderedDataSource,
    annotations: &dyn ColumnAnnotations,
    service: &mut dyn TickService,
    ctx: &SpecTickContext,
) -> PipelineResult<SpecTickState> {
    let path_dir = prepare_sink_directory(&ctx.dir_export)?;
    let name_file = request.kind.derive_file_name(&request.id);
    let path_file = derive_sink_file_path(&path_dir, &name_file)?;

    let l_header: Vec<String> = source
        .get_batch(0, 1, &request.filters, &request.sort)?
        .first()
        .map(|row| {
            row.cells
                .iter()
                .filter(|(column, value)| value.is_date() || !annotations.is_hidden(column))
                .map(|(column, _)| annotations.label(column))
                .collect()
        })
        .unwrap_or_default();
    request
        .kind
        .create(&path_file, &l_header, &ctx.config.derive_xlsx_options())?;

    let mut state = SpecTickState::new(request.status());
    state.file = Some(name_file);
    state.filters = request.filters.clone();
    state.sort = request.sort.clone();
    state.offset = 0;
    state.stop = source.get_total_count(&request.filters)?;
    state.batch_size = ctx.config.export_speed;
    info!(
        path = %path_file.display(),
        kind = ?request.kind,
        stop = state.stop,
        n_cols = l_header.len(),
        "prepared export"
    );
    service.prepare(state, ctx)
}

/// Date values become canonical text even when hidden; other hidden values
/// are dropped; visible `Attributes` wrappers are unwrapped.
pub fn filter_export_row(row: SpecExportRow, annotations: &dyn ColumnAnnotations) -> SpecExportRow {
    let cells = row
        .cells
        .into_iter()
        .filter_map(|(column, value)| {
            if value.is_date() {
                let c_text = value.to_text();
                return Some((column, EnumExportValue::Text(c_text)));
            }
            if annotations.is_hidden(&column) {
                return None;
            }
            match value {
                EnumExportValue::Attributes(inner) => Some((column, *inner)),
                other => Some((column, other)),
            }
        })
        .collect();
    SpecExportRow {
        row_id: row.row_id,
        cells,
    }
}

/// Fetch the next batch, let the export service rewrite it, filter it and
/// append it to the sink; advance `offset` by `batch_size`.
pub fn run_export_tick(
    state: SpecTickState,
    source: &dyn OrderedDataSource,
    annotations: &dyn ColumnAnnotations,
    service: &mut dyn TickService,
    ctx: &SpecTickContext,
) -> PipelineResult<SpecTickState> {
    let kind = state.status.sink_kind().ok_or_else(|| {
        PipelineError::InvalidState(format!("status {:?} is not an export", state.status))
    })?;
    if state.batch_size == 0 {
        return Err(PipelineError::InvalidState(
            "export tick needs batch_size >= 1".to_string(),
        ));
    }
    let name_file = state
        .file
        .clone()
        .ok_or_else(|| PipelineError::InvalidState("export state has no file".to_string()))?;
    let path_dir = prepare_sink_directory(&ctx.dir_export)?;
    let path_file = derive_sink_file_path(&path_dir, &name_file)?;

    let mut state = state;
    let l_rows = source.get_batch(state.offset, state.batch_size, &state.filters, &state.sort)?;
    state.row = Some(EnumTickRow::Batch(l_rows));
    state = service.run(state, ctx)?;

    let l_rows: Vec<SpecExportRow> = match state.row.take() {
        Some(EnumTickRow::Batch(l_rows)) => l_rows
            .into_iter()
            .map(|row| filter_export_row(row, annotations))
            .collect(),
        Some(EnumTickRow::Record(row)) => vec![filter_export_row(row, annotations)],
        Some(EnumTickRow::Logical(_)) | None => vec![],
    };
    let l_values: Vec<Vec<EnumExportValue>> = l_rows
        .iter()
        .map(|row| row.cells.iter().map(|(_, value)| value.clone()).collect())
        .collect();

    let mut sink = kind.open(&path_file, &ctx.config.derive_xlsx_options())?;
    sink.append_rows(&l_values)?;
    let descriptor = sink.close()?;

    state.row = Some(EnumTickRow::Batch(l_rows));
    state.offset += state.batch_size as u64;
    debug!(
        offset = state.offset,
        stop = state.stop,
        status = ?state.status,
        n_rows = l_values.len(),
        highest_row = descriptor.highest_row_marker,
        "export tick"
    );
    Ok(state)
}
