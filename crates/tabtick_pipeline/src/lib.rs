//! `tabtick_pipeline` v1:
//! Incremental, resumable tabular import/export engine.
//!
//! A caller prepares a stage once, then runs ticks until the returned state
//! is terminal (`offset >= stop`). Each tick is a self-contained unit of work
//! over a state the caller owns and may persist as JSON between ticks.
//!
//! Modules:
//! - `conf`     : constants and defaults
//! - `spec`     : cursor/state/mapping/row models
//! - `error`    : error taxonomy
//! - `config`   : engine config, import settings, tick context
//! - `dialect`  : delimiter detection
//! - `sanitize` : raw line normalization
//! - `header`   : column mapping parsing and header resolution
//! - `callback` : named row callbacks
//! - `source`   : ordered data sources (in-memory, polars)
//! - `service`  : row service and column annotation seams
//! - `sink`     : text and spreadsheet sinks
//! - `import`   : import prepare/tick
//! - `export`   : export prepare/tick
//! - `process`  : process prepare/tick
//! - `engine`   : status dispatch and tick driver

pub mod callback;
pub mod conf;
pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod export;
pub mod header;
pub mod import;
pub mod process;
pub mod sanitize;
pub mod service;
pub mod sink;
pub mod source;
pub mod spec;

#[cfg(test)]
mod test_support;

pub use callback::{EnumRowCallback, apply_callbacks};
pub use config::{SpecImportSetting, SpecPipelineConfig, SpecTickContext, load_pipeline_config};
pub use dialect::{detect, detect_from_bytes};
pub use engine::{FnTickHandler, TickEngine, derive_tick_handler};
pub use error::{PipelineError, PipelineResult};
pub use export::{SpecExportRequest, filter_export_row, prepare_export, run_export_tick};
pub use header::{accumulate_header, parse_column_mapping, resolve_header, validate_header};
pub use import::{assemble_logical_row, prepare_import, run_import_tick};
pub use process::{prepare_process, run_process_tick};
pub use sanitize::{decode_line, sanitize};
pub use service::{
    ColumnAnnotations, FnTickService, PassthroughService, SpecColumnAnnotations, TickService,
};
pub use sink::{SpreadsheetSink, TabularSink, TextSink};
pub use source::{DataFrameSource, OrderedDataSource, VecDataSource};
pub use spec::{
    EnumDelimiter, EnumExportValue, EnumHeaderSlot, EnumLogicalValue, EnumMappingDirective,
    EnumSinkKind, EnumTickRow, EnumTickStatus, SpecColumnMapping, SpecCursor, SpecExportRow,
    SpecLogicalRow, SpecResolvedHeader, SpecSinkDescriptor, SpecTickState,
};
