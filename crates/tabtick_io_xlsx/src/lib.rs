//! `tabtick_io_xlsx` v1:
//! Rust-side spreadsheet sink kernel.
//!
//! Every tick re-opens the workbook, appends rows below the highest populated
//! row and writes the whole container back, so no handle outlives a tick.
//!
//! Modules:
//! - `conf`   : Excel limits and default presets
//! - `spec`   : cell values/formats/options/reports
//! - `util`   : pure helper functions
//! - `reader` : existing-workbook grid loader
//! - `writer` : create/append/close kernel
pub mod conf;
pub mod reader;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    C_DEFINED_NAME_ROW_HIGHEST, C_SHEET_NAME_DEFAULT, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    TUP_EXCEL_ILLEGAL,
};
pub use reader::{SpecSheetGrid, read_sheet_grid};
pub use spec::{
    EnumCellValue, SpecAutofitCellsPolicy, SpecCellFormat, SpecXlsxAppendOptions,
    SpecXlsxAppendReport, SpecXlsxDocumentProperties,
};
pub use util::{estimate_width_len, sanitize_sheet_name};
pub use writer::XlsxAppendWriter;
