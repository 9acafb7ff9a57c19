//! XLSX constants and default preset factories.

use crate::spec::SpecCellFormat;

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];
/// Sheet name and document title used by export workbooks.
pub const C_SHEET_NAME_DEFAULT: &str = "export";
/// Workbook defined name holding the number of written rows.
///
/// Rows made only of blank cells leave no trace in the sheet data, so the
/// row count survives a re-open only through this name.
pub const C_DEFINED_NAME_ROW_HIGHEST: &str = "tabtick_row_highest";

/// Header row format: bold, centered.
pub fn derive_default_header_format() -> SpecCellFormat {
    SpecCellFormat {
        bold: Some(true),
        align: Some("center".to_string()),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    }
}

/// Body cell format: library defaults.
pub fn derive_default_body_format() -> SpecCellFormat {
    SpecCellFormat::default()
}
