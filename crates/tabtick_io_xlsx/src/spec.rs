//! Shared XLSX specification models.

use crate::conf::{C_SHEET_NAME_DEFAULT, derive_default_body_format, derive_default_header_format};

////////////////////////////////////////////////////////////////////////////////
// #region CellValues

/// Normalized cell value written to / read back from a worksheet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
}

impl EnumCellValue {
    /// `true` for [`EnumCellValue::None`] and empty strings.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::None => true,
            Self::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification (subset used by export workbooks).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Number format code.
    pub num_format: Option<String>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region AppendOptions

/// Autofit policy applied when the workbook is written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Disable width inference entirely.
    pub if_enabled: bool,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            if_enabled: true,
            width_cell_min: 8,
            width_cell_max: 60,
            width_cell_padding: 2,
        }
    }
}

/// Workbook document properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxDocumentProperties {
    /// Document title.
    pub title: String,
    /// Document subject.
    pub subject: String,
    /// Document description (stored as the comment property).
    pub description: String,
}

impl SpecXlsxDocumentProperties {
    /// Use `text` for title, subject and description.
    pub fn uniform(text: &str) -> Self {
        Self {
            title: text.to_string(),
            subject: text.to_string(),
            description: text.to_string(),
        }
    }
}

impl Default for SpecXlsxDocumentProperties {
    fn default() -> Self {
        Self::uniform(C_SHEET_NAME_DEFAULT)
    }
}

/// Options shared by create/open/append/close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxAppendOptions {
    /// Target worksheet name (sanitized before use).
    pub sheet_name: String,
    /// Document properties written on every close.
    pub properties: SpecXlsxDocumentProperties,
    /// Format of row 1.
    pub fmt_header: SpecCellFormat,
    /// Format of data rows.
    pub fmt_body: SpecCellFormat,
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
}

impl Default for SpecXlsxAppendOptions {
    fn default() -> Self {
        Self {
            sheet_name: C_SHEET_NAME_DEFAULT.to_string(),
            properties: SpecXlsxDocumentProperties::default(),
            fmt_header: derive_default_header_format(),
            fmt_body: derive_default_body_format(),
            policy_autofit: SpecAutofitCellsPolicy::default(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Per open/close cycle report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxAppendReport {
    /// Actual sheet name in the workbook.
    pub sheet_name: String,
    /// Highest populated 1-based row when the cycle started.
    pub n_row_highest_before: usize,
    /// Highest populated 1-based row after the cycle.
    pub n_row_highest_after: usize,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxAppendReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }

    /// Rows appended during the cycle.
    pub fn n_rows_appended(&self) -> usize {
        self.n_row_highest_after
            .saturating_sub(self.n_row_highest_before)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
