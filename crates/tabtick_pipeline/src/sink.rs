//! Format sink strategy: delimited text appender and spreadsheet writer.
//!
//! A sink is opened, written and closed within one tick.

use std::path::{Path, PathBuf};

use tabtick_io_fs::{SpecTextAppendOptions, TextAppender, write_text_header};
use tabtick_io_xlsx::{EnumCellValue, SpecXlsxAppendOptions, XlsxAppendWriter};
use tracing::{debug, warn};

use crate::conf::{C_EXT_SPREADSHEET, C_EXT_TEXT, C_TEXT_SEP_FIELD};
use crate::error::{PipelineError, PipelineResult};
use crate::spec::{EnumExportValue, EnumSinkKind, SpecSinkDescriptor};

pub trait TabularSink {
    /// Append rows; return the highest row marker afterwards.
    fn append_rows(&mut self, rows: &[Vec<EnumExportValue>]) -> PipelineResult<u64>;

    /// Flush, close and describe the sink.
    fn close(self: Box<Self>) -> PipelineResult<SpecSinkDescriptor>;
}

impl EnumSinkKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => C_EXT_TEXT,
            Self::Spreadsheet => C_EXT_SPREADSHEET,
        }
    }

    /// Export file name for the caller-supplied `id`.
    pub fn derive_file_name(self, id: &str) -> String {
        format!("{id}.{}", self.extension())
    }

    /// Create the sink file holding only `header`.
    pub fn create(
        self,
        path_file: &Path,
        header: &[String],
        options_xlsx: &SpecXlsxAppendOptions,
    ) -> PipelineResult<()> {
        match self {
            Self::Text => {
                let options = derive_text_options();
                write_text_header(path_file, header, &options)?;
            }
            Self::Spreadsheet => {
                XlsxAppendWriter::create(path_file, header, options_xlsx.clone())
                    .and_then(|mut writer| writer.close())
                    .map_err(PipelineError::Sink)?;
            }
        }
        debug!(path = %path_file.display(), kind = ?self, n_cols = header.len(), "created sink");
        Ok(())
    }

    /// Open an existing sink for appending.
    pub fn open(
        self,
        path_file: &Path,
        options_xlsx: &SpecXlsxAppendOptions,
    ) -> PipelineResult<Box<dyn TabularSink + Send>> {
        match self {
            Self::Text => Ok(Box::new(TextSink::open(path_file)?)),
            Self::Spreadsheet => Ok(Box::new(SpreadsheetSink::open(
                path_file,
                options_xlsx.clone(),
            )?)),
        }
    }
}

fn derive_text_options() -> SpecTextAppendOptions {
    SpecTextAppendOptions {
        sep_field: C_TEXT_SEP_FIELD.to_string(),
        ..Default::default()
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region TextSink

/// Append-only `;`-joined text sink.
#[derive(Debug)]
pub struct TextSink {
    path_file: PathBuf,
    appender: TextAppender,
}

impl TextSink {
    pub fn open(path_file: &Path) -> PipelineResult<Self> {
        Ok(Self {
            path_file: path_file.to_path_buf(),
            appender: TextAppender::open(path_file, derive_text_options())?,
        })
    }
}

impl TabularSink for TextSink {
    fn append_rows(&mut self, rows: &[Vec<EnumExportValue>]) -> PipelineResult<u64> {
        for row in rows {
            let l_cells: Vec<String> = row.iter().map(EnumExportValue::to_text).collect();
            if let Some(c_hazard) = derive_text_row_hazard(l_cells.as_slice()) {
                warn!(path = %self.path_file.display(), "{c_hazard}");
            }
            self.appender.append_row(l_cells.as_slice())?;
        }
        Ok(self.appender.cnt_lines_appended())
    }

    fn close(self: Box<Self>) -> PipelineResult<SpecSinkDescriptor> {
        let report = self.appender.close()?;
        Ok(SpecSinkDescriptor {
            path: self.path_file,
            kind: EnumSinkKind::Text,
            highest_row_marker: report.cnt_lines_appended,
        })
    }
}

/// Cells are written verbatim; a separator or line break in a cell shifts
/// the columns or rows seen by a reader of the file.
fn derive_text_row_hazard(l_cells: &[String]) -> Option<&'static str> {
    if l_cells.iter().any(|cell| cell.contains(C_TEXT_SEP_FIELD)) {
        return Some("cell contains the field separator");
    }
    if l_cells.iter().any(|cell| cell.contains(['\n', '\r'])) {
        return Some("cell contains a line break");
    }
    None
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SpreadsheetSink

/// Spreadsheet sink; rows land below the highest populated row.
#[derive(Debug)]
pub struct SpreadsheetSink {
    writer: XlsxAppendWriter,
}

impl SpreadsheetSink {
    pub fn open(path_file: &Path, options: SpecXlsxAppendOptions) -> PipelineResult<Self> {
        let writer = XlsxAppendWriter::open(path_file, options).map_err(PipelineError::Sink)?;
        Ok(Self { writer })
    }

    fn derive_data_row_marker(&self) -> u64 {
        self.writer.n_row_highest().saturating_sub(1) as u64
    }
}

impl TabularSink for SpreadsheetSink {
    fn append_rows(&mut self, rows: &[Vec<EnumExportValue>]) -> PipelineResult<u64> {
        let l_rows: Vec<Vec<EnumCellValue>> = rows
            .iter()
            .map(|row| row.iter().map(derive_cell_value).collect())
            .collect();
        self.writer
            .append_rows(&l_rows)
            .map_err(PipelineError::Sink)?;
        Ok(self.derive_data_row_marker())
    }

    fn close(mut self: Box<Self>) -> PipelineResult<SpecSinkDescriptor> {
        let report = self.writer.close().map_err(PipelineError::Sink)?;
        for c_warning in &report.warnings {
            warn!(path = %self.writer.file_out().display(), "{c_warning}");
        }
        Ok(SpecSinkDescriptor {
            path: self.writer.file_out().to_path_buf(),
            kind: EnumSinkKind::Spreadsheet,
            highest_row_marker: self.derive_data_row_marker(),
        })
    }
}

fn derive_cell_value(value: &EnumExportValue) -> EnumCellValue {
    match value {
        EnumExportValue::Null => EnumCellValue::None,
        EnumExportValue::Boolean(val) => EnumCellValue::Boolean(*val),
        EnumExportValue::Integer(val) => EnumCellValue::Number(*val as f64),
        EnumExportValue::Float(val) => EnumCellValue::Number(*val),
        EnumExportValue::Text(val) => EnumCellValue::String(val.clone()),
        EnumExportValue::Date(_) | EnumExportValue::DateTime(_) => {
            EnumCellValue::String(value.to_text())
        }
        EnumExportValue::Attributes(inner) => derive_cell_value(inner),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
