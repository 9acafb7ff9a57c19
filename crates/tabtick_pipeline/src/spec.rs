//! Shared pipeline specification models.
//!
//! Everything that travels between ticks lives in [`SpecTickState`], which is
//! plain data and round-trips through JSON.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conf::C_DATETIME_FORMAT;

////////////////////////////////////////////////////////////////////////////////
// #region StatusAndDialect

/// Stage a tick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumTickStatus {
    #[default]
    Import,
    Export,
    Excel,
    #[serde(alias = "service")]
    Process,
}

impl EnumTickStatus {
    /// Sink written by export-type stages.
    pub fn sink_kind(self) -> Option<EnumSinkKind> {
        match self {
            Self::Export => Some(EnumSinkKind::Text),
            Self::Excel => Some(EnumSinkKind::Spreadsheet),
            Self::Import | Self::Process => None,
        }
    }
}

/// Field delimiter of an import file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EnumDelimiter {
    #[default]
    #[serde(rename = ",")]
    Comma,
    #[serde(rename = ";")]
    Semicolon,
    #[serde(rename = "\"")]
    Quote,
}

impl EnumDelimiter {
    pub fn as_char(self) -> char {
        match self {
            Self::Comma => ',',
            Self::Semicolon => ';',
            Self::Quote => '"',
        }
    }

    pub fn as_byte(self) -> u8 {
        self.as_char() as u8
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Cursor

/// Resumable position of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecCursor {
    /// Byte offset (import) or row offset (export/process).
    pub offset: u64,
    /// Terminal offset.
    pub stop: u64,
    /// Lines or rows handled per tick.
    pub batch_size: usize,
    pub status: EnumTickStatus,
}

impl SpecCursor {
    pub fn is_terminal(&self) -> bool {
        self.offset >= self.stop
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnMapping

/// One `{logicalField: value}` entry of a raw column's mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumMappingDirective {
    /// Numeric sub-key of a multi-part field.
    SubIndex(u32),
    /// Boolean flag; maps the column as a scalar.
    Flag(bool),
    /// Sentinel `stop`: first matching column wins.
    Stop,
    /// Nested object; marks the field as multi-part.
    Nested,
    /// Any other literal.
    Text(String),
}

impl EnumMappingDirective {
    pub fn sub_index(&self) -> Option<u32> {
        match self {
            Self::SubIndex(n) => Some(*n),
            _ => None,
        }
    }
}

/// Declarative mapping from raw column names to logical fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecColumnMapping {
    /// Raw column name -> directives in document order.
    pub dict_directives: BTreeMap<String, Vec<(String, EnumMappingDirective)>>,
    /// Logical fields assembled from several columns.
    pub set_fields_multi: BTreeSet<String>,
}

impl SpecColumnMapping {
    pub fn directives(&self, column: &str) -> Option<&[(String, EnumMappingDirective)]> {
        self.dict_directives.get(column).map(Vec::as_slice)
    }

    pub fn is_multi_part(&self, field: &str) -> bool {
        self.set_fields_multi.contains(field)
    }
}

/// Column slot of one logical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumHeaderSlot {
    Scalar(usize),
    Multi(BTreeMap<u32, usize>),
}

/// Logical field -> source column(s).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecResolvedHeader(pub BTreeMap<String, EnumHeaderSlot>);

impl SpecResolvedHeader {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&EnumHeaderSlot> {
        self.0.get(field)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Rows

/// Value of one logical field in an imported line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumLogicalValue {
    Scalar(String),
    Multi(BTreeMap<u32, String>),
}

/// One imported line keyed by logical field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecLogicalRow(pub BTreeMap<String, EnumLogicalValue>);

impl SpecLogicalRow {
    pub fn get(&self, field: &str) -> Option<&EnumLogicalValue> {
        self.0.get(field)
    }
}

/// Typed value produced by an ordered data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumExportValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Annotated wrapper; only the inner value is exported.
    Attributes(Box<EnumExportValue>),
}

impl EnumExportValue {
    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date(_) | Self::DateTime(_))
    }

    /// Flat text rendering used by the text sink and by filters.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Boolean(val) => String::from(if *val { "1" } else { "0" }),
            Self::Integer(val) => val.to_string(),
            Self::Float(val) => val.to_string(),
            Self::Text(val) => val.clone(),
            Self::Date(val) => val
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.format(C_DATETIME_FORMAT).to_string())
                .unwrap_or_default(),
            Self::DateTime(val) => val.format(C_DATETIME_FORMAT).to_string(),
            Self::Attributes(inner) => inner.to_text(),
        }
    }
}

/// One source row: id plus ordered `(column, value)` cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecExportRow {
    pub row_id: String,
    pub cells: Vec<(String, EnumExportValue)>,
}

impl SpecExportRow {
    pub fn new(row_id: impl Into<String>) -> Self {
        Self {
            row_id: row_id.into(),
            cells: vec![],
        }
    }

    pub fn with_cell(mut self, column: impl Into<String>, value: EnumExportValue) -> Self {
        self.cells.push((column.into(), value));
        self
    }

    pub fn get(&self, column: &str) -> Option<&EnumExportValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

/// Payload a tick hands to its row service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumTickRow {
    /// Import: the current line.
    Logical(SpecLogicalRow),
    /// Export: the current batch.
    Batch(Vec<SpecExportRow>),
    /// Process: the current source row.
    Record(SpecExportRow),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Sinks

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumSinkKind {
    Text,
    Spreadsheet,
}

/// Export file produced by one export stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSinkDescriptor {
    pub path: PathBuf,
    pub kind: EnumSinkKind,
    /// Highest data row written so far.
    pub highest_row_marker: u64,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TickState

fn derive_default_data() -> Value {
    Value::Array(vec![])
}

/// Flat key/value payload owned by the caller between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecTickState {
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub stop: u64,
    #[serde(default)]
    pub batch_size: usize,
    #[serde(default)]
    pub status: EnumTickStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<EnumDelimiter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<SpecResolvedHeader>,
    #[serde(default)]
    pub filters: Value,
    #[serde(default)]
    pub sort: Value,
    /// Free-form accumulator owned by row services.
    #[serde(default = "derive_default_data")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<EnumTickRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Default for SpecTickState {
    fn default() -> Self {
        Self {
            offset: 0,
            stop: 0,
            batch_size: 0,
            status: EnumTickStatus::default(),
            file: None,
            delimiter: None,
            header: None,
            filters: Value::Null,
            sort: Value::Null,
            data: derive_default_data(),
            row: None,
            link: None,
        }
    }
}

impl SpecTickState {
    pub fn new(status: EnumTickStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn cursor(&self) -> SpecCursor {
        SpecCursor {
            offset: self.offset,
            stop: self.stop,
            batch_size: self.batch_size,
            status: self.status,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.cursor().is_terminal()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
