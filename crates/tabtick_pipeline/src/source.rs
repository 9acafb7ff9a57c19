//! Ordered data sources feeding export and process ticks.
//!
//! Filters are a JSON object `{column: value}` matched on the text rendering
//! of each cell. Sort is a JSON object `{column: "asc" | "desc"}` applied in
//! key order. `null` or an empty object disables either.

use std::cmp::Ordering;
use std::io::Cursor;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader, TimeUnit};
use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};
use crate::spec::{EnumExportValue, SpecExportRow};

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
const N_DAYS_CE_TO_UNIX_EPOCH: i32 = 719_163;

pub trait OrderedDataSource {
    /// Rows `[offset, offset + limit)` of the filtered, sorted view.
    fn get_batch(
        &self,
        offset: u64,
        limit: usize,
        filters: &Value,
        sort: &Value,
    ) -> PipelineResult<Vec<SpecExportRow>>;

    /// Row count of the filtered view.
    fn get_total_count(&self, filters: &Value) -> PipelineResult<u64>;
}

////////////////////////////////////////////////////////////////////////////////
// #region FilterAndSort

fn derive_filter_pairs(filters: &Value) -> PipelineResult<Vec<(String, String)>> {
    match filters {
        Value::Null => Ok(vec![]),
        Value::Object(dict_filters) => Ok(dict_filters
            .iter()
            .map(|(column, value)| {
                let c_value = match value {
                    Value::String(text) => text.clone(),
                    Value::Bool(flag) => String::from(if *flag { "1" } else { "0" }),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (column.clone(), c_value)
            })
            .collect()),
        other => Err(PipelineError::Source(format!(
            "filters must be an object, got {other}"
        ))),
    }
}

fn derive_sort_keys(sort: &Value) -> PipelineResult<Vec<(String, bool)>> {
    match sort {
        Value::Null => Ok(vec![]),
        Value::Object(dict_sort) => dict_sort
            .iter()
            .map(|(column, direction)| {
                let if_descending = match direction.as_str().map(str::to_ascii_lowercase) {
                    Some(c_dir) if c_dir == "asc" => false,
                    Some(c_dir) if c_dir == "desc" => true,
                    _ => {
                        return Err(PipelineError::Source(format!(
                            "sort direction of {column:?} must be \"asc\" or \"desc\""
                        )));
                    }
                };
                Ok((column.clone(), if_descending))
            })
            .collect(),
        other => Err(PipelineError::Source(format!(
            "sort must be an object, got {other}"
        ))),
    }
}

fn is_row_matching(row: &SpecExportRow, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(column, c_expected)| {
        row.get(column)
            .is_some_and(|value| value.to_text() == *c_expected)
    })
}

fn cmp_export_values(a: &EnumExportValue, b: &EnumExportValue) -> Ordering {
    use EnumExportValue as V;
    match (a, b) {
        (V::Attributes(a), _) => cmp_export_values(a, b),
        (_, V::Attributes(b)) => cmp_export_values(a, b),
        (V::Null, V::Null) => Ordering::Equal,
        (V::Null, _) => Ordering::Less,
        (_, V::Null) => Ordering::Greater,
        (V::Integer(a), V::Integer(b)) => a.cmp(b),
        (V::Integer(a), V::Float(b)) => (*a as f64).total_cmp(b),
        (V::Float(a), V::Integer(b)) => a.total_cmp(&(*b as f64)),
        (V::Float(a), V::Float(b)) => a.total_cmp(b),
        (V::Boolean(a), V::Boolean(b)) => a.cmp(b),
        _ => a.to_text().cmp(&b.to_text()),
    }
}

/// Apply filters and sort to `rows` (stable).
pub fn derive_ordered_rows(
    rows: impl IntoIterator<Item = SpecExportRow>,
    filters: &Value,
    sort: &Value,
) -> PipelineResult<Vec<SpecExportRow>> {
    let l_filters = derive_filter_pairs(filters)?;
    let l_sort = derive_sort_keys(sort)?;
    let mut l_rows: Vec<SpecExportRow> = rows
        .into_iter()
        .filter(|row| is_row_matching(row, &l_filters))
        .collect();
    if !l_sort.is_empty() {
        l_rows.sort_by(|a, b| {
            for (column, if_descending) in &l_sort {
                let ord = match (a.get(column), b.get(column)) {
                    (Some(va), Some(vb)) => cmp_export_values(va, vb),
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                let ord = if *if_descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
    Ok(l_rows)
}

fn derive_window(n_total: usize, offset: u64, limit: usize) -> (usize, usize) {
    let n_start = usize::try_from(offset).unwrap_or(usize::MAX).min(n_total);
    let n_end = n_start.saturating_add(limit).min(n_total);
    (n_start, n_end)
}

fn is_view_identity(filters: &Value, sort: &Value) -> bool {
    let is_empty = |value: &Value| match value {
        Value::Null => true,
        Value::Object(dict) => dict.is_empty(),
        _ => false,
    };
    is_empty(filters) && is_empty(sort)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region VecDataSource

/// In-memory source over pre-built rows.
#[derive(Debug, Clone, Default)]
pub struct VecDataSource {
    rows: Vec<SpecExportRow>,
}

impl VecDataSource {
    pub fn new(rows: Vec<SpecExportRow>) -> Self {
        Self { rows }
    }
}

impl OrderedDataSource for VecDataSource {
    fn get_batch(
        &self,
        offset: u64,
        limit: usize,
        filters: &Value,
        sort: &Value,
    ) -> PipelineResult<Vec<SpecExportRow>> {
        if is_view_identity(filters, sort) {
            let (n_start, n_end) = derive_window(self.rows.len(), offset, limit);
            return Ok(self.rows[n_start..n_end].to_vec());
        }
        let l_rows = derive_ordered_rows(self.rows.iter().cloned(), filters, sort)?;
        let (n_start, n_end) = derive_window(l_rows.len(), offset, limit);
        Ok(l_rows[n_start..n_end].to_vec())
    }

    fn get_total_count(&self, filters: &Value) -> PipelineResult<u64> {
        if is_view_identity(filters, &Value::Null) {
            return Ok(self.rows.len() as u64);
        }
        let l_rows = derive_ordered_rows(self.rows.iter().cloned(), filters, &Value::Null)?;
        Ok(l_rows.len() as u64)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DataFrameSource

/// Source over a polars [`DataFrame`]; row ids are 0-based row positions.
#[derive(Debug, Clone)]
pub struct DataFrameSource {
    df: DataFrame,
}

impl DataFrameSource {
    pub fn new(df: DataFrame) -> Self {
        Self { df }
    }

    /// Load a frame serialized in Arrow IPC format.
    pub fn from_ipc_bytes(v_ipc_df: &[u8]) -> PipelineResult<Self> {
        let df = IpcReader::new(Cursor::new(v_ipc_df))
            .finish()
            .map_err(|err| PipelineError::Source(format!("Failed to read IPC DataFrame bytes: {err}")))?;
        Ok(Self::new(df))
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    fn derive_row(&self, n_idx_row: usize) -> PipelineResult<SpecExportRow> {
        let mut row = SpecExportRow::new(n_idx_row.to_string());
        for col in self.df.get_columns() {
            let value = col.get(n_idx_row)?;
            row.cells
                .push((col.name().to_string(), derive_export_value_from_any_value(value)));
        }
        Ok(row)
    }

    fn derive_rows(&self, n_start: usize, n_end: usize) -> PipelineResult<Vec<SpecExportRow>> {
        (n_start..n_end).map(|n_idx| self.derive_row(n_idx)).collect()
    }
}

impl OrderedDataSource for DataFrameSource {
    fn get_batch(
        &self,
        offset: u64,
        limit: usize,
        filters: &Value,
        sort: &Value,
    ) -> PipelineResult<Vec<SpecExportRow>> {
        if is_view_identity(filters, sort) {
            let (n_start, n_end) = derive_window(self.df.height(), offset, limit);
            return self.derive_rows(n_start, n_end);
        }
        let l_rows = derive_ordered_rows(self.derive_rows(0, self.df.height())?, filters, sort)?;
        let (n_start, n_end) = derive_window(l_rows.len(), offset, limit);
        Ok(l_rows[n_start..n_end].to_vec())
    }

    fn get_total_count(&self, filters: &Value) -> PipelineResult<u64> {
        if is_view_identity(filters, &Value::Null) {
            return Ok(self.df.height() as u64);
        }
        let l_rows =
            derive_ordered_rows(self.derive_rows(0, self.df.height())?, filters, &Value::Null)?;
        Ok(l_rows.len() as u64)
    }
}

fn derive_datetime_from_timestamp(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(value)),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value),
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value),
    };
    dt.map(|dt| dt.naive_utc())
}

fn derive_export_value_from_any_value(value: AnyValue<'_>) -> EnumExportValue {
    match value {
        AnyValue::Null => EnumExportValue::Null,
        AnyValue::Boolean(val) => EnumExportValue::Boolean(val),
        AnyValue::String(val) => EnumExportValue::Text(val.to_string()),
        AnyValue::StringOwned(val) => EnumExportValue::Text(val.to_string()),
        AnyValue::UInt8(val) => EnumExportValue::Integer(val as i64),
        AnyValue::UInt16(val) => EnumExportValue::Integer(val as i64),
        AnyValue::UInt32(val) => EnumExportValue::Integer(val as i64),
        AnyValue::UInt64(val) => match i64::try_from(val) {
            Ok(n) => EnumExportValue::Integer(n),
            Err(_) => EnumExportValue::Float(val as f64),
        },
        AnyValue::Int8(val) => EnumExportValue::Integer(val as i64),
        AnyValue::Int16(val) => EnumExportValue::Integer(val as i64),
        AnyValue::Int32(val) => EnumExportValue::Integer(val as i64),
        AnyValue::Int64(val) => EnumExportValue::Integer(val),
        AnyValue::Float32(val) => EnumExportValue::Float(val as f64),
        AnyValue::Float64(val) => EnumExportValue::Float(val),
        AnyValue::Date(n_days) => {
            match NaiveDate::from_num_days_from_ce_opt(n_days + N_DAYS_CE_TO_UNIX_EPOCH) {
                Some(date) => EnumExportValue::Date(date),
                None => EnumExportValue::Null,
            }
        }
        AnyValue::Datetime(n_ts, unit, _) | AnyValue::DatetimeOwned(n_ts, unit, _) => {
            match derive_datetime_from_timestamp(n_ts, unit) {
                Some(dt) => EnumExportValue::DateTime(dt),
                None => EnumExportValue::Null,
            }
        }
        other => EnumExportValue::Text(other.to_string()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
