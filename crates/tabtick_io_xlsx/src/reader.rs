//! Existing-workbook loader used to resume appends across ticks.

use std::path::Path;

use calamine::{Data, DataType, Reader, Xlsx, open_workbook};
use tracing::warn;

use crate::conf::C_DEFINED_NAME_ROW_HIGHEST;
use crate::spec::EnumCellValue;

/// Dense cell grid of one worksheet, anchored at `A1`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSheetGrid {
    /// Sheet the grid was read from.
    pub sheet_name: String,
    /// Rows from row 1 down to the highest written row.
    pub rows: Vec<Vec<EnumCellValue>>,
}

impl SpecSheetGrid {
    /// Highest written 1-based row (`0` for an empty sheet).
    pub fn n_row_highest(&self) -> usize {
        self.rows.len()
    }
}

/// Read `sheet_name` (or the first sheet when it is missing) from `path_file`.
///
/// The grid is padded with empty rows up to the row count recorded under
/// [`C_DEFINED_NAME_ROW_HIGHEST`], so trailing all-blank rows keep their slot.
pub fn read_sheet_grid(path_file: &Path, sheet_name: &str) -> Result<SpecSheetGrid, String> {
    let mut workbook: Xlsx<_> = open_workbook(path_file)
        .map_err(|err| format!("Failed to open workbook {}: {err}", path_file.display()))?;
    let n_row_recorded = derive_recorded_row_highest(workbook.defined_names());

    let l_sheet_names = workbook.sheet_names();
    let n_idx_sheet = match l_sheet_names.iter().position(|name| name == sheet_name) {
        Some(n_idx) => n_idx,
        None => {
            warn!(
                path = %path_file.display(),
                sheet = sheet_name,
                "sheet not found, falling back to first sheet"
            );
            0
        }
    };
    let c_sheet_name = l_sheet_names
        .get(n_idx_sheet)
        .cloned()
        .ok_or_else(|| format!("Workbook has no worksheet: {}", path_file.display()))?;

    let range = workbook
        .worksheet_range_at(n_idx_sheet)
        .ok_or_else(|| format!("Workbook has no worksheet: {}", path_file.display()))?
        .map_err(|err| format!("Failed to read worksheet {c_sheet_name:?}: {err}"))?;

    let mut l_rows: Vec<Vec<EnumCellValue>> = vec![];
    if let Some((n_row_start, n_col_start)) = range.start() {
        l_rows.resize(n_row_start as usize, vec![]);
        for row in range.rows() {
            let mut l_cells = vec![EnumCellValue::None; n_col_start as usize];
            l_cells.extend(row.iter().map(derive_cell_value_from_data));
            while l_cells.last().is_some_and(EnumCellValue::is_blank) {
                l_cells.pop();
            }
            l_rows.push(l_cells);
        }
    }
    if l_rows.len() < n_row_recorded {
        l_rows.resize(n_row_recorded, vec![]);
    }

    Ok(SpecSheetGrid {
        sheet_name: c_sheet_name,
        rows: l_rows,
    })
}

fn derive_recorded_row_highest(defined_names: &[(String, String)]) -> usize {
    defined_names
        .iter()
        .find(|(name, _)| name == C_DEFINED_NAME_ROW_HIGHEST)
        .and_then(|(_, formula)| formula.trim().trim_start_matches('=').parse().ok())
        .unwrap_or(0)
}

fn derive_cell_value_from_data(cell: &Data) -> EnumCellValue {
    match cell {
        Data::Empty => EnumCellValue::None,
        Data::String(val) => EnumCellValue::String(val.clone()),
        Data::Int(val) => EnumCellValue::Number(*val as f64),
        Data::Float(val) => EnumCellValue::Number(*val),
        Data::Bool(val) => EnumCellValue::Boolean(*val),
        other => other
            .as_f64()
            .map(EnumCellValue::Number)
            .unwrap_or_else(|| EnumCellValue::String(other.to_string())),
    }
}
