//! Stateless helper utilities used by the XLSX append kernel.

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL};
use crate::spec::{EnumCellValue, SpecAutofitCellsPolicy};

////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Check that a grid of `n_rows` x `n_cols` fits into one worksheet.
pub fn validate_grid_extent(n_rows: usize, n_cols: usize) -> Result<(), String> {
    if n_rows > N_NROWS_EXCEL_MAX {
        return Err(format!(
            "Worksheet row limit exceeded: {n_rows} > {N_NROWS_EXCEL_MAX}"
        ));
    }
    if n_cols > N_NCOLS_EXCEL_MAX {
        return Err(format!(
            "Worksheet column limit exceeded: {n_cols} > {N_NCOLS_EXCEL_MAX}"
        ));
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Autofit

/// Estimate displayed width units for one cell value.
pub fn estimate_width_len(value: &EnumCellValue) -> usize {
    match value {
        EnumCellValue::None => 0,
        EnumCellValue::String(s) => estimate_unicode_string_width(s),
        EnumCellValue::Number(n) => estimate_unicode_string_width(&n.to_string()),
        EnumCellValue::Boolean(b) => {
            if *b {
                4
            } else {
                5
            }
        }
    }
}

fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

/// Derive final column widths for `grid` under `policy`.
///
/// Returns an empty vector when autofit is disabled.
pub fn derive_column_widths(grid: &[Vec<EnumCellValue>], policy: &SpecAutofitCellsPolicy) -> Vec<usize> {
    if !policy.if_enabled {
        return vec![];
    }
    let n_width = grid.iter().map(Vec::len).max().unwrap_or(0);
    let mut l_width_by_col = vec![0usize; n_width];
    for row in grid {
        for (n_idx_col, value) in row.iter().enumerate() {
            l_width_by_col[n_idx_col] =
                usize::max(l_width_by_col[n_idx_col], estimate_width_len(value));
        }
    }

    let n_min = usize::max(1, policy.width_cell_min);
    let n_max = usize::min(255, usize::max(n_min, policy.width_cell_max));
    l_width_by_col
        .into_iter()
        .map(|n_width_recorded| {
            usize::min(
                n_max,
                usize::max(n_min, n_width_recorded + policy.width_cell_padding),
            )
        })
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region IndexCasting

pub(crate) fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

pub(crate) fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
