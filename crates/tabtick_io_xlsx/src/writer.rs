//! XLSX append kernel: header creation, re-open, append, atomic write-back.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{DocProperties, Format, FormatAlign, FormatBorder, Workbook, XlsxError};
use tabtick_io_fs::replace_file_atomic;
use tracing::debug;

use crate::conf::C_DEFINED_NAME_ROW_HIGHEST;
use crate::reader::read_sheet_grid;
use crate::spec::{EnumCellValue, SpecCellFormat, SpecXlsxAppendOptions, SpecXlsxAppendReport};
use crate::util::{
    cast_col_num, cast_row_num, derive_column_widths, sanitize_sheet_name, validate_grid_extent,
};

/// Workbook buffered in memory for one tick.
///
/// Row 1 holds the header; data rows follow. Nothing touches the disk until
/// [`Self::close`].
#[derive(Debug)]
pub struct XlsxAppendWriter {
    path_file_out: PathBuf,
    options: SpecXlsxAppendOptions,
    l_rows_grid: Vec<Vec<EnumCellValue>>,
    report: SpecXlsxAppendReport,
    if_closed: bool,
}

impl XlsxAppendWriter {
    /// Start a new workbook whose only row is `header`.
    pub fn create(
        path_file_out: &Path,
        header: &[String],
        options: SpecXlsxAppendOptions,
    ) -> Result<Self, String> {
        validate_grid_extent(1, header.len())?;
        let sheet_name = sanitize_sheet_name(&options.sheet_name, "_");
        let l_header = header
            .iter()
            .map(|cell| EnumCellValue::String(cell.clone()))
            .collect();
        Ok(Self {
            path_file_out: path_file_out.to_path_buf(),
            options,
            l_rows_grid: vec![l_header],
            report: SpecXlsxAppendReport {
                sheet_name,
                ..Default::default()
            },
            if_closed: false,
        })
    }

    /// Re-open an existing workbook and position after its highest row.
    pub fn open(path_file_out: &Path, options: SpecXlsxAppendOptions) -> Result<Self, String> {
        let sheet_name = sanitize_sheet_name(&options.sheet_name, "_");
        let grid = read_sheet_grid(path_file_out, &sheet_name)?;
        let mut report = SpecXlsxAppendReport {
            sheet_name,
            n_row_highest_before: grid.n_row_highest(),
            n_row_highest_after: grid.n_row_highest(),
            warnings: vec![],
        };
        if grid.sheet_name != report.sheet_name {
            report.warn(format!(
                "Sheet {:?} not found; appended to {:?}.",
                report.sheet_name, grid.sheet_name
            ));
        }
        debug!(
            path = %path_file_out.display(),
            highest_row = grid.n_row_highest(),
            "re-opened workbook"
        );
        Ok(Self {
            path_file_out: path_file_out.to_path_buf(),
            options,
            l_rows_grid: grid.rows,
            report,
            if_closed: false,
        })
    }

    /// Return output file path.
    pub fn file_out(&self) -> &Path {
        &self.path_file_out
    }

    /// Highest written 1-based row currently buffered, blank rows included.
    pub fn n_row_highest(&self) -> usize {
        self.l_rows_grid.len()
    }

    /// Append rows below the highest populated row; return the new highest row.
    pub fn append_rows(&mut self, rows: &[Vec<EnumCellValue>]) -> Result<usize, String> {
        if self.if_closed {
            return Err("Cannot append after close().".to_string());
        }
        let n_width_max = rows.iter().map(Vec::len).max().unwrap_or(0);
        validate_grid_extent(self.l_rows_grid.len() + rows.len(), n_width_max)?;

        self.l_rows_grid.extend(rows.iter().cloned());
        self.report.n_row_highest_after = self.l_rows_grid.len();
        Ok(self.l_rows_grid.len())
    }

    /// Write the workbook back to disk. Idempotent.
    pub fn close(&mut self) -> Result<SpecXlsxAppendReport, String> {
        if self.if_closed {
            return Ok(self.report.clone());
        }

        let mut workbook = Workbook::new();
        let properties = DocProperties::new()
            .set_title(&self.options.properties.title)
            .set_subject(&self.options.properties.subject)
            .set_comment(&self.options.properties.description);
        workbook.set_properties(&properties);
        workbook
            .define_name(
                C_DEFINED_NAME_ROW_HIGHEST,
                &format!("={}", self.l_rows_grid.len()),
            )
            .map_err(derive_xlsx_error_text)?;

        let fmt_header = derive_rust_xlsx_format(&self.options.fmt_header);
        let fmt_body = derive_rust_xlsx_format(&self.options.fmt_body);

        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&self.report.sheet_name)
            .map_err(derive_xlsx_error_text)?;

        for (n_idx_row, row) in self.l_rows_grid.iter().enumerate() {
            let fmt_row = if n_idx_row == 0 { &fmt_header } else { &fmt_body };
            for (n_idx_col, value) in row.iter().enumerate() {
                let n_row = cast_row_num(n_idx_row)?;
                let n_col = cast_col_num(n_idx_col)?;
                match value {
                    EnumCellValue::None => continue,
                    EnumCellValue::String(val) => worksheet
                        .write_string_with_format(n_row, n_col, val, fmt_row)
                        .map_err(derive_xlsx_error_text)?,
                    EnumCellValue::Number(val) => worksheet
                        .write_number_with_format(n_row, n_col, *val, fmt_row)
                        .map_err(derive_xlsx_error_text)?,
                    EnumCellValue::Boolean(val) => worksheet
                        .write_boolean_with_format(n_row, n_col, *val, fmt_row)
                        .map_err(derive_xlsx_error_text)?,
                };
            }
        }

        for (n_idx_col, n_width) in derive_column_widths(&self.l_rows_grid, &self.options.policy_autofit)
            .into_iter()
            .enumerate()
        {
            worksheet
                .set_column_width(cast_col_num(n_idx_col)?, n_width as f64)
                .map_err(derive_xlsx_error_text)?;
        }

        let v_bytes = workbook.save_to_buffer().map_err(derive_xlsx_error_text)?;
        replace_file_atomic(&self.path_file_out, &v_bytes).map_err(|err| err.to_string())?;

        self.if_closed = true;
        Ok(self.report.clone())
    }
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Read;
    use std::path::Path;

    use tempfile::tempdir;
    use zip::ZipArchive;

    use super::XlsxAppendWriter;
    use crate::conf::C_DEFINED_NAME_ROW_HIGHEST;
    use crate::reader::read_sheet_grid;
    use crate::spec::{EnumCellValue, SpecXlsxAppendOptions};

    fn read_part(path: &Path, name_part: &str) -> String {
        let mut archive = ZipArchive::new(File::open(path).expect("open xlsx")).expect("zip");
        let mut c_xml = String::new();
        archive
            .by_name(name_part)
            .expect(name_part)
            .read_to_string(&mut c_xml)
            .expect("read part");
        c_xml
    }

    fn s(val: &str) -> EnumCellValue {
        EnumCellValue::String(val.to_string())
    }

    #[test]
    fn create_then_append_across_reopen_cycles() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("export.xlsx");
        let options = SpecXlsxAppendOptions::default();

        let mut writer = XlsxAppendWriter::create(
            &path,
            &["Id".to_string(), "Name".to_string()],
            options.clone(),
        )
        .expect("create");
        writer.close().expect("close header");

        let mut writer = XlsxAppendWriter::open(&path, options.clone()).expect("open 1");
        assert_eq!(writer.n_row_highest(), 1);
        let n_marker = writer
            .append_rows(&[
                vec![EnumCellValue::Number(1.0), s("alpha")],
                vec![EnumCellValue::Number(2.0), s("beta")],
            ])
            .expect("append 1");
        assert_eq!(n_marker, 3);
        let report = writer.close().expect("close 1");
        assert_eq!(report.n_rows_appended(), 2);
        assert!(report.warnings.is_empty());

        let mut writer = XlsxAppendWriter::open(&path, options.clone()).expect("open 2");
        assert_eq!(writer.n_row_highest(), 3);
        let n_marker = writer
            .append_rows(&[vec![EnumCellValue::Number(3.0), EnumCellValue::Boolean(true)]])
            .expect("append 2");
        assert_eq!(n_marker, 4);
        writer.close().expect("close 2");

        let grid = read_sheet_grid(&path, "export").expect("read back");
        assert_eq!(grid.sheet_name, "export");
        assert_eq!(grid.n_row_highest(), 4);
        assert_eq!(grid.rows[0], vec![s("Id"), s("Name")]);
        assert_eq!(grid.rows[1], vec![EnumCellValue::Number(1.0), s("alpha")]);
        assert_eq!(
            grid.rows[3],
            vec![EnumCellValue::Number(3.0), EnumCellValue::Boolean(true)]
        );
    }

    #[test]
    fn open_missing_workbook_fails() {
        let tmp = tempdir().expect("tempdir");
        let err = XlsxAppendWriter::open(&tmp.path().join("nope.xlsx"), Default::default())
            .expect_err("must fail");
        assert!(err.contains("Failed to open workbook"));
    }

    #[test]
    fn close_is_idempotent_and_blocks_append() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("export.xlsx");
        let mut writer =
            XlsxAppendWriter::create(&path, &["A".to_string()], Default::default()).expect("create");
        writer.close().expect("close");
        writer.close().expect("close again");
        assert!(writer.append_rows(&[vec![s("x")]]).is_err());
        assert_eq!(writer.file_out(), path.as_path());
    }

    #[test]
    fn trailing_blank_rows_keep_their_slot_across_reopen() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("export.xlsx");
        let options = SpecXlsxAppendOptions::default();
        XlsxAppendWriter::create(&path, &["a".to_string()], options.clone())
            .and_then(|mut writer| writer.close())
            .expect("create");

        for l_batch in [
            vec![vec![EnumCellValue::Number(0.0)], vec![EnumCellValue::None]],
            vec![vec![EnumCellValue::Number(2.0)], vec![s("")]],
        ] {
            let mut writer = XlsxAppendWriter::open(&path, options.clone()).expect("open");
            writer.append_rows(&l_batch).expect("append");
            writer.close().expect("close");
        }

        let grid = read_sheet_grid(&path, "export").expect("read back");
        assert_eq!(grid.n_row_highest(), 5);
        assert_eq!(grid.rows[1], vec![EnumCellValue::Number(0.0)]);
        assert!(grid.rows[2].is_empty());
        assert_eq!(grid.rows[3], vec![EnumCellValue::Number(2.0)]);
        assert!(grid.rows[4].is_empty());

        let c_workbook = read_part(&path, "xl/workbook.xml");
        assert!(c_workbook.contains(&format!("name=\"{C_DEFINED_NAME_ROW_HIGHEST}\"")));
    }

    #[test]
    fn close_writes_properties_header_format_and_widths() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("export.xlsx");
        let mut writer = XlsxAppendWriter::create(
            &path,
            &["Id".to_string(), "Description".to_string()],
            SpecXlsxAppendOptions::default(),
        )
        .expect("create");
        writer
            .append_rows(&[vec![EnumCellValue::Number(1.0), s(&"y".repeat(100))]])
            .expect("append");
        writer.close().expect("close");

        let c_core = read_part(&path, "docProps/core.xml");
        assert!(c_core.contains("<dc:title>export</dc:title>"));
        assert!(c_core.contains("<dc:subject>export</dc:subject>"));
        assert!(c_core.contains("<dc:description>export</dc:description>"));

        let c_styles = read_part(&path, "xl/styles.xml");
        assert!(c_styles.contains("<b/>"));
        assert!(c_styles.contains("horizontal=\"center\""));
        assert!(c_styles.contains("vertical=\"center\""));

        let c_sheet = read_part(&path, "xl/worksheets/sheet1.xml");
        assert!(c_sheet.contains("<cols>"));
        assert!(c_sheet.contains("customWidth=\"1\""));
    }
}
