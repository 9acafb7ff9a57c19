//! Append-only delimited text writer.
//!
//! Every row is written as `sep_line + fields.join(sep_field)`, so the file
//! never ends with a dangling line break and earlier content is never
//! rewritten.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::atomic::replace_file_atomic;
use crate::spec::{SinkIoError, SpecTextAppendOptions, SpecTextAppendReport};

/// Write (or replace) the header line of a text sink.
pub fn write_text_header(
    path_file: &Path,
    cells: &[String],
    options: &SpecTextAppendOptions,
) -> Result<(), SinkIoError> {
    let c_header = cells.join(&options.sep_field);
    replace_file_atomic(path_file, c_header.as_bytes())
}

/// Scoped append handle; one per tick.
#[derive(Debug)]
pub struct TextAppender {
    path_file: PathBuf,
    writer: BufWriter<File>,
    options: SpecTextAppendOptions,
    cnt_lines_appended: u64,
    cnt_bytes_appended: u64,
}

impl TextAppender {
    /// Open `path_file` in append mode, creating it when absent.
    pub fn open(path_file: &Path, options: SpecTextAppendOptions) -> Result<Self, SinkIoError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path_file)
            .map_err(|e| SinkIoError::OpenFailed {
                path: path_file.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(Self {
            path_file: path_file.to_path_buf(),
            writer: BufWriter::new(file),
            options,
            cnt_lines_appended: 0,
            cnt_bytes_appended: 0,
        })
    }

    /// Append one row.
    pub fn append_row<S: AsRef<str>>(&mut self, cells: &[S]) -> Result<(), SinkIoError> {
        let mut c_line = String::with_capacity(self.options.sep_line.len() + cells.len() * 8);
        c_line.push_str(&self.options.sep_line);
        for (n_idx, cell) in cells.iter().enumerate() {
            if n_idx > 0 {
                c_line.push_str(&self.options.sep_field);
            }
            c_line.push_str(cell.as_ref());
        }

        self.writer
            .write_all(c_line.as_bytes())
            .map_err(|e| SinkIoError::WriteFailed {
                path: self.path_file.clone(),
                message: e.to_string(),
            })?;
        self.cnt_lines_appended += 1;
        self.cnt_bytes_appended += c_line.len() as u64;
        Ok(())
    }

    /// Number of rows appended through this handle.
    pub fn cnt_lines_appended(&self) -> u64 {
        self.cnt_lines_appended
    }

    /// Flush (and optionally fsync) and release the file handle.
    pub fn close(mut self) -> Result<SpecTextAppendReport, SinkIoError> {
        let err_write = |path: &Path, e: std::io::Error| SinkIoError::WriteFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        self.writer
            .flush()
            .map_err(|e| err_write(&self.path_file, e))?;
        if self.options.if_sync_all {
            self.writer
                .get_ref()
                .sync_all()
                .map_err(|e| err_write(&self.path_file, e))?;
        }
        debug!(
            path = %self.path_file.display(),
            lines = self.cnt_lines_appended,
            bytes = self.cnt_bytes_appended,
            "closed text sink"
        );
        Ok(SpecTextAppendReport {
            path: self.path_file,
            cnt_lines_appended: self.cnt_lines_appended,
            cnt_bytes_appended: self.cnt_bytes_appended,
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{TextAppender, write_text_header};
    use crate::spec::SpecTextAppendOptions;

    #[test]
    fn append_keeps_prior_content_across_cycles() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("export.csv");
        let options = SpecTextAppendOptions::default();

        write_text_header(&path, &["id".to_string(), "name".to_string()], &options)
            .expect("header");

        let mut appender = TextAppender::open(&path, options.clone()).expect("open 1");
        appender.append_row(&["1", "alpha"]).expect("row 1");
        let report = appender.close().expect("close 1");
        assert_eq!(report.cnt_lines_appended, 1);
        assert_eq!(report.cnt_bytes_appended, "\n1;alpha".len() as u64);

        let mut appender = TextAppender::open(&path, options).expect("open 2");
        appender.append_row(&["2", "beta"]).expect("row 2");
        appender.append_row(&["3", ""]).expect("row 3");
        assert_eq!(appender.cnt_lines_appended(), 2);
        appender.close().expect("close 2");

        let txt = std::fs::read_to_string(&path).expect("read");
        assert_eq!(txt, "id;name\n1;alpha\n2;beta\n3;");
    }

    #[test]
    fn open_missing_directory_fails() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("missing/export.csv");
        assert!(TextAppender::open(&path, SpecTextAppendOptions::default()).is_err());
    }
}
