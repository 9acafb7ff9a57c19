//! Text sink specification models and top-level error types.

use std::fmt;
use std::path::PathBuf;

////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Input options for [`crate::text::TextAppender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTextAppendOptions {
    /// Separator placed between fields of one row.
    pub sep_field: String,
    /// Line break written *before* every appended row.
    pub sep_line: String,
    /// Call `fsync` before the appender is closed.
    pub if_sync_all: bool,
}

impl Default for SpecTextAppendOptions {
    fn default() -> Self {
        Self {
            sep_field: ";".to_string(),
            sep_line: "\n".to_string(),
            if_sync_all: true,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportsAndErrors

/// Result of one open/append/close cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecTextAppendReport {
    /// Target file.
    pub path: PathBuf,
    /// Rows appended during this cycle.
    pub cnt_lines_appended: u64,
    /// Bytes appended during this cycle.
    pub cnt_bytes_appended: u64,
}

/// Sink-level filesystem failures.
#[derive(Debug)]
pub enum SinkIoError {
    /// Destination escapes its root or traverses a symlink.
    UnsafeDestination(String),
    /// Sink directory could not be created or is not a directory.
    DirectoryInitFailed {
        /// Directory that failed initialization.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
    /// Sink file could not be opened.
    OpenFailed {
        /// File that failed to open.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
    /// Write, flush or sync failed.
    WriteFailed {
        /// File being written.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
}

impl fmt::Display for SinkIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsafeDestination(msg) => write!(f, "{msg}"),
            Self::DirectoryInitFailed { path, message } => write!(
                f,
                "Failed to initialize sink directory {}: {message}",
                path.display()
            ),
            Self::OpenFailed { path, message } => {
                write!(f, "Failed to open sink {}: {message}", path.display())
            }
            Self::WriteFailed { path, message } => {
                write!(f, "Failed to write sink {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for SinkIoError {}

// #endregion
////////////////////////////////////////////////////////////////////////////////
