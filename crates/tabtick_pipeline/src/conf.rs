//! Pipeline constants.

use crate::spec::EnumDelimiter;

/// Delimiters probed by the dialect detector, in probing order.
pub const TUP_DELIMITER_CANDIDATES: [EnumDelimiter; 3] = [
    EnumDelimiter::Comma,
    EnumDelimiter::Semicolon,
    EnumDelimiter::Quote,
];
/// Delimiter used when no candidate yields a field.
pub const DELIMITER_DEFAULT: EnumDelimiter = EnumDelimiter::Comma;

/// Rows per import tick.
pub const N_IMPORT_SPEED_DEFAULT: usize = 100;
/// Rows per export tick.
pub const N_EXPORT_SPEED_DEFAULT: usize = 100;

/// Canonical text rendering of date and datetime cells.
pub const C_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Field separator of exported text files.
pub const C_TEXT_SEP_FIELD: &str = ";";

/// Extension of text exports.
pub const C_EXT_TEXT: &str = "csv";
/// Extension of spreadsheet exports.
pub const C_EXT_SPREADSHEET: &str = "xlsx";

/// Environment prefix read by [`crate::config::load_pipeline_config`].
pub const C_ENV_PREFIX: &str = "TABTICK_";
/// Directory receiving export files.
pub const C_DIR_EXPORT_DEFAULT: &str = "export";
/// Directory holding uploaded import files.
pub const C_DIR_IMPORT_DEFAULT: &str = "import";
