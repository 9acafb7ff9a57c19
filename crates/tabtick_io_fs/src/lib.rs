//! `tabtick_io_fs` v1:
//! Rust-side filesystem kernel for tick sinks.
//!
//! Modules:
//! - `spec`   : options/reports/errors
//! - `util`   : sink directory preparation and destination path safety
//! - `text`   : append-only delimited text writer
//! - `atomic` : whole-file atomic replacement

pub mod atomic;
pub mod spec;
pub mod text;
mod util;

pub use atomic::replace_file_atomic;
pub use spec::{SinkIoError, SpecTextAppendOptions, SpecTextAppendReport};
pub use text::{TextAppender, write_text_header};
pub use util::{derive_sink_file_path, prepare_sink_directory};
