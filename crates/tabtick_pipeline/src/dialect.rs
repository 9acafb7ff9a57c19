//! Field delimiter detection.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};
use tracing::debug;

use crate::conf::{DELIMITER_DEFAULT, TUP_DELIMITER_CANDIDATES};
use crate::error::{PipelineError, PipelineResult};
use crate::spec::EnumDelimiter;

/// Detect the delimiter of the file at `path_file`.
///
/// The file is reopened once per candidate and only its first record is
/// parsed. The candidate yielding the most fields wins; on equal counts the
/// later candidate wins. An empty file yields the default delimiter.
pub fn detect(path_file: &Path) -> PipelineResult<EnumDelimiter> {
    let mut l_counts = Vec::with_capacity(TUP_DELIMITER_CANDIDATES.len());
    for delimiter in TUP_DELIMITER_CANDIDATES {
        let file = File::open(path_file).map_err(|err| PipelineError::io(path_file, err))?;
        l_counts.push((delimiter, count_first_record_fields(BufReader::new(file), delimiter)));
    }
    let delimiter = derive_winner(&l_counts);
    debug!(path = %path_file.display(), ?delimiter, ?l_counts, "detected delimiter");
    Ok(delimiter)
}

/// Same as [`detect`] on an in-memory sample.
pub fn detect_from_bytes(sample: &[u8]) -> EnumDelimiter {
    let l_counts: Vec<(EnumDelimiter, usize)> = TUP_DELIMITER_CANDIDATES
        .iter()
        .map(|delimiter| (*delimiter, count_first_record_fields(sample, *delimiter)))
        .collect();
    derive_winner(&l_counts)
}

/// Field count of the first record, parsed with `"` as the quote character.
///
/// `"` can therefore never split a record: the quote candidate scores one
/// field for any non-empty record.
fn count_first_record_fields<R: Read>(reader: R, delimiter: EnumDelimiter) -> usize {
    let n_byte_delimiter = match delimiter {
        EnumDelimiter::Quote => DELIMITER_DEFAULT.as_byte(),
        other => other.as_byte(),
    };
    let mut reader_csv = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(n_byte_delimiter)
        .from_reader(reader);
    let mut record = ByteRecord::new();
    let n_fields = match reader_csv.read_byte_record(&mut record) {
        Ok(true) => record.len(),
        _ => 0,
    };
    match delimiter {
        EnumDelimiter::Quote => n_fields.min(1),
        _ => n_fields,
    }
}

fn derive_winner(counts: &[(EnumDelimiter, usize)]) -> EnumDelimiter {
    let mut winner: Option<(EnumDelimiter, usize)> = None;
    for (delimiter, n_fields) in counts {
        if winner.is_none_or(|(_, n_best)| *n_fields >= n_best) {
            winner = Some((*delimiter, *n_fields));
        }
    }
    match winner {
        Some((delimiter, n_fields)) if n_fields > 0 => delimiter,
        _ => DELIMITER_DEFAULT,
    }
}
