//! Raw line normalization.

use encoding_rs::WINDOWS_1250;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::spec::EnumDelimiter;

static RE_DISALLOWED_TOKENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<\?php|""#).expect("valid disallowed-token regex"));

/// Split one raw line into fields.
///
/// Removes `<?php` tokens and double quotes, drops one trailing `\n` or
/// `\r\n`, then splits on `delimiter`. Fields are not trimmed.
pub fn sanitize(raw_line: &str, delimiter: EnumDelimiter) -> Vec<String> {
    let c_line = match raw_line.strip_suffix('\n') {
        Some(c_rest) => c_rest.strip_suffix('\r').unwrap_or(c_rest),
        None => raw_line,
    };
    let c_clean = RE_DISALLOWED_TOKENS.replace_all(c_line, "");
    if c_clean.trim().is_empty() {
        return vec![String::new()];
    }
    c_clean
        .split(delimiter.as_char())
        .map(str::to_string)
        .collect()
}

/// Decode raw bytes as UTF-8, falling back to windows-1250.
pub fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(c_text) => c_text.to_string(),
        Err(_) => {
            let (c_text, _, _) = WINDOWS_1250.decode(bytes);
            c_text.into_owned()
        }
    }
}
