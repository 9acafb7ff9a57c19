//! Named row callbacks applied to `state.row` after every tick.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::spec::{EnumExportValue, EnumLogicalValue, EnumTickRow, SpecExportRow};

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static RE_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Closed set of text transforms selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumRowCallback {
    Trim,
    Lowercase,
    Uppercase,
    CollapseWhitespace,
    StripTags,
}

impl FromStr for EnumRowCallback {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trim" => Ok(Self::Trim),
            "lowercase" => Ok(Self::Lowercase),
            "uppercase" => Ok(Self::Uppercase),
            "collapse_whitespace" => Ok(Self::CollapseWhitespace),
            "strip_tags" => Ok(Self::StripTags),
            _ => Err(PipelineError::UnknownCallback(s.to_string())),
        }
    }
}

impl EnumRowCallback {
    pub fn apply_text(self, text: &str) -> String {
        match self {
            Self::Trim => text.trim().to_string(),
            Self::Lowercase => text.to_lowercase(),
            Self::Uppercase => text.to_uppercase(),
            Self::CollapseWhitespace => RE_WHITESPACE.replace_all(text, " ").into_owned(),
            Self::StripTags => RE_TAGS.replace_all(text, "").into_owned(),
        }
    }

    /// Rewrite every text value of `row` in place.
    pub fn apply_row(self, row: &mut EnumTickRow) {
        match row {
            EnumTickRow::Logical(row_logical) => {
                for value in row_logical.0.values_mut() {
                    match value {
                        EnumLogicalValue::Scalar(text) => *text = self.apply_text(text),
                        EnumLogicalValue::Multi(dict_parts) => {
                            for text in dict_parts.values_mut() {
                                *text = self.apply_text(text);
                            }
                        }
                    }
                }
            }
            EnumTickRow::Batch(l_rows) => {
                for row_export in l_rows {
                    self.apply_export_row(row_export);
                }
            }
            EnumTickRow::Record(row_export) => self.apply_export_row(row_export),
        }
    }

    fn apply_export_row(self, row: &mut SpecExportRow) {
        for (_, value) in row.cells.iter_mut() {
            self.apply_export_value(value);
        }
    }

    fn apply_export_value(self, value: &mut EnumExportValue) {
        match value {
            EnumExportValue::Text(text) => *text = self.apply_text(text),
            EnumExportValue::Attributes(inner) => self.apply_export_value(inner),
            _ => {}
        }
    }
}

/// Apply `callbacks` in order.
pub fn apply_callbacks(callbacks: &[EnumRowCallback], row: &mut EnumTickRow) {
    for callback in callbacks {
        callback.apply_row(row);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::spec::SpecLogicalRow;

    #[test]
    fn parses_known_names_and_rejects_unknown() {
        assert_eq!(
            "Strip_Tags".parse::<EnumRowCallback>().expect("known"),
            EnumRowCallback::StripTags
        );
        let err = "eval".parse::<EnumRowCallback>().expect_err("unknown");
        assert!(matches!(err, PipelineError::UnknownCallback(name) if name == "eval"));
    }

    #[test]
    fn callbacks_apply_in_order_to_logical_rows() {
        let mut row = EnumTickRow::Logical(SpecLogicalRow(BTreeMap::from([
            (
                "name".to_string(),
                EnumLogicalValue::Scalar("  <b>Ada</b>   Lovelace ".to_string()),
            ),
            (
                "phone".to_string(),
                EnumLogicalValue::Multi(BTreeMap::from([(0, " 123 ".to_string())])),
            ),
        ])));
        apply_callbacks(
            &[
                EnumRowCallback::StripTags,
                EnumRowCallback::CollapseWhitespace,
                EnumRowCallback::Trim,
                EnumRowCallback::Uppercase,
            ],
            &mut row,
        );
        let EnumTickRow::Logical(row_logical) = row else {
            panic!("row kind changed");
        };
        assert_eq!(
            row_logical.get("name"),
            Some(&EnumLogicalValue::Scalar("ADA LOVELACE".to_string()))
        );
        assert_eq!(
            row_logical.get("phone"),
            Some(&EnumLogicalValue::Multi(BTreeMap::from([(0, "123".to_string())])))
        );
    }

    #[test]
    fn callbacks_leave_non_text_export_values_alone() {
        let mut row = EnumTickRow::Record(
            SpecExportRow::new("1")
                .with_cell("n", EnumExportValue::Integer(5))
                .with_cell(
                    "t",
                    EnumExportValue::Attributes(Box::new(EnumExportValue::Text("AB".to_string()))),
                ),
        );
        EnumRowCallback::Lowercase.apply_row(&mut row);
        let EnumTickRow::Record(row_export) = row else {
            panic!("row kind changed");
        };
        assert_eq!(row_export.get("n"), Some(&EnumExportValue::Integer(5)));
        assert_eq!(
            row_export.get("t"),
            Some(&EnumExportValue::Attributes(Box::new(EnumExportValue::Text(
                "ab".to_string()
            ))))
        );
    }
}
