//! Header resolution: raw header fields + column mapping -> resolved header.
//!
//! Resolution is a pure fold ([`accumulate_header`]) followed by validation
//! against the required fields ([`validate_header`]).

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};
use crate::spec::{EnumHeaderSlot, EnumMappingDirective, SpecColumnMapping, SpecResolvedHeader};

////////////////////////////////////////////////////////////////////////////////
// #region MappingDocument

/// Build a [`SpecColumnMapping`] from its JSON document.
///
/// Object entries map a raw column to ordered `{logicalField: value}`
/// directives. Array entries mark their key as a multi-part logical field.
pub fn parse_column_mapping(doc: &Value) -> PipelineResult<SpecColumnMapping> {
    let Value::Object(dict_doc) = doc else {
        return Err(PipelineError::InvalidMapping(
            "mapper must be a JSON object".to_string(),
        ));
    };

    let mut mapping = SpecColumnMapping::default();
    for (column, entry) in dict_doc {
        match entry {
            Value::Object(dict_entry) => {
                let mut l_directives = Vec::with_capacity(dict_entry.len());
                for (field, value) in dict_entry {
                    let directive = parse_directive(column, field, value)?;
                    if directive == EnumMappingDirective::Nested {
                        mapping.set_fields_multi.insert(field.clone());
                    }
                    l_directives.push((field.clone(), directive));
                }
                mapping.dict_directives.insert(column.clone(), l_directives);
            }
            Value::Array(_) => {
                mapping.set_fields_multi.insert(column.clone());
            }
            _ => {
                return Err(PipelineError::InvalidMapping(format!(
                    "mapping of column {column:?} must be an object or an array"
                )));
            }
        }
    }
    Ok(mapping)
}

fn parse_directive(column: &str, field: &str, value: &Value) -> PipelineResult<EnumMappingDirective> {
    let directive = match value {
        Value::Bool(flag) => EnumMappingDirective::Flag(*flag),
        Value::Number(num) => match num.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(n) => EnumMappingDirective::SubIndex(n),
            None => EnumMappingDirective::Text(num.to_string()),
        },
        Value::String(text) => match text.trim() {
            "stop" | "break" => EnumMappingDirective::Stop,
            c_trimmed => match c_trimmed.parse::<u32>() {
                Ok(n) => EnumMappingDirective::SubIndex(n),
                Err(_) => EnumMappingDirective::Text(text.clone()),
            },
        },
        Value::Object(_) | Value::Array(_) => EnumMappingDirective::Nested,
        Value::Null => {
            return Err(PipelineError::InvalidMapping(format!(
                "directive {field:?} of column {column:?} is null"
            )));
        }
    };
    Ok(directive)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Fold

/// Fold one header row into `partial`.
///
/// `fields` are raw header cells; their position is the column index. Cells
/// are trimmed before lookup.
pub fn accumulate_header<S: AsRef<str>>(
    partial: SpecResolvedHeader,
    fields: &[S],
    mapping: &SpecColumnMapping,
) -> SpecResolvedHeader {
    let mut dict_slots = partial.0;
    for (n_idx_col, field_raw) in fields.iter().enumerate() {
        let Some(l_directives) = mapping.directives(field_raw.as_ref().trim()) else {
            continue;
        };
        for (field, directive) in l_directives {
            apply_directive(&mut dict_slots, field, directive, n_idx_col, mapping);
        }
    }
    SpecResolvedHeader(dict_slots)
}

fn apply_directive(
    dict_slots: &mut BTreeMap<String, EnumHeaderSlot>,
    field: &str,
    directive: &EnumMappingDirective,
    n_idx_col: usize,
    mapping: &SpecColumnMapping,
) {
    let if_set = dict_slots.contains_key(field);
    match directive {
        EnumMappingDirective::SubIndex(n_sub) if !if_set => {
            dict_slots.insert(
                field.to_string(),
                EnumHeaderSlot::Multi(BTreeMap::from([(*n_sub, n_idx_col)])),
            );
        }
        EnumMappingDirective::Flag(_) if !if_set => {
            dict_slots.insert(field.to_string(), EnumHeaderSlot::Scalar(n_idx_col));
        }
        EnumMappingDirective::Stop if !if_set => {
            dict_slots.insert(field.to_string(), EnumHeaderSlot::Scalar(n_idx_col));
        }
        EnumMappingDirective::Stop => {}
        _ if mapping.is_multi_part(field) => {
            let slot = dict_slots
                .entry(field.to_string())
                .or_insert_with(|| EnumHeaderSlot::Multi(BTreeMap::new()));
            if let EnumHeaderSlot::Scalar(n_existing) = *slot {
                *slot = EnumHeaderSlot::Multi(BTreeMap::from([(0, n_existing)]));
            }
            if let EnumHeaderSlot::Multi(dict_parts) = slot {
                let n_sub = directive.sub_index().unwrap_or_else(|| {
                    dict_parts
                        .keys()
                        .next_back()
                        .map(|n_max| n_max + 1)
                        .unwrap_or(0)
                });
                dict_parts.insert(n_sub, n_idx_col);
            }
        }
        EnumMappingDirective::SubIndex(n_sub) => {
            let n_existing = match dict_slots.get(field) {
                Some(EnumHeaderSlot::Scalar(n_col)) => Some(*n_col),
                Some(EnumHeaderSlot::Multi(dict_parts)) => dict_parts.values().next().copied(),
                None => None,
            };
            let mut dict_parts = BTreeMap::from([(0, n_idx_col)]);
            if let Some(n_existing) = n_existing {
                dict_parts.insert(*n_sub, n_existing);
            }
            dict_slots.insert(field.to_string(), EnumHeaderSlot::Multi(dict_parts));
        }
        _ => {}
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Validation

/// Fail with the first required field (in `required` order) that is missing.
pub fn validate_header<S: AsRef<str>>(header: &SpecResolvedHeader, required: &[S]) -> PipelineResult<()> {
    match required
        .iter()
        .map(|field| field.as_ref())
        .find(|field| !header.contains(field))
    {
        Some(field) => Err(PipelineError::MissingValidator(field.to_string())),
        None => Ok(()),
    }
}

/// Fold one header row from scratch and validate it.
pub fn resolve_header<S: AsRef<str>, R: AsRef<str>>(
    fields: &[S],
    mapping: &SpecColumnMapping,
    required: &[R],
) -> PipelineResult<SpecResolvedHeader> {
    let header = accumulate_header(SpecResolvedHeader::default(), fields, mapping);
    validate_header(&header, required)?;
    Ok(header)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
