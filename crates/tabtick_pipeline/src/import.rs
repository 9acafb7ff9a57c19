//! Import stage: header preparation and byte-cursor ticks.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{SpecImportSetting, SpecTickContext};
use crate::dialect::detect;
use crate::error::{PipelineError, PipelineResult};
use crate::header::{accumulate_header, validate_header};
use crate::sanitize::{decode_line, sanitize};
use crate::service::TickService;
use crate::spec::{
    EnumDelimiter, EnumHeaderSlot, EnumLogicalValue, EnumTickRow, EnumTickStatus,
    SpecLogicalRow, SpecResolvedHeader, SpecTickState,
};

/// Detect the dialect, resolve the header and build the initial import state.
///
/// Lines are folded into the header until it maps at least one field. The
/// returned offset points just past that line; stop is the file size.
pub fn prepare_import(
    path_file: &Path,
    setting: &SpecImportSetting,
    service: &mut dyn TickService,
    ctx: &SpecTickContext,
) -> PipelineResult<SpecTickState> {
    let delimiter = detect(path_file)?;
    let file = File::open(path_file).map_err(|err| PipelineError::io(path_file, err))?;
    let n_size = file
        .metadata()
        .map_err(|err| PipelineError::io(path_file, err))?
        .len();

    let mut reader = BufReader::new(file);
    let mut header = SpecResolvedHeader::default();
    let mut n_offset = 0u64;
    let mut v_line = Vec::new();
    while header.is_empty() {
        v_line.clear();
        let n_read = reader
            .read_until(b'\n', &mut v_line)
            .map_err(|err| PipelineError::io(path_file, err))?;
        if n_read == 0 {
            break;
        }
        n_offset += n_read as u64;
        let l_fields = sanitize(&decode_line(&v_line), delimiter);
        header = accumulate_header(header, l_fields.as_slice(), &setting.mapping);
    }
    if header.is_empty() {
        return Err(PipelineError::InvalidMapping(format!(
            "no line of {} matches the column mapping",
            path_file.display()
        )));
    }
    validate_header(&header, &setting.validators)?;

    let mut state = SpecTickState::new(EnumTickStatus::Import);
    state.offset = n_offset;
    state.stop = n_size;
    state.batch_size = ctx.config.import_speed;
    state.delimiter = Some(delimiter);
    state.header = Some(header);
    state.file = path_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    state.link = ctx.link.clone();
    info!(
        path = %path_file.display(),
        ?delimiter,
        offset = state.offset,
        stop = state.stop,
        "prepared import"
    );
    service.prepare(state, ctx)
}

/// Read up to `batch_size` lines starting at `state.offset`.
///
/// Each line is mapped through `header` into `state.row` and handed to
/// `service.run`. The tick ends early when the read position reaches `stop`
/// or when the service moves `offset` to `stop`. A stream that ends before
/// `stop` moves `offset` to `stop` without calling the service.
pub fn run_import_tick<R: Read + Seek>(
    state: SpecTickState,
    header: &SpecResolvedHeader,
    delimiter: EnumDelimiter,
    reader: R,
    service: &mut dyn TickService,
    ctx: &SpecTickContext,
) -> PipelineResult<SpecTickState> {
    if state.batch_size == 0 {
        return Err(PipelineError::InvalidState(
            "import tick needs batch_size >= 1".to_string(),
        ));
    }
    let path_err = derive_error_path(ctx);
    let mut state = state;
    let mut reader = BufReader::new(reader);
    let mut n_pos = reader
        .stream_position()
        .map_err(|err| PipelineError::io(&path_err, err))?;
    let mut v_line = Vec::new();

    for _ in 0..state.batch_size {
        if state.offset >= state.stop {
            break;
        }
        if n_pos != state.offset {
            n_pos = reader
                .seek(SeekFrom::Start(state.offset))
                .map_err(|err| PipelineError::io(&path_err, err))?;
        }
        v_line.clear();
        let n_read = reader
            .read_until(b'\n', &mut v_line)
            .map_err(|err| PipelineError::io(&path_err, err))?;
        if n_read == 0 {
            // Stream shorter than at prepare time; nothing is left to read.
            warn!(offset = state.offset, stop = state.stop, "import stream ended before stop");
            state.offset = state.stop;
            break;
        }
        n_pos += n_read as u64;
        state.offset = n_pos;
        let if_last = state.offset >= state.stop;

        let l_fields = sanitize(&decode_line(&v_line), delimiter);
        state.row = Some(EnumTickRow::Logical(assemble_logical_row(header, &l_fields)));
        state = service.run(state, ctx)?;
        if if_last {
            break;
        }
    }
    debug!(offset = state.offset, stop = state.stop, "import tick");
    Ok(state)
}

/// Map sanitized fields onto logical fields; missing columns become `""`.
pub fn assemble_logical_row(header: &SpecResolvedHeader, fields: &[String]) -> SpecLogicalRow {
    let derive_field = |n_idx_col: usize| match fields.get(n_idx_col) {
        Some(c_value) => c_value.clone(),
        None => {
            debug!(column = n_idx_col, n_fields = fields.len(), "short line");
            String::new()
        }
    };
    SpecLogicalRow(
        header
            .0
            .iter()
            .map(|(field, slot)| {
                let value = match slot {
                    EnumHeaderSlot::Scalar(n_idx_col) => {
                        EnumLogicalValue::Scalar(derive_field(*n_idx_col))
                    }
                    EnumHeaderSlot::Multi(dict_parts) => EnumLogicalValue::Multi(
                        dict_parts
                            .iter()
                            .map(|(n_sub, n_idx_col)| (*n_sub, derive_field(*n_idx_col)))
                            .collect(),
                    ),
                };
                (field.clone(), value)
            })
            .collect(),
    )
}

fn derive_error_path(ctx: &SpecTickContext) -> PathBuf {
    ctx.derive_import_path()
        .unwrap_or_else(|_| PathBuf::from("<import stream>"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Cursor;

    use proptest::prelude::*;
    use serde_json::{Value, json};

    use super::*;
    use crate::config::SpecPipelineConfig;
    use crate::service::{FnTickService, PassthroughService};
    use crate::test_support::{TestDir, init_tracing};

    fn derive_setting() -> SpecImportSetting {
        SpecImportSetting::from_json(
            r#"{"Name": {"name": true}, "Email": {"email": "stop"}, "Phone": {"phone": 1}}"#,
            r#"["name"]"#,
            None,
        )
        .expect("setting")
    }

    fn derive_ctx(batch_size: usize) -> SpecTickContext {
        SpecTickContext::new(SpecPipelineConfig {
            import_speed: batch_size,
            ..Default::default()
        })
    }

    /// Service recording the `name` of every visited line into `state.data`.
    fn derive_recorder() -> impl TickService {
        FnTickService::new(|mut state: SpecTickState, _ctx: &SpecTickContext| {
            if let Some(EnumTickRow::Logical(row)) = &state.row
                && let Some(EnumLogicalValue::Scalar(name)) = row.get("name")
                && let Value::Array(l_seen) = &mut state.data
            {
                l_seen.push(Value::String(name.clone()));
            }
            Ok(state)
        })
    }

    fn run_tick_on_file(
        state: SpecTickState,
        path: &Path,
        service: &mut dyn TickService,
        ctx: &SpecTickContext,
    ) -> SpecTickState {
        let header = state.header.clone().expect("header");
        let delimiter = state.delimiter.expect("delimiter");
        let file = File::open(path).expect("open");
        run_import_tick(state, &header, delimiter, file, service, ctx).expect("tick")
    }

    #[test]
    fn prepare_skips_to_first_mapped_line() {
        init_tracing();
        let tmp = TestDir::new();
        let path = tmp.write("people.csv", b"report;2024\nName;Email;Status\nAda;a@x;1\n");
        let ctx = derive_ctx(10).with_link("/tick");
        let state = prepare_import(&path, &derive_setting(), &mut PassthroughService::new(), &ctx)
            .expect("prepare");

        assert_eq!(state.delimiter, Some(EnumDelimiter::Semicolon));
        assert_eq!(state.offset, "report;2024\nName;Email;Status\n".len() as u64);
        assert_eq!(state.stop, std::fs::metadata(&path).expect("meta").len());
        assert_eq!(state.batch_size, 10);
        assert_eq!(state.file.as_deref(), Some("people.csv"));
        assert_eq!(state.link.as_deref(), Some("/tick"));
        let header = state.header.expect("header");
        assert_eq!(header.get("name"), Some(&EnumHeaderSlot::Scalar(0)));
        assert_eq!(header.get("email"), Some(&EnumHeaderSlot::Scalar(1)));
    }

    #[test]
    fn prepare_resolves_a_fully_quoted_header() {
        let tmp = TestDir::new();
        let path = tmp.write(
            "quoted.csv",
            b"\"Name\";\"Email\"\n\"Ada\";\"a@x\"\n\"Grace\";\"g@x\"\n",
        );
        let ctx = derive_ctx(10);
        let mut service = derive_recorder();
        let state = prepare_import(&path, &derive_setting(), &mut service, &ctx).expect("prepare");
        assert_eq!(state.delimiter, Some(EnumDelimiter::Semicolon));
        assert_eq!(
            state.header.as_ref().and_then(|header| header.get("email")),
            Some(&EnumHeaderSlot::Scalar(1))
        );

        let state = run_tick_on_file(state, &path, &mut service, &ctx);
        assert!(state.is_terminal());
        assert_eq!(state.data, json!(["Ada", "Grace"]));
    }

    #[test]
    fn prepare_fails_naming_missing_validator() {
        let tmp = TestDir::new();
        let path = tmp.write("people.csv", b"Email;Status\na@x;1\n");
        let err = prepare_import(&path, &derive_setting(), &mut PassthroughService::new(), &derive_ctx(5))
            .expect_err("must fail");
        assert_eq!(err.to_string(), "Header does not contain validator name.");
    }

    #[test]
    fn prepare_fails_when_nothing_maps() {
        let tmp = TestDir::new();
        let path = tmp.write("empty.csv", b"");
        let err = prepare_import(&path, &derive_setting(), &mut PassthroughService::new(), &derive_ctx(5))
            .expect_err("must fail");
        assert!(matches!(err, PipelineError::InvalidMapping(_)));
    }

    #[test]
    fn batch_of_two_over_five_lines_advances_two_two_one() {
        let tmp = TestDir::new();
        let path = tmp.write("p.csv", b"Name;Email\na;1\nb;2\nc;3\nd;4\ne;5\n");
        let ctx = derive_ctx(2);
        let mut service = derive_recorder();
        let mut state =
            prepare_import(&path, &derive_setting(), &mut service, &ctx).expect("prepare");

        let mut l_visited_per_tick = vec![];
        while !state.is_terminal() {
            let n_before = state.data.as_array().map(Vec::len).unwrap_or(0);
            state = run_tick_on_file(state, &path, &mut service, &ctx);
            let n_after = state.data.as_array().map(Vec::len).unwrap_or(0);
            l_visited_per_tick.push(n_after - n_before);
        }
        assert_eq!(l_visited_per_tick, vec![2, 2, 1]);
        assert_eq!(state.offset, state.stop);
        assert_eq!(state.data, json!(["a", "b", "c", "d", "e"]));
    }

    #[test]
    fn short_lines_yield_empty_fields() {
        let header = SpecResolvedHeader(BTreeMap::from([
            ("name".to_string(), EnumHeaderSlot::Scalar(0)),
            (
                "phone".to_string(),
                EnumHeaderSlot::Multi(BTreeMap::from([(0, 1), (1, 5)])),
            ),
        ]));
        let row = assemble_logical_row(&header, &["Ada".to_string(), "123".to_string()]);
        assert_eq!(
            row.get("phone"),
            Some(&EnumLogicalValue::Multi(BTreeMap::from([
                (0, "123".to_string()),
                (1, String::new())
            ])))
        );
    }

    #[test]
    fn service_can_end_tick_early() {
        let body = b"Name\nx\ny\nz\n";
        let header = SpecResolvedHeader(BTreeMap::from([(
            "name".to_string(),
            EnumHeaderSlot::Scalar(0),
        )]));
        let mut state = SpecTickState::new(EnumTickStatus::Import);
        state.offset = 5;
        state.stop = body.len() as u64;
        state.batch_size = 10;
        let mut n_calls = 0;
        let mut service = FnTickService::new(|mut state: SpecTickState, _ctx: &SpecTickContext| {
            n_calls += 1;
            state.offset = state.stop;
            Ok(state)
        });
        let state = run_import_tick(
            state,
            &header,
            EnumDelimiter::Comma,
            Cursor::new(&body[..]),
            &mut service,
            &derive_ctx(10),
        )
        .expect("tick");
        drop(service);
        assert_eq!(n_calls, 1);
        assert!(state.is_terminal());
    }

    #[test]
    fn failed_service_call_is_retried_from_the_same_line() {
        let body = b"Name\nx\ny\n";
        let header = SpecResolvedHeader(BTreeMap::from([(
            "name".to_string(),
            EnumHeaderSlot::Scalar(0),
        )]));
        let mut state = SpecTickState::new(EnumTickStatus::Import);
        state.offset = 5;
        state.stop = body.len() as u64;
        state.batch_size = 1;
        let c_payload = serde_json::to_string(&state).expect("serialize");

        let mut n_calls = 0;
        let mut service = FnTickService::new(|mut state: SpecTickState, _ctx: &SpecTickContext| {
            n_calls += 1;
            if n_calls == 1 {
                return Err(PipelineError::Service("nope".to_string()));
            }
            if let Some(EnumTickRow::Logical(row)) = &state.row
                && let Some(EnumLogicalValue::Scalar(name)) = row.get("name")
                && let Value::Array(l_seen) = &mut state.data
            {
                l_seen.push(json!(name));
            }
            Ok(state)
        });
        let ctx = derive_ctx(1);
        let mut derive_result = || {
            run_import_tick(
                serde_json::from_str(&c_payload).expect("deserialize"),
                &header,
                EnumDelimiter::Comma,
                Cursor::new(&body[..]),
                &mut service,
                &ctx,
            )
        };
        assert!(matches!(derive_result(), Err(PipelineError::Service(_))));
        let state = derive_result().expect("retry");
        assert_eq!(state.offset, 7);
        assert_eq!(state.data, json!(["x"]));
    }

    #[test]
    fn stream_shorter_than_stop_ends_the_import() {
        let body = b"Name\nx\n";
        let header = SpecResolvedHeader(BTreeMap::from([(
            "name".to_string(),
            EnumHeaderSlot::Scalar(0),
        )]));
        let mut state = SpecTickState::new(EnumTickStatus::Import);
        state.offset = 7;
        state.stop = 20;
        state.batch_size = 3;
        let mut n_calls = 0;
        let mut service = FnTickService::new(|state: SpecTickState, _ctx: &SpecTickContext| {
            n_calls += 1;
            Ok(state)
        });
        let state = run_import_tick(
            state,
            &header,
            EnumDelimiter::Comma,
            Cursor::new(&body[..]),
            &mut service,
            &derive_ctx(3),
        )
        .expect("tick");
        drop(service);
        assert_eq!(n_calls, 0);
        assert_eq!(state.offset, 20);
        assert!(state.is_terminal());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 48,
            failure_persistence: None,
            .. ProptestConfig::default()
        })]

        #[test]
        fn ticks_visit_every_line_once_in_order(
            l_names in proptest::collection::vec("[a-z]{1,6}", 0..20),
            n_batch in 1usize..6,
        ) {
            let tmp = TestDir::new();
            let mut c_body = String::from("Name;Email\n");
            for (n_idx, name) in l_names.iter().enumerate() {
                c_body.push_str(&format!("{name};{n_idx}\n"));
            }
            let path = tmp.write("p.csv", c_body.as_bytes());
            let ctx = derive_ctx(n_batch);
            let mut service = derive_recorder();
            let mut state =
                prepare_import(&path, &derive_setting(), &mut service, &ctx).expect("prepare");

            let mut n_ticks = 0;
            while !state.is_terminal() {
                state = run_tick_on_file(state, &path, &mut service, &ctx);
                n_ticks += 1;
                prop_assert!(n_ticks <= l_names.len() + 1, "cursor stalled");
            }
            let l_expected: Vec<Value> = l_names.iter().cloned().map(Value::String).collect();
            prop_assert_eq!(state.data, Value::Array(l_expected));
            prop_assert_eq!(state.offset, state.stop);
        }
    }
}
