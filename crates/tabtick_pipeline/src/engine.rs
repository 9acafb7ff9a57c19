//! Tick driver: stage services, status dispatch and row callbacks.

use std::fs::File;

use serde_json::Value;
use tracing::info;

use crate::callback::apply_callbacks;
use crate::config::{SpecImportSetting, SpecTickContext};
use crate::error::{PipelineError, PipelineResult};
use crate::export::{SpecExportRequest, prepare_export, run_export_tick};
use crate::import::{prepare_import, run_import_tick};
use crate::process::{prepare_process, run_process_tick};
use crate::service::{ColumnAnnotations, PassthroughService, SpecColumnAnnotations, TickService};
use crate::source::OrderedDataSource;
use crate::spec::{EnumTickStatus, SpecTickState};

/// Handler running one tick of a stage.
pub type FnTickHandler =
    fn(&mut TickEngine, SpecTickState, &SpecTickContext) -> PipelineResult<SpecTickState>;

/// Status -> tick handler.
pub fn derive_tick_handler(status: EnumTickStatus) -> FnTickHandler {
    match status {
        EnumTickStatus::Import => handle_import_tick,
        EnumTickStatus::Export | EnumTickStatus::Excel => handle_export_tick,
        EnumTickStatus::Process => handle_process_tick,
    }
}

fn handle_import_tick(
    engine: &mut TickEngine,
    state: SpecTickState,
    ctx: &SpecTickContext,
) -> PipelineResult<SpecTickState> {
    let header = state
        .header
        .clone()
        .ok_or_else(|| PipelineError::InvalidState("import state has no header".to_string()))?;
    let delimiter = state
        .delimiter
        .ok_or_else(|| PipelineError::InvalidState("import state has no delimiter".to_string()))?;
    let path_file = ctx.derive_import_path()?;
    let file = File::open(&path_file).map_err(|err| PipelineError::io(&path_file, err))?;
    run_import_tick(
        state,
        &header,
        delimiter,
        file,
        engine.service_import.as_mut(),
        ctx,
    )
}

fn handle_export_tick(
    engine: &mut TickEngine,
    state: SpecTickState,
    ctx: &SpecTickContext,
) -> PipelineResult<SpecTickState> {
    run_export_tick(
        state,
        engine.source.as_ref(),
        engine.annotations.as_ref(),
        engine.service_export.as_mut(),
        ctx,
    )
}

fn handle_process_tick(
    engine: &mut TickEngine,
    state: SpecTickState,
    ctx: &SpecTickContext,
) -> PipelineResult<SpecTickState> {
    run_process_tick(
        state,
        engine.source.as_ref(),
        engine.service_process.as_mut(),
        ctx,
    )
}

/// Owns the collaborators of all three stages.
///
/// The engine holds no cursor: every call takes the caller's state and
/// returns the next one, leaving the input untouched on error.
pub struct TickEngine {
    service_import: Box<dyn TickService + Send>,
    service_export: Box<dyn TickService + Send>,
    service_process: Box<dyn TickService + Send>,
    source: Box<dyn OrderedDataSource + Send>,
    annotations: Box<dyn ColumnAnnotations + Send>,
}

impl TickEngine {
    pub fn new(source: impl OrderedDataSource + Send + 'static) -> Self {
        Self {
            service_import: Box::new(PassthroughService::new()),
            service_export: Box::new(PassthroughService::new()),
            service_process: Box::new(PassthroughService::new()),
            source: Box::new(source),
            annotations: Box::new(SpecColumnAnnotations::default()),
        }
    }

    pub fn with_import_service(mut self, service: impl TickService + Send + 'static) -> Self {
        self.service_import = Box::new(service);
        self
    }

    pub fn with_export_service(mut self, service: impl TickService + Send + 'static) -> Self {
        self.service_export = Box::new(service);
        self
    }

    pub fn with_process_service(mut self, service: impl TickService + Send + 'static) -> Self {
        self.service_process = Box::new(service);
        self
    }

    pub fn with_annotations(mut self, annotations: impl ColumnAnnotations + Send + 'static) -> Self {
        self.annotations = Box::new(annotations);
        self
    }

    fn service(&self, status: EnumTickStatus) -> &dyn TickService {
        match status {
            EnumTickStatus::Import => self.service_import.as_ref(),
            EnumTickStatus::Export | EnumTickStatus::Excel => self.service_export.as_ref(),
            EnumTickStatus::Process => self.service_process.as_ref(),
        }
    }

    fn service_mut(&mut self, status: EnumTickStatus) -> &mut dyn TickService {
        match status {
            EnumTickStatus::Import => self.service_import.as_mut(),
            EnumTickStatus::Export | EnumTickStatus::Excel => self.service_export.as_mut(),
            EnumTickStatus::Process => self.service_process.as_mut(),
        }
    }

    /// Prepare an import of `ctx.path_file_import`.
    pub fn prepare_import(
        &mut self,
        setting: &SpecImportSetting,
        ctx: &SpecTickContext,
    ) -> PipelineResult<SpecTickState> {
        let path_file = ctx.derive_import_path()?;
        prepare_import(&path_file, setting, self.service_import.as_mut(), ctx)
    }

    pub fn prepare_export(
        &mut self,
        request: &SpecExportRequest,
        ctx: &SpecTickContext,
    ) -> PipelineResult<SpecTickState> {
        prepare_export(
            request,
            self.source.as_ref(),
            self.annotations.as_ref(),
            self.service_export.as_mut(),
            ctx,
        )
    }

    pub fn prepare_process(&mut self, filters: Value, ctx: &SpecTickContext) -> PipelineResult<SpecTickState> {
        prepare_process(filters, self.source.as_ref(), self.service_process.as_mut(), ctx)
    }

    /// Run one tick of the stage named by `state.status`, then apply the
    /// stage service's callbacks to `row`.
    pub fn run_tick(&mut self, state: &SpecTickState, ctx: &SpecTickContext) -> PipelineResult<SpecTickState> {
        let status = state.status;
        let fn_handler = derive_tick_handler(status);
        let mut state_next = fn_handler(self, state.clone(), ctx)?;
        if let Some(row) = state_next.row.as_mut() {
            apply_callbacks(self.service(status).callbacks(), row);
        }
        Ok(state_next)
    }

    /// Let the stage service finalize.
    pub fn done(&mut self, state: &SpecTickState, ctx: &SpecTickContext) -> PipelineResult<SpecTickState> {
        info!(status = ?state.status, offset = state.offset, stop = state.stop, "done");
        self.service_mut(state.status).done(state.clone(), ctx)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::callback::EnumRowCallback;
    use crate::config::SpecPipelineConfig;
    use crate::service::FnTickService;
    use crate::source::VecDataSource;
    use crate::spec::{EnumExportValue, EnumLogicalValue, EnumSinkKind, EnumTickRow, SpecExportRow};
    use crate::test_support::{TestDir, init_tracing};

    fn derive_source() -> VecDataSource {
        VecDataSource::new(
            (1..=3)
                .map(|n| {
                    SpecExportRow::new(n.to_string())
                        .with_cell("id", EnumExportValue::Integer(n))
                        .with_cell("title", EnumExportValue::Text(format!("  Item {n} ")))
                })
                .collect(),
        )
    }

    #[test]
    fn dispatch_routes_export_and_excel_to_the_export_handler() {
        let ctx = SpecTickContext::new(SpecPipelineConfig::default());
        let mut engine = TickEngine::new(derive_source());
        for status in [EnumTickStatus::Export, EnumTickStatus::Excel] {
            let mut state = SpecTickState::new(status);
            state.stop = 1;
            state.batch_size = 1;
            let err = derive_tick_handler(status)(&mut engine, state, &ctx).expect_err("no file");
            assert!(err.to_string().contains("export state has no file"));
        }

        let mut state = SpecTickState::new(EnumTickStatus::Process);
        state.stop = 3;
        let state = derive_tick_handler(EnumTickStatus::Process)(&mut engine, state, &ctx)
            .expect("process tick");
        assert_eq!(state.offset, 1);
        assert!(matches!(&state.row, Some(EnumTickRow::Record(row)) if row.row_id == "1"));
    }

    #[test]
    fn import_round_trips_state_through_json_between_ticks() {
        init_tracing();
        let tmp = TestDir::new();
        tmp.write("people.csv", b"Name;Email\n Ada ;a@x\n Grace ;g@x\nAlan;t@x\n");
        let mut cfg = SpecPipelineConfig {
            import_speed: 2,
            ..Default::default()
        };
        cfg.dir_import = tmp.path().to_path_buf();
        let ctx = SpecTickContext::new(cfg).with_import_file("people.csv");
        let setting = SpecImportSetting::from_json(
            r#"{"Name": {"name": true}, "Email": {"email": true}}"#,
            r#"{"name": 1}"#,
            Some(r#"["trim", "uppercase"]"#),
        )
        .expect("setting");

        let service = FnTickService::new(|mut state: SpecTickState, _ctx: &SpecTickContext| {
            if let Some(EnumTickRow::Logical(row)) = &state.row
                && let Some(EnumLogicalValue::Scalar(name)) = row.get("name")
                && let Value::Array(l_seen) = &mut state.data
            {
                l_seen.push(json!(name));
            }
            Ok(state)
        })
        .with_callbacks(setting.callbacks.clone());
        let mut engine = TickEngine::new(VecDataSource::default()).with_import_service(service);

        let state = engine.prepare_import(&setting, &ctx).expect("prepare");
        let mut c_payload = serde_json::to_string(&state).expect("serialize");
        loop {
            let state: SpecTickState = serde_json::from_str(&c_payload).expect("deserialize");
            if state.is_terminal() {
                break;
            }
            let state = engine.run_tick(&state, &ctx).expect("tick");
            c_payload = serde_json::to_string(&state).expect("serialize");
        }
        let state: SpecTickState = serde_json::from_str(&c_payload).expect("deserialize");
        assert_eq!(state.data, json!([" Ada ", " Grace ", "Alan"]));
        assert_eq!(
            state.row,
            Some(EnumTickRow::Logical(crate::spec::SpecLogicalRow(
                [
                    ("email".to_string(), EnumLogicalValue::Scalar("T@X".to_string())),
                    ("name".to_string(), EnumLogicalValue::Scalar("ALAN".to_string())),
                ]
                .into_iter()
                .collect()
            )))
        );

        let state = engine.done(&state, &ctx).expect("done");
        assert!(state.is_terminal());
    }

    #[test]
    fn unreadable_import_file_fails_the_tick_and_resumes_from_the_same_offset() {
        let tmp = TestDir::new();
        let c_body: &[u8] = b"Name;Email\nAda;a@x\nGrace;g@x\n";
        let path = tmp.write("people.csv", c_body);
        let mut cfg = SpecPipelineConfig {
            import_speed: 1,
            ..Default::default()
        };
        cfg.dir_import = tmp.path().to_path_buf();
        let ctx = SpecTickContext::new(cfg).with_import_file("people.csv");
        let setting =
            SpecImportSetting::from_json(r#"{"Name": {"name": true}}"#, r#"["name"]"#, None)
                .expect("setting");
        let mut engine = TickEngine::new(VecDataSource::default());

        let state = engine.prepare_import(&setting, &ctx).expect("prepare");
        let n_offset = state.offset;
        let c_payload = serde_json::to_string(&state).expect("serialize");

        std::fs::remove_file(&path).expect("remove");
        let state: SpecTickState = serde_json::from_str(&c_payload).expect("deserialize");
        let err = engine.run_tick(&state, &ctx).expect_err("file is gone");
        assert!(matches!(err, PipelineError::Io { .. }));
        assert_eq!(state.offset, n_offset);

        tmp.write("people.csv", c_body);
        let state: SpecTickState = serde_json::from_str(&c_payload).expect("deserialize");
        let state = engine.run_tick(&state, &ctx).expect("retry");
        assert_eq!(state.offset, n_offset + "Ada;a@x\n".len() as u64);
        assert!(matches!(
            &state.row,
            Some(EnumTickRow::Logical(row))
                if row.get("name") == Some(&EnumLogicalValue::Scalar("Ada".to_string()))
        ));
    }

    #[test]
    fn import_tick_without_header_is_invalid_state() {
        let ctx = SpecTickContext::new(SpecPipelineConfig::default()).with_import_file("x.csv");
        let mut engine = TickEngine::new(VecDataSource::default());
        let mut state = SpecTickState::new(EnumTickStatus::Import);
        state.stop = 10;
        state.batch_size = 1;
        let err = engine.run_tick(&state, &ctx).expect_err("must fail");
        assert!(matches!(err, PipelineError::InvalidState(_)));
    }

    #[test]
    fn export_and_process_run_through_the_engine() {
        let tmp = TestDir::new();
        let cfg = SpecPipelineConfig {
            export_speed: 2,
            dir_export: tmp.path().join("export"),
            ..Default::default()
        };
        let ctx = SpecTickContext::new(cfg);
        let mut engine = TickEngine::new(derive_source())
            .with_annotations(SpecColumnAnnotations::default().with_label("title", "Title"))
            .with_export_service(PassthroughService::with_callbacks(vec![EnumRowCallback::Trim]))
            .with_process_service(FnTickService::new(
                |mut state: SpecTickState, _ctx: &SpecTickContext| {
                    state.data = json!(state.offset);
                    Ok(state)
                },
            ));

        let mut state = engine
            .prepare_export(&SpecExportRequest::new("1", EnumSinkKind::Text), &ctx)
            .expect("prepare export");
        while !state.is_terminal() {
            state = engine.run_tick(&state, &ctx).expect("export tick");
        }
        let c_text = std::fs::read_to_string(tmp.path().join("export/1.csv")).expect("read");
        assert_eq!(c_text, "id;Title\n1;  Item 1 \n2;  Item 2 \n3;  Item 3 ");
        assert!(matches!(
            &state.row,
            Some(EnumTickRow::Batch(l_rows))
                if l_rows[0].get("title") == Some(&EnumExportValue::Text("Item 3".to_string()))
        ));
        engine.done(&state, &ctx).expect("done export");

        let mut state = engine.prepare_process(Value::Null, &ctx).expect("prepare process");
        let mut n_ticks = 0;
        while !state.is_terminal() {
            state = engine.run_tick(&state, &ctx).expect("process tick");
            n_ticks += 1;
        }
        assert_eq!(n_ticks, 3);
        assert_eq!(state.data, json!(3));
    }
}
