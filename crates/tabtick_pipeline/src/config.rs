//! Pipeline configuration, import settings and tick context.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabtick_io_xlsx::{SpecXlsxAppendOptions, SpecXlsxDocumentProperties};
use tracing::info;

use crate::callback::EnumRowCallback;
use crate::conf::{
    C_DIR_EXPORT_DEFAULT, C_DIR_IMPORT_DEFAULT, C_ENV_PREFIX, N_EXPORT_SPEED_DEFAULT,
    N_IMPORT_SPEED_DEFAULT,
};
use crate::error::{PipelineError, PipelineResult};
use crate::header::parse_column_mapping;
use crate::spec::SpecColumnMapping;

////////////////////////////////////////////////////////////////////////////////
// #region PipelineConfig

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecPipelineConfig {
    /// Lines read per import tick.
    pub import_speed: usize,
    /// Rows written per export tick.
    pub export_speed: usize,
    /// Directory receiving export files.
    pub dir_export: PathBuf,
    /// Directory holding import files.
    pub dir_import: PathBuf,
    /// Worksheet name of spreadsheet exports.
    pub name_sheet: String,
    /// Title, subject and description of spreadsheet exports.
    pub title_document: String,
}

impl Default for SpecPipelineConfig {
    fn default() -> Self {
        Self {
            import_speed: N_IMPORT_SPEED_DEFAULT,
            export_speed: N_EXPORT_SPEED_DEFAULT,
            dir_export: PathBuf::from(C_DIR_EXPORT_DEFAULT),
            dir_import: PathBuf::from(C_DIR_IMPORT_DEFAULT),
            name_sheet: tabtick_io_xlsx::C_SHEET_NAME_DEFAULT.to_string(),
            title_document: tabtick_io_xlsx::C_SHEET_NAME_DEFAULT.to_string(),
        }
    }
}

impl SpecPipelineConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.import_speed == 0 {
            return Err(PipelineError::InvalidConfig(
                "import_speed must be >= 1.".to_string(),
            ));
        }
        if self.export_speed == 0 {
            return Err(PipelineError::InvalidConfig(
                "export_speed must be >= 1.".to_string(),
            ));
        }
        if self.name_sheet.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "name_sheet must not be empty.".to_string(),
            ));
        }
        Ok(())
    }

    /// Spreadsheet options derived from this config.
    pub fn derive_xlsx_options(&self) -> SpecXlsxAppendOptions {
        SpecXlsxAppendOptions {
            sheet_name: self.name_sheet.clone(),
            properties: SpecXlsxDocumentProperties::uniform(&self.title_document),
            ..Default::default()
        }
    }
}

/// Load config: defaults, then the TOML file (if given), then `TABTICK_*`
/// environment variables.
pub fn load_pipeline_config(path_file: Option<&Path>) -> PipelineResult<SpecPipelineConfig> {
    let mut figment = Figment::from(Serialized::defaults(SpecPipelineConfig::default()));
    if let Some(path_file) = path_file {
        figment = figment.merge(Toml::file(path_file));
    }
    let cfg: SpecPipelineConfig = figment.merge(Env::prefixed(C_ENV_PREFIX)).extract()?;
    cfg.validate()?;
    info!(
        import_speed = cfg.import_speed,
        export_speed = cfg.export_speed,
        dir_export = %cfg.dir_export.display(),
        "loaded pipeline config"
    );
    Ok(cfg)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ImportSetting

/// Import setting documents: column mapping, required fields, callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecImportSetting {
    pub mapping: SpecColumnMapping,
    /// Required logical fields, in diagnostic order.
    pub validators: Vec<String>,
    pub callbacks: Vec<EnumRowCallback>,
}

impl SpecImportSetting {
    /// Parse the three JSON documents.
    ///
    /// `validator` is an object (its keys are the required fields) or an
    /// array of names. `callback` is an object or array of callback names.
    pub fn from_json(mapper: &str, validator: &str, callback: Option<&str>) -> PipelineResult<Self> {
        let doc_mapper = parse_json_document("mapper", mapper)?;
        let mapping = parse_column_mapping(&doc_mapper)?;

        let doc_validator = parse_json_document("validator", validator)?;
        let validators = match doc_validator {
            Value::Object(dict_doc) => dict_doc.keys().cloned().collect(),
            Value::Array(l_doc) => l_doc
                .iter()
                .map(|value| match value {
                    Value::String(name) => Ok(name.clone()),
                    other => Err(PipelineError::InvalidConfig(format!(
                        "validator entries must be strings, got {other}"
                    ))),
                })
                .collect::<PipelineResult<Vec<_>>>()?,
            Value::Null => vec![],
            other => {
                return Err(PipelineError::InvalidConfig(format!(
                    "validator must be an object or an array, got {other}"
                )));
            }
        };

        let callbacks = match callback.map(str::trim).filter(|c_doc| !c_doc.is_empty()) {
            Some(c_doc) => parse_callbacks(&parse_json_document("callback", c_doc)?)?,
            None => vec![],
        };

        Ok(Self {
            mapping,
            validators,
            callbacks,
        })
    }
}

fn parse_json_document(name: &str, text: &str) -> PipelineResult<Value> {
    serde_json::from_str(text)
        .map_err(|err| PipelineError::InvalidConfig(format!("{name} is not valid JSON: {err}")))
}

fn parse_callbacks(doc: &Value) -> PipelineResult<Vec<EnumRowCallback>> {
    let l_names: Vec<&Value> = match doc {
        Value::Object(dict_doc) => dict_doc.values().collect(),
        Value::Array(l_doc) => l_doc.iter().collect(),
        Value::Null => vec![],
        other => {
            return Err(PipelineError::InvalidConfig(format!(
                "callback must be an object or an array, got {other}"
            )));
        }
    };
    l_names
        .into_iter()
        .map(|value| match value {
            Value::String(name) => name.parse::<EnumRowCallback>(),
            other => Err(PipelineError::UnknownCallback(other.to_string())),
        })
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TickContext

/// Explicit context handed to every stage and service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecTickContext {
    /// Opaque continuation link echoed into the import state.
    pub link: Option<String>,
    pub dir_export: PathBuf,
    /// File read by import ticks.
    pub path_file_import: Option<PathBuf>,
    pub config: SpecPipelineConfig,
}

impl SpecTickContext {
    pub fn new(config: SpecPipelineConfig) -> Self {
        Self {
            link: None,
            dir_export: config.dir_export.clone(),
            path_file_import: None,
            config,
        }
    }

    pub fn with_import_file(mut self, path_file: impl Into<PathBuf>) -> Self {
        self.path_file_import = Some(path_file.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Import file path, resolved against `dir_import` when relative.
    pub fn derive_import_path(&self) -> PipelineResult<PathBuf> {
        let path_file = self.path_file_import.as_ref().ok_or_else(|| {
            PipelineError::InvalidState("no import file in tick context".to_string())
        })?;
        if path_file.is_absolute() {
            Ok(path_file.clone())
        } else {
            Ok(self.config.dir_import.join(path_file))
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
