//! Error taxonomy shared by every pipeline stage.

use std::path::PathBuf;

use tabtick_io_fs::SinkIoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Header does not contain validator {0}.")]
    MissingValidator(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid column mapping: {0}")]
    InvalidMapping(String),

    #[error("Unknown row callback: {0}")]
    UnknownCallback(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Data source error: {0}")]
    Source(String),

    #[error("Row service error: {0}")]
    Service(String),

    #[error("Invalid tick state: {0}")]
    InvalidState(String),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for errors raised while loading settings, before any tick runs.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingValidator(_)
                | PipelineError::InvalidConfig(_)
                | PipelineError::InvalidMapping(_)
                | PipelineError::UnknownCallback(_)
        )
    }
}

impl From<SinkIoError> for PipelineError {
    fn from(err: SinkIoError) -> Self {
        PipelineError::Sink(err.to_string())
    }
}

impl From<figment::Error> for PipelineError {
    fn from(err: figment::Error) -> Self {
        PipelineError::InvalidConfig(err.to_string())
    }
}

impl From<polars::prelude::PolarsError> for PipelineError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        PipelineError::Source(err.to_string())
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_validator_names_the_field() {
        let err = PipelineError::MissingValidator("Name".to_string());
        assert_eq!(err.to_string(), "Header does not contain validator Name.");
        assert!(err.is_config_error());
    }

    #[test]
    fn sink_io_error_converts_to_sink() {
        let err: PipelineError = SinkIoError::UnsafeDestination("../x".to_string()).into();
        assert!(matches!(err, PipelineError::Sink(_)));
        assert!(!err.is_config_error());
    }
}
