use std::path::PathBuf;

use thiserror::Error;

use crate::models::Sheet;

#[derive(Error, Debug)]
pub enum SurveyError {
    /// Bad keyboard input; the caller re-prompts.
    #[error("{0}")]
    InvalidInput(String),

    #[error("remote store error: {0}")]
    RemoteStore(String),

    #[error("malformed row {row} in the {sheet} sheet: {reason}")]
    MalformedRow {
        sheet: Sheet,
        row: usize,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("report error: {0}")]
    Report(#[from] csv::Error),

    #[error("no report found at {}; export the analysis first", path.display())]
    ReportMissing { path: PathBuf },

    #[error("input closed")]
    InputClosed,
}

impl From<sqlx::Error> for SurveyError {
    fn from(err: sqlx::Error) -> Self {
        SurveyError::RemoteStore(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for SurveyError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        SurveyError::RemoteStore(err.to_string())
    }
}

pub type SurveyResult<T> = Result<T, SurveyError>;
