use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

pub type Result<T> = std::result::Result<T, VizError>;

/// Every failure a pipeline run can end with. All of them are fatal to the
/// run that raised them.
#[derive(Debug, Error)]
pub enum VizError {
    /// No input data could be obtained (file missing, dialog cancelled).
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("insufficient data for {operation}: {detail}")]
    InsufficientData {
        operation: &'static str,
        detail: String,
    },

    #[error("failed to parse {context}: {message}")]
    Parse { context: String, message: String },

    #[error("rendering failed: {0}")]
    Render(String),

    #[error("could not write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Problems with the shape of a table rather than with its values' amount.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("column '{column}' row {row}: '{value}' is not numeric")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("column '{column}' row {row}: '{value}' is not a date")]
    NotADate {
        column: String,
        row: usize,
        value: String,
    },

    #[error("no column matches '{pattern}' for {logical}")]
    NoMatchingColumn { logical: String, pattern: String },
}

impl SchemaError {
    /// Name of the column this error is about, when there is one.
    pub fn column(&self) -> Option<&str> {
        match self {
            SchemaError::MissingColumn(c) | SchemaError::DuplicateColumn(c) => Some(c),
            SchemaError::LengthMismatch { column, .. }
            | SchemaError::NonNumeric { column, .. }
            | SchemaError::NotADate { column, .. } => Some(column),
            SchemaError::NoMatchingColumn { .. } => None,
        }
    }
}

impl VizError {
    pub(crate) fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        VizError::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn insufficient(operation: &'static str, detail: impl Into<String>) -> Self {
        VizError::InsufficientData {
            operation,
            detail: detail.into(),
        }
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for VizError
{
    fn from(err: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        VizError::Render(err.to_string())
    }
}
