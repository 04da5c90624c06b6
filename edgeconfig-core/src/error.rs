//! Error types shared by every editor, repository and batch job.

use std::path::PathBuf;
use thiserror::Error;

use crate::validate::ValidationErrors;

/// Errors raised by the configuration library.
///
/// Nothing in the library terminates the process; the binaries decide what a
/// failure means for them.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not connect to schema '{schema}' after {attempts} attempt(s): {source}")]
    Connection {
        schema: String,
        attempts: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("{table} '{key}' was removed by another session before it could be saved")]
    StaleRecord { table: String, key: String },

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown field '{field}' for table {table}")]
    UnknownField { table: String, field: String },

    #[error("{table} '{key}' not found")]
    NotFound { table: String, key: String },

    #[error("No record selected")]
    NoSelection,

    #[error("Table {0} is not a bitmask table")]
    NotBitmask(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid certificate: {0}")]
    Certificate(String),

    #[error("{program} failed ({status}): {stderr}")]
    ExternalCommand {
        program: String,
        status: String,
        stderr: String,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
