use thiserror::Error;

use crate::job::JobStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table is empty: {0}")]
    EmptyInput(String),

    #[error("Unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("No column selected for table {0}")]
    NoColumns(String),

    #[error("No text left after cleaning")]
    NoText,

    #[error("Need at least 2 usable rows, got {0}")]
    InsufficientRows(usize),

    #[error("Invalid matrix shape: expected {expected} values, got {actual}")]
    InvalidShape { expected: usize, actual: usize },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job already exists: {0}")]
    JobExists(String),

    #[error("Invalid job transition for {job_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Labeling task not found: {0}")]
    TaskNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
