use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Checksum mismatch in {path}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Unsupported artifact format {0}")]
    UnsupportedFormat(u32),

    #[error("Corrupt log line {line}: {reason}")]
    CorruptLog { line: usize, reason: String },

    #[error(transparent)]
    Core(#[from] matchx_core::Error),
}

impl From<StorageError> for matchx_core::Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Core(inner) => inner,
            StorageError::Io(io) => matchx_core::Error::Io(io),
            other => matchx_core::Error::Storage(other.to_string()),
        }
    }
}

impl<E> From<atomicwrites::Error<E>> for StorageError
where
    E: Into<StorageError>,
{
    fn from(e: atomicwrites::Error<E>) -> Self {
        match e {
            atomicwrites::Error::Internal(io) => StorageError::Io(io),
            atomicwrites::Error::User(inner) => inner.into(),
        }
    }
}
