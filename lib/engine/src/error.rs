use thiserror::Error;

use matchx_similarity::TrainError;
use matchx_storage::StorageError;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] matchx_core::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Training failed: {0}")]
    Train(#[from] TrainError),

    #[error("Matching job panicked: {0}")]
    JobPanicked(String),

    #[error("Worker pool stopped")]
    WorkerStopped,

    #[error("Failed to start worker: {0}")]
    WorkerSpawn(std::io::Error),
}
