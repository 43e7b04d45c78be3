use thiserror::Error;

pub type TrainResult<T> = std::result::Result<T, TrainError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainError {
    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Training set contains a single class")]
    SingleClass,

    #[error("Shape mismatch: {features} feature rows, {targets} targets")]
    ShapeMismatch { features: usize, targets: usize },

    #[error("Invalid training parameters: {0}")]
    InvalidParams(String),
}
