//! # matchx Storage
//!
//! Durable and in-memory homes for the data the matching pipeline keeps
//! between runs:
//!
//! - [`FileModelStore`] - the promoted classifier, replaced atomically
//! - [`TrainingSetStore`] - accumulated labeled examples
//! - [`FileLabelStore`] - the human review queue as an append-only log
//! - [`memory`] - in-memory column, job, result and label stores

pub mod error;
pub mod label_log;
pub mod memory;
pub mod model_store;
pub mod training_set;

pub use error::{Result, StorageError};
pub use label_log::FileLabelStore;
pub use memory::{MemoryColumnStore, MemoryJobStore, MemoryLabelStore, MemoryResultStore};
pub use model_store::{FileModelStore, MemoryModelStore, MODEL_FILENAME};
pub use training_set::{dedup_examples, TrainingSetStore};
