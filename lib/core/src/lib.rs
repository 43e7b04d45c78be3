//! # matchx Core
//!
//! Core library for the matchx record linkage engine.
//!
//! This crate provides the data model and the candidate generation stage:
//!
//! - [`Record`] - An immutable source row with its cached combined text
//! - [`TfidfVectorizer`] - Character n-gram TF-IDF vectors
//! - [`BlockingEngine`] - Chunked exact k-NN search producing [`Candidate`] pairs
//! - [`ProgressRegistry`] - Per-batch progress shared with pollers
//! - [`JobRecord`] - Matching batch lifecycle
//! - [`store`] - Traits for the column, job, label and result stores
//!
//! ## Example
//!
//! ```rust
//! use matchx_core::{BlockingConfig, BlockingEngine, NoProgress, TfidfVectorizer};
//!
//! let docs = ["pt sumber makmur", "sumber makmur pt", "toko jaya abadi"];
//! let (_, matrix) = TfidfVectorizer::default().fit_transform(&docs).unwrap();
//!
//! let engine = BlockingEngine::new(BlockingConfig::default());
//! let candidates = engine.candidates(&matrix, &NoProgress).unwrap();
//! assert!(candidates.iter().any(|c| (c.id_1, c.id_2) == (0, 1)));
//! ```

pub mod blocking;
pub mod error;
pub mod job;
pub mod matrix;
pub mod pair;
pub mod progress;
pub mod record;
pub mod store;
pub mod vectorizer;

/// SIMD kernels for squared L2 and dot product
///
/// - AVX2/FMA on x86_64
/// - Scalar two-accumulator fallback elsewhere
pub mod simd;

pub use blocking::{total_chunk_pairs, BlockingConfig, BlockingEngine, FlatL2Index, Neighbor};
pub use error::{Error, Result};
pub use job::{JobRecord, JobStatus};
pub use matrix::DenseMatrix;
pub use pair::{
    new_batch_id, Candidate, CandidatePair, Label, LabeledExample, LabelingTask, MatchCategory,
    MatchResult,
};
pub use progress::{NoProgress, Progress, ProgressHandle, ProgressRegistry, ProgressSink};
pub use record::{Record, RecordRef, Row};
pub use store::{ColumnStore, JobStore, LabelStore, ResultStore};
pub use vectorizer::{Analyzer, TfidfVectorizer, VectorizerConfig, Vocabulary};
