//! # matchx
//!
//! Record linkage and deduplication for tabular data.
//!
//! matchx finds duplicate or corresponding rows in one table or across two
//! tables. Candidate pairs come from chunked nearest-neighbor search over
//! character n-gram TF-IDF vectors, are scored with a fuzzy token-sort
//! ratio, and are classified by a gradient-boosted model (or a threshold
//! heuristic until one is trained). Uncertain pairs go to human review, and
//! confirmed reviews retrain the model behind a held-out loss gate.
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! matchx match --tables ./tables --table-a customers --columns-a name,address
//! matchx retrain
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use matchx::prelude::*;
//!
//! let tables = Arc::new(MemoryColumnStore::new());
//! tables.load_dir("./tables").unwrap();
//!
//! let engine = MatchingEngine::open(EngineConfig::default(), tables).unwrap();
//! let batch_id = engine
//!     .submit(&MatchRequest::single("customers", vec!["name".into()]))
//!     .unwrap();
//!
//! while let Some(BatchState::Running { progress }) = engine.poll(&batch_id) {
//!     println!("{}/{}", progress.current, progress.total);
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! ```
//!
//! ## Crate Structure
//!
//! - `matchx-core` - Records, pairs, vectorizer, blocking, progress, jobs, store traits
//! - `matchx-similarity` - Fuzzy scoring, classifier, SMOTE, fusion, recommendations
//! - `matchx-storage` - Model artifact, training set, label log, in-memory stores
//! - `matchx-engine` - The `MatchingEngine` facade, background worker, retraining

// Re-export core types
pub use matchx_core::{
    BlockingConfig, BlockingEngine, Candidate, CandidatePair, ColumnStore, Error, JobRecord,
    JobStatus, JobStore, Label, LabelStore, LabeledExample, LabelingTask, MatchCategory,
    MatchResult, Progress, ProgressRegistry, Record, RecordRef, Result, ResultStore, Row,
    TfidfVectorizer, VectorizerConfig,
};

// Re-export scoring
pub use matchx_similarity::{
    token_sort_ratio, ColumnMapping, ColumnQuality, ConfidenceFusion, FusionConfig,
    GbdtClassifier, GbdtParams, ModelArtifact, ModelStore, ScoringPolicy,
};

// Re-export storage
pub use matchx_storage::{
    FileLabelStore, FileModelStore, MemoryColumnStore, MemoryJobStore, MemoryLabelStore,
    MemoryModelStore, MemoryResultStore, TrainingSetStore,
};

// Re-export engine
pub use matchx_engine::{
    BatchState, BatchSummary, EngineConfig, EngineError, EngineStores, MatchRequest,
    MatchingEngine, RetrainOutcome, TrainingConfig,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BatchState, BatchSummary, EngineConfig, EngineStores, Label, LabeledExample,
        MatchCategory, MatchRequest, MatchingEngine, MemoryColumnStore, RecordRef,
        RetrainOutcome,
    };
}

/// SIMD kernels used by the blocking index
pub mod simd {
    pub use matchx_core::simd::{dot_simd, squared_l2_simd};
}
