//! # matchx Engine
//!
//! The [`MatchingEngine`] ties the matchx crates into one pipeline:
//!
//! 1. [`prepare`] - select columns, drop incomplete and duplicate rows
//! 2. vectorize and block (`matchx-core`)
//! 3. score, fuse and categorize (`matchx-similarity`)
//! 4. persist results, queue ambiguous pairs for review
//!
//! Batches run on the caller's thread ([`MatchingEngine::run_matching`]) or
//! on the background [`MatchWorker`] ([`MatchingEngine::submit`] then
//! [`MatchingEngine::poll`]). Confirmed reviews feed [`MatchingEngine::retrain`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use matchx_engine::{EngineConfig, MatchRequest, MatchingEngine};
//! use matchx_storage::MemoryColumnStore;
//!
//! let tables = Arc::new(MemoryColumnStore::new());
//! tables.load_dir("./tables").unwrap();
//!
//! let engine = MatchingEngine::open(EngineConfig::default(), tables).unwrap();
//! let request = MatchRequest::single("customers", vec!["name".into(), "address".into()]);
//! let summary = engine.run_matching(&request).unwrap();
//! println!("{} matches", summary.total_matches + summary.total_enriched);
//! ```

pub mod clusters;
pub mod config;
pub mod engine;
pub mod error;
pub mod prepare;
pub mod retrain;
pub mod worker;

pub use clusters::duplicate_clusters;
pub use config::{EngineConfig, TrainingConfig};
pub use engine::{BatchState, BatchSummary, EngineStores, MatchingEngine};
pub use error::{EngineError, Result};
pub use prepare::{prepare_request, prepare_table, MatchRequest, PreparedBatch};
pub use retrain::{RetrainOutcome, Retrainer};
pub use worker::MatchWorker;
