//! # matchx Similarity
//!
//! Pair scoring and classification for the matchx record linkage engine.
//!
//! ## Features
//!
//! - **Fuzzy similarity**: order-insensitive token-sort ratio on a 0 to 100 scale
//! - **Pair scoring**: attaches string similarity to blocking candidates
//! - **Confidence fusion**: a boosted-tree classifier, or a threshold heuristic
//!   when no model is promoted, turns scores into a match probability
//! - **Categorization**: MATCH / ENRICHED / UNMATCH, with uncertain pairs routed
//!   to human review
//! - **Training**: SMOTE oversampling, seeded splits and log-loss evaluation
//! - **Column recommendations**: which columns to match on and how two tables line up
//!
//! ## Example
//!
//! ```rust
//! use matchx_similarity::{ConfidenceFusion, FusionConfig, ScoringPolicy, token_sort_ratio};
//!
//! assert_eq!(token_sort_ratio("Sumber Makmur PT", "pt sumber makmur"), 100.0);
//!
//! let fusion = ConfidenceFusion::new(FusionConfig::default(), ScoringPolicy::Heuristic);
//! assert_eq!(fusion.policy().name(), "NO_MODEL");
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Candidates  │────>│   Scorer    │────>│   Fusion    │
//! │ (blocking)  │     │ (fuzzy)     │     │ (policy)    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │  Training   │────>│ Categorize  │
//!                     │ (smote,gbdt)│     │ (buckets)   │
//!                     └─────────────┘     └─────────────┘
//! ```

pub mod distance;
pub mod error;
pub mod fusion;
pub mod gbdt;
pub mod metrics;
pub mod model;
pub mod recommend;
pub mod scorer;
pub mod smote;

pub use distance::{full_process, ratio, token_sort_ratio};
pub use error::{TrainError, TrainResult};
pub use fusion::{AmbiguityBand, Categorized, ConfidenceFusion, FusionConfig, ScoringPolicy};
pub use gbdt::{FeatureRow, GbdtClassifier, GbdtParams, N_FEATURES};
pub use metrics::{log_loss, train_test_split};
pub use model::{ModelArtifact, ModelStore};
pub use recommend::{recommend_column_mapping, recommend_columns, ColumnMapping, ColumnQuality};
pub use scorer::PairScorer;
pub use smote::oversample;
