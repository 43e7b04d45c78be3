//! Candidate pairs, labeling tasks and stored match results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::record::RecordRef;

/// Generate a fresh batch identifier. Batch ids are never reused.
#[must_use]
pub fn new_batch_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A neighbor pair surfaced by blocking, before string scoring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Lower global row index
    pub id_1: usize,
    /// Higher global row index
    pub id_2: usize,
    /// Squared L2 distance between the two row vectors
    pub distance: f32,
    /// `1 / (1 + distance)`
    pub vector_score: f32,
}

impl Candidate {
    /// Build a candidate in canonical order; `None` for self pairs
    #[inline]
    pub fn canonical(a: usize, b: usize, distance: f32) -> Option<Self> {
        if a == b {
            return None;
        }
        let (id_1, id_2) = if a < b { (a, b) } else { (b, a) };
        Some(Self {
            id_1,
            id_2,
            distance,
            vector_score: 1.0 / (1.0 + distance),
        })
    }
}

/// A scored candidate pair belonging to one matching batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePair {
    pub batch_id: String,
    pub id_1: usize,
    pub id_2: usize,
    pub record_a: RecordRef,
    pub record_b: RecordRef,
    pub combined_1: String,
    pub combined_2: String,
    pub vector_distance: f32,
    pub vector_score: f32,
    /// Token-sort fuzzy similarity, 0 to 100
    pub fuzzy_score: f64,
    /// Probability of a true match, 0.0 to 1.0
    pub confidence: f64,
    pub predicted_label: bool,
    pub is_ambiguous: bool,
}

impl CandidatePair {
    /// Idempotency key of the labeling task created for this pair
    #[must_use]
    pub fn task_key(&self) -> String {
        format!("{}_{}_{}", self.batch_id, self.id_1, self.id_2)
    }

    /// Classifier features: `[fuzzy_score, vector_score]`
    #[inline]
    #[must_use]
    pub fn features(&self) -> [f64; 2] {
        [self.fuzzy_score, f64::from(self.vector_score)]
    }
}

/// Bucket a scored pair ends up in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchCategory {
    Match,
    Unmatch,
    Enriched,
    Ambiguous,
}

impl MatchCategory {
    pub const ALL: [MatchCategory; 4] = [
        MatchCategory::Match,
        MatchCategory::Unmatch,
        MatchCategory::Enriched,
        MatchCategory::Ambiguous,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchCategory::Match => "MATCH",
            MatchCategory::Unmatch => "UNMATCH",
            MatchCategory::Enriched => "ENRICHED",
            MatchCategory::Ambiguous => "AMBIGUOUS",
        }
    }

    /// Whether the category means both records describe the same entity
    #[inline]
    #[must_use]
    pub fn is_positive(&self) -> bool {
        matches!(self, MatchCategory::Match | MatchCategory::Enriched)
    }
}

impl fmt::Display for MatchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted, automatically categorized pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub batch_id: String,
    pub source_table: String,
    pub reference_table: String,
    pub category: MatchCategory,
    pub confidence: f64,
    pub pair: CandidatePair,
    pub created_at: DateTime<Utc>,
}

/// Human judgment on a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Match,
    Unmatch,
}

impl Label {
    #[inline]
    #[must_use]
    pub fn as_target(&self) -> u8 {
        match self {
            Label::Match => 1,
            Label::Unmatch => 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn from_target(target: u8) -> Self {
        if target == 1 {
            Label::Match
        } else {
            Label::Unmatch
        }
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MATCH" | "1" => Ok(Label::Match),
            "UNMATCH" | "0" => Ok(Label::Unmatch),
            other => Err(format!("unknown label: {}", other)),
        }
    }
}

/// An ambiguous pair waiting for (or carrying) a human judgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelingTask {
    /// `"{batch_id}_{id_1}_{id_2}"`
    pub task_id: String,
    pub batch_id: String,
    pub combined_1: String,
    pub combined_2: String,
    pub source_table: String,
    pub reference_table: String,
    pub fuzzy_score: f64,
    pub vector_score: f64,
    #[serde(default)]
    pub label: Option<Label>,
    #[serde(default)]
    pub confirmed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LabelingTask {
    /// Build the labeling task for an ambiguous pair
    #[must_use]
    pub fn from_pair(pair: &CandidatePair, source_table: &str, reference_table: &str) -> Self {
        Self {
            task_id: pair.task_key(),
            batch_id: pair.batch_id.clone(),
            combined_1: pair.combined_1.clone(),
            combined_2: pair.combined_2.clone(),
            source_table: source_table.to_string(),
            reference_table: reference_table.to_string(),
            fuzzy_score: pair.fuzzy_score,
            vector_score: f64::from(pair.vector_score),
            label: None,
            confirmed_by: None,
            created_at: Utc::now(),
        }
    }

    /// Confirmed by a person, not merely predicted
    #[inline]
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.label.is_some() && self.confirmed_by.is_some()
    }

    /// Training example for a confirmed task
    pub fn to_example(&self) -> Option<LabeledExample> {
        if !self.is_confirmed() {
            return None;
        }
        self.label
            .map(|label| LabeledExample::new(self.fuzzy_score, self.vector_score, label))
    }
}

/// One row of classifier training data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub fuzzy_score: f64,
    pub vector_score: f64,
    pub label: Label,
}

impl LabeledExample {
    #[inline]
    #[must_use]
    pub fn new(fuzzy_score: f64, vector_score: f64, label: Label) -> Self {
        Self {
            fuzzy_score,
            vector_score,
            label,
        }
    }

    #[inline]
    #[must_use]
    pub fn features(&self) -> [f64; 2] {
        [self.fuzzy_score, self.vector_score]
    }

    /// Exact-equality key used to deduplicate training rows
    #[inline]
    #[must_use]
    pub fn dedup_key(&self) -> (u64, u64, u8) {
        (
            self.fuzzy_score.to_bits(),
            self.vector_score.to_bits(),
            self.label.as_target(),
        )
    }
}
