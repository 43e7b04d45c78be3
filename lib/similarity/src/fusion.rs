//! Confidence fusion and categorization
//!
//! A [`ScoringPolicy`] turns each scored pair's fuzzy and vector scores
//! into a match probability and a predicted label. Pairs that fall inside
//! the policy's ambiguity band go to human review; the rest are bucketed
//! as MATCH, ENRICHED or UNMATCH.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::gbdt::GbdtClassifier;
use crate::model::ModelStore;
use matchx_core::{CandidatePair, Error, MatchCategory, Result};

/// Inclusive ranges that mark a pair as ambiguous
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AmbiguityBand {
    pub fuzzy_low: f64,
    pub fuzzy_high: f64,
    pub confidence_low: f64,
    pub confidence_high: f64,
}

impl Default for AmbiguityBand {
    fn default() -> Self {
        Self {
            fuzzy_low: 85.0,
            fuzzy_high: 90.0,
            confidence_low: 0.3,
            confidence_high: 0.7,
        }
    }
}

impl AmbiguityBand {
    #[inline]
    pub fn contains(&self, fuzzy_score: f64, confidence: f64) -> bool {
        (self.fuzzy_low..=self.fuzzy_high).contains(&fuzzy_score)
            || (self.confidence_low..=self.confidence_high).contains(&confidence)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.fuzzy_low > self.fuzzy_high || self.confidence_low > self.confidence_high {
            return Err(Error::InvalidConfig(format!("{} band has low > high", name)));
        }
        Ok(())
    }
}

/// Fusion thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FusionConfig {
    /// Ambiguity band used without a model
    pub heuristic_band: AmbiguityBand,
    /// Ambiguity band used with a promoted model
    pub model_band: AmbiguityBand,
    /// Fuzzy score above which the heuristic predicts a match
    pub heuristic_threshold: f64,
    /// Confidence above which a predicted match counts as ENRICHED
    pub enriched_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            heuristic_band: AmbiguityBand::default(),
            model_band: AmbiguityBand::default(),
            heuristic_threshold: 85.0,
            enriched_threshold: 0.8,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<()> {
        self.heuristic_band.validate("heuristic")?;
        self.model_band.validate("model")?;
        if !(0.0..=1.0).contains(&self.enriched_threshold) {
            return Err(Error::InvalidConfig(format!(
                "enriched_threshold must be in [0, 1], got {}",
                self.enriched_threshold
            )));
        }
        Ok(())
    }
}

/// How confidence is produced for a batch
#[derive(Debug, Clone)]
pub enum ScoringPolicy {
    /// No usable model: confidence is the fuzzy score scaled to 0..1
    Heuristic,
    Model(Arc<GbdtClassifier>),
}

impl ScoringPolicy {
    /// Policy for a new batch. A missing or unreadable artifact falls back to
    /// the heuristic; this never fails.
    pub fn load(store: &dyn ModelStore) -> Self {
        match store.load() {
            Ok(Some(artifact)) => {
                info!(
                    "using model version {} (held-out loss {:.4})",
                    artifact.version, artifact.held_out_loss
                );
                ScoringPolicy::Model(Arc::new(artifact.model))
            }
            Ok(None) => ScoringPolicy::Heuristic,
            Err(e) => {
                warn!("model artifact unusable, falling back to heuristic scoring: {}", e);
                ScoringPolicy::Heuristic
            }
        }
    }

    #[inline]
    pub fn is_model(&self) -> bool {
        matches!(self, ScoringPolicy::Model(_))
    }

    /// Status string reported to callers
    pub fn name(&self) -> &'static str {
        match self {
            ScoringPolicy::Heuristic => "NO_MODEL",
            ScoringPolicy::Model(_) => "MODEL_LOADED",
        }
    }
}

/// Pairs split by category
#[derive(Debug, Clone, Default)]
pub struct Categorized {
    pub matches: Vec<CandidatePair>,
    pub unmatches: Vec<CandidatePair>,
    pub enriched: Vec<CandidatePair>,
    pub ambiguous: Vec<CandidatePair>,
}

impl Categorized {
    pub fn bucket(&self, category: MatchCategory) -> &[CandidatePair] {
        match category {
            MatchCategory::Match => &self.matches,
            MatchCategory::Unmatch => &self.unmatches,
            MatchCategory::Enriched => &self.enriched,
            MatchCategory::Ambiguous => &self.ambiguous,
        }
    }

    pub fn len(&self) -> usize {
        MatchCategory::ALL.iter().map(|c| self.bucket(*c).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Applies a scoring policy and the category rules to scored pairs
pub struct ConfidenceFusion {
    config: FusionConfig,
    policy: ScoringPolicy,
}

impl ConfidenceFusion {
    pub fn new(config: FusionConfig, policy: ScoringPolicy) -> Self {
        Self { config, policy }
    }

    #[inline]
    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    fn band(&self) -> &AmbiguityBand {
        match self.policy {
            ScoringPolicy::Heuristic => &self.config.heuristic_band,
            ScoringPolicy::Model(_) => &self.config.model_band,
        }
    }

    /// Fill `confidence`, `predicted_label` and `is_ambiguous`
    pub fn apply(&self, pair: &mut CandidatePair) {
        let (confidence, predicted) = match &self.policy {
            ScoringPolicy::Heuristic => (
                pair.fuzzy_score / 100.0,
                pair.fuzzy_score > self.config.heuristic_threshold,
            ),
            ScoringPolicy::Model(model) => {
                let p = model.predict_proba(&pair.features());
                (p, p > 0.5)
            }
        };
        pair.confidence = confidence;
        pair.predicted_label = predicted;
        pair.is_ambiguous = self.band().contains(pair.fuzzy_score, confidence);
    }

    /// Category of a pair that went through [`ConfidenceFusion::apply`]
    pub fn category(&self, pair: &CandidatePair) -> MatchCategory {
        if pair.is_ambiguous {
            MatchCategory::Ambiguous
        } else if pair.predicted_label {
            if pair.confidence > self.config.enriched_threshold {
                MatchCategory::Enriched
            } else {
                MatchCategory::Match
            }
        } else {
            MatchCategory::Unmatch
        }
    }

    /// Score and bucket every pair
    pub fn categorize(&self, pairs: Vec<CandidatePair>) -> Categorized {
        let mut out = Categorized::default();
        for mut pair in pairs {
            self.apply(&mut pair);
            match self.category(&pair) {
                MatchCategory::Match => out.matches.push(pair),
                MatchCategory::Unmatch => out.unmatches.push(pair),
                MatchCategory::Enriched => out.enriched.push(pair),
                MatchCategory::Ambiguous => out.ambiguous.push(pair),
            }
        }
        out
    }
}
