//! Active-learning retraining
//!
//! Confirmed labels are merged into the persisted training set, the set is
//! balanced with SMOTE and split, and a fresh classifier is trained. The
//! new model replaces the promoted one only if its held-out log-loss is
//! strictly lower than the old model's on the same split.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::TrainingConfig;
use crate::error::Result;
use matchx_core::store::LabelStore;
use matchx_core::LabeledExample;
use matchx_similarity::{
    log_loss, oversample, train_test_split, FeatureRow, GbdtClassifier, ModelStore, TrainError,
};
use matchx_storage::TrainingSetStore;

/// Result of one retraining round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrainOutcome {
    /// Not enough confirmed labels; nothing was written
    InsufficientData { available: usize, required: usize },
    /// No model existed; the new one was promoted unconditionally
    FirstModel { version: u64, loss: f64 },
    Promoted {
        version: u64,
        old_loss: f64,
        new_loss: f64,
    },
    /// The promoted model did at least as well; it stays in place
    Retained { old_loss: f64, new_loss: f64 },
    Failed { reason: String },
}

impl RetrainOutcome {
    /// Whether a new model was promoted
    pub fn promoted(&self) -> bool {
        matches!(self, RetrainOutcome::FirstModel { .. } | RetrainOutcome::Promoted { .. })
    }
}

impl fmt::Display for RetrainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrainOutcome::InsufficientData { available, required } => write!(
                f,
                "Not enough confirmed labels for retraining ({}/{})",
                available, required
            ),
            RetrainOutcome::FirstModel { loss, .. } => {
                write!(f, "Model trained for first time with logloss: {:.4}", loss)
            }
            RetrainOutcome::Promoted { old_loss, new_loss, .. } => {
                write!(f, "Model retrained and improved: {:.4} → {:.4}", old_loss, new_loss)
            }
            RetrainOutcome::Retained { old_loss, new_loss } => write!(
                f,
                "Model not updated. New logloss {:.4} worse than {:.4}",
                new_loss, old_loss
            ),
            RetrainOutcome::Failed { reason } => write!(f, "Error training model: {}", reason),
        }
    }
}

/// One retraining round over the given stores
pub struct Retrainer<'a> {
    pub config: &'a TrainingConfig,
    pub labels: &'a dyn LabelStore,
    pub training_set: &'a TrainingSetStore,
    pub models: &'a dyn ModelStore,
}

fn split_xy(examples: &[LabeledExample]) -> (Vec<FeatureRow>, Vec<u8>) {
    examples
        .iter()
        .map(|e| (e.features(), e.label.as_target()))
        .unzip()
}

fn gather<T: Copy>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i]).collect()
}

impl Retrainer<'_> {
    /// Run the round. Failures are reported in the outcome; the promoted
    /// artifact is only ever touched by a successful promotion.
    pub fn run(&self) -> RetrainOutcome {
        match self.try_run() {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("retraining failed: {}", e);
                RetrainOutcome::Failed { reason: e.to_string() }
            }
        }
    }

    fn try_run(&self) -> Result<RetrainOutcome> {
        let confirmed = self.labels.confirmed_examples()?;
        if confirmed.len() < self.config.min_new_samples {
            info!(
                "retraining skipped: {} confirmed labels, {} required",
                confirmed.len(),
                self.config.min_new_samples
            );
            return Ok(RetrainOutcome::InsufficientData {
                available: confirmed.len(),
                required: self.config.min_new_samples,
            });
        }

        // Persisted before training so rounds accumulate whatever the gate decides
        let merged = self.training_set.merge(&confirmed)?;
        let (x, y) = split_xy(&merged);
        let positives = y.iter().filter(|&&t| t == 1).count();
        if positives == 0 || positives == y.len() {
            return Err(TrainError::SingleClass.into());
        }

        // A corrupt prior model must fail the round before anything is promoted
        let mut prior = self.models.load()?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let (x_bal, y_bal) = oversample(&x, &y, self.config.smote_k, &mut rng)?;
        let (train_idx, test_idx) =
            train_test_split(x_bal.len(), self.config.test_fraction, self.config.seed);
        let (x_train, y_train) = (gather(&x_bal, &train_idx), gather(&y_bal, &train_idx));
        let (x_test, y_test) = (gather(&x_bal, &test_idx), gather(&y_bal, &test_idx));

        let model = GbdtClassifier::fit(&x_train, &y_train, self.config.gbdt.clone())?;
        let new_loss = log_loss(&y_test, &model.predict_proba_batch(&x_test));
        info!(
            "trained on {} rows ({} after oversampling), held-out loss {:.4}",
            merged.len(),
            x_bal.len(),
            new_loss
        );

        // The comparison holds only against the version it was made with;
        // if another round promoted meanwhile, compare again with its model
        loop {
            let old_loss = prior
                .as_ref()
                .map(|p| log_loss(&y_test, &p.model.predict_proba_batch(&x_test)));
            if let (Some(prior), Some(old_loss)) = (&prior, old_loss) {
                if !(new_loss < old_loss) {
                    info!(
                        "keeping model version {}: new loss {:.4} is not below {:.4}",
                        prior.version, new_loss, old_loss
                    );
                    return Ok(RetrainOutcome::Retained { old_loss, new_loss });
                }
            }

            let expected = prior.as_ref().map(|p| p.version);
            match self.models.promote_if(expected, model.clone(), new_loss)? {
                Some(artifact) => {
                    return Ok(match old_loss {
                        None => RetrainOutcome::FirstModel {
                            version: artifact.version,
                            loss: new_loss,
                        },
                        Some(old_loss) => RetrainOutcome::Promoted {
                            version: artifact.version,
                            old_loss,
                            new_loss,
                        },
                    });
                }
                None => {
                    debug!("model version moved past {:?} during retraining", expected);
                    prior = self.models.load()?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use matchx_core::{Label, LabelingTask};
    use matchx_similarity::{GbdtParams, ModelArtifact};
    use matchx_storage::{FileModelStore, MemoryLabelStore, MemoryModelStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use tempfile::TempDir;

    /// Holds the first two loads until both have read the current model
    struct GatedModels {
        inner: MemoryModelStore,
        gate: Barrier,
        loads: AtomicUsize,
    }

    impl GatedModels {
        fn new() -> Self {
            Self {
                inner: MemoryModelStore::new(),
                gate: Barrier::new(2),
                loads: AtomicUsize::new(0),
            }
        }
    }

    impl ModelStore for GatedModels {
        fn load(&self) -> matchx_core::Result<Option<ModelArtifact>> {
            let current = self.inner.load();
            if self.loads.fetch_add(1, Ordering::SeqCst) < 2 {
                self.gate.wait();
            }
            current
        }

        fn promote(&self, model: GbdtClassifier, loss: f64) -> matchx_core::Result<ModelArtifact> {
            self.inner.promote(model, loss)
        }

        fn promote_if(
            &self,
            expected: Option<u64>,
            model: GbdtClassifier,
            loss: f64,
        ) -> matchx_core::Result<Option<ModelArtifact>> {
            self.inner.promote_if(expected, model, loss)
        }
    }

    fn new_loss(outcome: &RetrainOutcome) -> f64 {
        match outcome {
            RetrainOutcome::FirstModel { loss, .. } => *loss,
            RetrainOutcome::Promoted { new_loss, .. } | RetrainOutcome::Retained { new_loss, .. } => *new_loss,
            other => panic!("round did not train: {:?}", other),
        }
    }

    fn confirmed(store: &MemoryLabelStore, n: usize) {
        for i in 0..n {
            let is_match = i % 2 == 0;
            let task = LabelingTask {
                task_id: format!("b_{}_{}", i, i + 1),
                batch_id: "b".to_string(),
                combined_1: "x".to_string(),
                combined_2: "y".to_string(),
                source_table: "t".to_string(),
                reference_table: "t".to_string(),
                fuzzy_score: if is_match { 90.0 + i as f64 * 0.5 } else { 40.0 + i as f64 },
                vector_score: if is_match { 0.8 } else { 0.3 },
                label: None,
                confirmed_by: None,
                created_at: Utc::now(),
            };
            store.insert_task(task.clone()).unwrap();
            let label = if is_match { Label::Match } else { Label::Unmatch };
            store.confirm(&task.task_id, label, "reviewer").unwrap();
        }
    }

    #[test]
    fn test_insufficient_data_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let labels = MemoryLabelStore::new();
        confirmed(&labels, 3);
        let training_set = TrainingSetStore::open(dir.path()).unwrap();
        let models = FileModelStore::open(dir.path()).unwrap();
        let config = TrainingConfig::default();

        let outcome = Retrainer {
            config: &config,
            labels: &labels,
            training_set: &training_set,
            models: &models,
        }
        .run();

        assert_eq!(outcome, RetrainOutcome::InsufficientData { available: 3, required: 10 });
        assert!(!models.exists());
        assert!(!training_set.path().exists());
    }

    #[test]
    fn test_first_model_is_promoted() {
        let dir = TempDir::new().unwrap();
        let labels = MemoryLabelStore::new();
        confirmed(&labels, 12);
        let training_set = TrainingSetStore::open(dir.path()).unwrap();
        let models = MemoryModelStore::new();
        let config = TrainingConfig::default();

        let outcome = Retrainer {
            config: &config,
            labels: &labels,
            training_set: &training_set,
            models: &models,
        }
        .run();

        assert!(matches!(outcome, RetrainOutcome::FirstModel { version: 1, .. }));
        assert!(outcome.to_string().starts_with("Model trained for first time"));
        assert_eq!(training_set.load().unwrap().len(), 12);
    }

    #[test]
    fn test_better_prior_is_retained() {
        let dir = TempDir::new().unwrap();
        let labels = MemoryLabelStore::new();
        confirmed(&labels, 12);
        let training_set = TrainingSetStore::open(dir.path()).unwrap();
        let models = MemoryModelStore::new();
        let config = TrainingConfig::default();
        let retrainer = Retrainer {
            config: &config,
            labels: &labels,
            training_set: &training_set,
            models: &models,
        };
        assert!(retrainer.run().promoted());

        // Same data, same seed: the new model cannot be strictly better
        let outcome = retrainer.run();
        assert!(matches!(outcome, RetrainOutcome::Retained { .. }));
        assert_eq!(models.load().unwrap().unwrap().version, 1);
    }

    #[test]
    fn test_single_class_fails() {
        let dir = TempDir::new().unwrap();
        let labels = MemoryLabelStore::new();
        confirmed(&labels, 12);
        for i in 0..12 {
            labels.confirm(&format!("b_{}_{}", i, i + 1), Label::Match, "r").unwrap();
        }
        let training_set = TrainingSetStore::open(dir.path()).unwrap();
        let models = MemoryModelStore::new();
        let config = TrainingConfig {
            gbdt: GbdtParams {
                n_trees: 10,
                ..Default::default()
            },
            ..Default::default()
        };

        let outcome = Retrainer {
            config: &config,
            labels: &labels,
            training_set: &training_set,
            models: &models,
        }
        .run();
        assert!(matches!(outcome, RetrainOutcome::Failed { .. }));
        assert!(models.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_prior_fails_without_touching_it() {
        let dir = TempDir::new().unwrap();
        let labels = MemoryLabelStore::new();
        confirmed(&labels, 12);
        let training_set = TrainingSetStore::open(dir.path()).unwrap();
        let models = FileModelStore::open(dir.path()).unwrap();
        std::fs::write(models.path(), b"garbage").unwrap();
        let config = TrainingConfig::default();

        let outcome = Retrainer {
            config: &config,
            labels: &labels,
            training_set: &training_set,
            models: &models,
        }
        .run();
        assert!(matches!(outcome, RetrainOutcome::Failed { .. }));
        assert_eq!(std::fs::read(models.path()).unwrap(), b"garbage");
    }

    #[test]
    fn test_concurrent_rounds_keep_the_better_model() {
        let dir = TempDir::new().unwrap();
        let labels = MemoryLabelStore::new();
        confirmed(&labels, 12);
        let training_set = TrainingSetStore::open(dir.path()).unwrap();
        let models = GatedModels::new();
        let strong = TrainingConfig::default();
        let weak = TrainingConfig {
            gbdt: GbdtParams {
                n_trees: 1,
                learning_rate: 0.01,
                ..Default::default()
            },
            ..Default::default()
        };

        // Both rounds read "no model" before either promotes
        let outcomes: Vec<RetrainOutcome> = std::thread::scope(|s| {
            let rounds: Vec<_> = [&strong, &weak]
                .into_iter()
                .map(|config| {
                    let (labels, training_set, models) = (&labels, &training_set, &models);
                    s.spawn(move || {
                        Retrainer {
                            config,
                            labels,
                            training_set,
                            models,
                        }
                        .run()
                    })
                })
                .collect();
            rounds.into_iter().map(|r| r.join().unwrap()).collect()
        });

        let first_models = outcomes
            .iter()
            .filter(|o| matches!(o, RetrainOutcome::FirstModel { .. }))
            .count();
        assert_eq!(first_models, 1, "{:?}", outcomes);

        let best = outcomes.iter().map(new_loss).fold(f64::INFINITY, f64::min);
        let current = models.load().unwrap().unwrap();
        assert_eq!(current.held_out_loss, best);
        let promotions = outcomes.iter().filter(|o| o.promoted()).count() as u64;
        assert_eq!(current.version, promotions);
    }

    #[test]
    fn test_stale_round_compares_against_newer_model() {
        let dir = TempDir::new().unwrap();
        let labels = MemoryLabelStore::new();
        confirmed(&labels, 12);
        let training_set = TrainingSetStore::open(dir.path()).unwrap();
        let models = GatedModels::new();
        let config = TrainingConfig::default();

        // Two identical rounds racing from no model: the loser finds an
        // equally good model already promoted and keeps it
        let outcomes: Vec<RetrainOutcome> = std::thread::scope(|s| {
            let rounds: Vec<_> = (0..2)
                .map(|_| {
                    let (config, labels, training_set, models) = (&config, &labels, &training_set, &models);
                    s.spawn(move || {
                        Retrainer {
                            config,
                            labels,
                            training_set,
                            models,
                        }
                        .run()
                    })
                })
                .collect();
            rounds.into_iter().map(|r| r.join().unwrap()).collect()
        });

        assert!(outcomes.iter().any(|o| matches!(o, RetrainOutcome::FirstModel { version: 1, .. })));
        assert!(outcomes.iter().any(|o| matches!(o, RetrainOutcome::Retained { .. })));
        assert_eq!(models.load().unwrap().unwrap().version, 1);
    }
}
