use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::clusters;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::prepare::{prepare_request, MatchRequest, PreparedBatch};
use crate::retrain::{RetrainOutcome, Retrainer};
use crate::worker::MatchWorker;
use matchx_core::store::{ColumnStore, JobStore, LabelStore, ResultStore};
use matchx_core::{
    new_batch_id, BlockingEngine, CandidatePair, Error, JobRecord, JobStatus, Label,
    LabeledExample, LabelingTask, MatchCategory, MatchResult, Progress, ProgressHandle,
    ProgressRegistry, RecordRef, TfidfVectorizer,
};
use matchx_similarity::{
    recommend_column_mapping, recommend_columns, Categorized, ColumnMapping, ColumnQuality,
    ConfidenceFusion, ModelStore, PairScorer, ScoringPolicy,
};
use matchx_storage::{
    FileLabelStore, FileModelStore, MemoryJobStore, MemoryLabelStore, MemoryModelStore,
    MemoryResultStore, TrainingSetStore,
};

/// Collaborators the engine reads from and writes to
#[derive(Clone)]
pub struct EngineStores {
    pub columns: Arc<dyn ColumnStore>,
    pub jobs: Arc<dyn JobStore>,
    pub labels: Arc<dyn LabelStore>,
    pub results: Arc<dyn ResultStore>,
    pub models: Arc<dyn ModelStore>,
}

impl EngineStores {
    /// Label log and model artifact on disk under `data_dir`; jobs and
    /// results in memory
    pub fn file_backed<P: AsRef<Path>>(data_dir: P, columns: Arc<dyn ColumnStore>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        Ok(Self {
            columns,
            jobs: Arc::new(MemoryJobStore::new()),
            labels: Arc::new(FileLabelStore::open(data_dir)?),
            results: Arc::new(MemoryResultStore::new()),
            models: Arc::new(FileModelStore::open(data_dir)?),
        })
    }

    pub fn in_memory(columns: Arc<dyn ColumnStore>) -> Self {
        Self {
            columns,
            jobs: Arc::new(MemoryJobStore::new()),
            labels: Arc::new(MemoryLabelStore::new()),
            results: Arc::new(MemoryResultStore::new()),
            models: Arc::new(MemoryModelStore::new()),
        }
    }
}

/// Outcome of one matching batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    /// `MODEL_LOADED` or `NO_MODEL`
    pub policy: String,
    pub total_candidates: usize,
    pub total_matches: usize,
    pub total_unmatches: usize,
    pub total_enriched: usize,
    pub ambiguous_count: usize,
    pub sample_matches: Vec<CandidatePair>,
    pub sample_ambiguous: Vec<CandidatePair>,
    /// Results or labeling tasks that could not be written
    pub persist_failures: usize,
}

/// What a poller sees for a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BatchState {
    Running { progress: Progress },
    Completed { summary: BatchSummary },
    Failed { reason: String },
}

impl BatchState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, BatchState::Running { .. })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct EngineInner {
    config: EngineConfig,
    stores: EngineStores,
    training_set: TrainingSetStore,
    progress: ProgressRegistry,
    states: RwLock<HashMap<String, BatchState>>,
    /// Finished batch ids, oldest first
    finished: Mutex<VecDeque<String>>,
}

/// Entry point of the matching pipeline
///
/// Owns the collaborator stores, the per-batch progress registry and the
/// background worker pool. Synchronous runs and submitted batches share
/// the same pipeline and bookkeeping.
pub struct MatchingEngine {
    inner: Arc<EngineInner>,
    worker: MatchWorker,
}

impl MatchingEngine {
    pub fn new(config: EngineConfig, stores: EngineStores) -> Result<Self> {
        config.validate()?;
        let training_set = TrainingSetStore::open(&config.data_dir)?;
        let worker = MatchWorker::start(config.workers)?;
        info!(
            "matching engine ready: data dir {:?}, {} worker(s)",
            config.data_dir, config.workers
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                stores,
                training_set,
                progress: ProgressRegistry::new(),
                states: RwLock::new(HashMap::new()),
                finished: Mutex::new(VecDeque::new()),
            }),
            worker,
        })
    }

    /// Engine with file-backed labels and model under `config.data_dir`
    pub fn open(config: EngineConfig, columns: Arc<dyn ColumnStore>) -> Result<Self> {
        let stores = EngineStores::file_backed(&config.data_dir, columns)?;
        Self::new(config, stores)
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    #[inline]
    pub fn stores(&self) -> &EngineStores {
        &self.inner.stores
    }

    /// Columns of `table` worth matching on, best first
    pub fn recommend_columns(&self, table: &str) -> Result<Vec<ColumnQuality>> {
        let columns = self.inner.stores.columns.columns(table)?;
        let rows = self.inner.stores.columns.rows(table)?;
        Ok(recommend_columns(&columns, &rows))
    }

    /// Likely column correspondences between two tables
    pub fn recommend_column_mapping(&self, table_a: &str, table_b: &str) -> Result<Vec<ColumnMapping>> {
        let columns_a = self.inner.stores.columns.columns(table_a)?;
        let columns_b = self.inner.stores.columns.columns(table_b)?;
        Ok(recommend_column_mapping(&columns_a, &columns_b))
    }

    /// Run a batch on the calling thread
    pub fn run_matching(&self, request: &MatchRequest) -> Result<BatchSummary> {
        let (batch_id, batch, handle) = self.inner.begin(request)?;
        self.inner.execute(&batch_id, batch, handle)
    }

    /// Validate the request, create its job and queue it for the workers.
    /// Returns the batch id right away.
    pub fn submit(&self, request: &MatchRequest) -> Result<String> {
        let (batch_id, batch, handle) = self.inner.begin(request)?;

        let inner = self.inner.clone();
        let id = batch_id.clone();
        let queued = self.worker.submit(Box::new(move || {
            // Failures, panics included, are recorded in the batch state
            let _ = inner.execute(&id, batch, handle);
        }));
        if let Err(e) = queued {
            if let Err(status_err) = self.inner.stores.jobs.set_status(&batch_id, JobStatus::Failed) {
                warn!("batch {}: could not mark job failed: {}", batch_id, status_err);
            }
            self.inner.fail(&batch_id, &e);
            return Err(e);
        }
        debug!("batch {} queued", batch_id);
        Ok(batch_id)
    }

    /// Current state of a batch; `None` for unknown ids
    pub fn poll(&self, batch_id: &str) -> Option<BatchState> {
        let state = self.inner.states.read().get(batch_id).cloned()?;
        Some(match state {
            BatchState::Running { .. } => BatchState::Running {
                progress: self.inner.progress.get(batch_id).unwrap_or_default(),
            },
            finished => finished,
        })
    }

    pub fn get_progress(&self, batch_id: &str) -> Option<Progress> {
        self.inner.progress.get(batch_id)
    }

    pub fn job(&self, batch_id: &str) -> Result<Option<JobRecord>> {
        Ok(self.inner.stores.jobs.get(batch_id)?)
    }

    /// One active-learning round over the confirmed labels
    pub fn retrain(&self) -> RetrainOutcome {
        Retrainer {
            config: &self.inner.config.training,
            labels: self.inner.stores.labels.as_ref(),
            training_set: &self.inner.training_set,
            models: self.inner.stores.models.as_ref(),
        }
        .run()
    }

    /// Seed the training set with historical examples; returns its new size
    pub fn import_training_set(&self, examples: &[LabeledExample]) -> Result<usize> {
        let merged = self.inner.training_set.merge(examples)?;
        info!("imported {} examples, training set now {}", examples.len(), merged.len());
        Ok(merged.len())
    }

    /// Records linked by positive pairs of a batch, grouped into clusters.
    /// The first record of each cluster is the one to keep.
    pub fn duplicate_clusters(&self, batch_id: &str) -> Result<Vec<Vec<RecordRef>>> {
        if self.inner.stores.jobs.get(batch_id)?.is_none() {
            return Err(Error::JobNotFound(batch_id.to_string()).into());
        }
        let results = self.inner.stores.results.by_batch(batch_id, None)?;
        Ok(clusters::duplicate_clusters(&results))
    }

    pub fn pending_labels(&self) -> Result<Vec<LabelingTask>> {
        Ok(self.inner.stores.labels.list_unlabeled()?)
    }

    pub fn confirm_label(&self, task_id: &str, label: Label, confirmer: &str) -> Result<LabelingTask> {
        Ok(self.inner.stores.labels.confirm(task_id, label, confirmer)?)
    }

    pub fn unconfirm_label(&self, task_id: &str) -> Result<LabelingTask> {
        Ok(self.inner.stores.labels.unconfirm(task_id)?)
    }

    /// Finish queued batches and stop the workers
    pub fn shutdown(&self) {
        self.worker.shutdown();
    }
}

impl EngineInner {
    /// Input validation, then job creation; nothing is recorded for a
    /// request that fails validation
    fn begin(&self, request: &MatchRequest) -> Result<(String, PreparedBatch, ProgressHandle)> {
        let batch = prepare_request(self.stores.columns.as_ref(), request)?;
        let batch_id = new_batch_id();
        self.stores.jobs.create(&batch_id, &batch.source_table)?;
        let handle = self.progress.start(&batch_id);
        self.states.write().insert(
            batch_id.clone(),
            BatchState::Running {
                progress: Progress::default(),
            },
        );
        Ok((batch_id, batch, handle))
    }

    fn execute(&self, batch_id: &str, batch: PreparedBatch, handle: ProgressHandle) -> Result<BatchSummary> {
        info!(
            "batch {}: matching {} records ({} -> {})",
            batch_id,
            batch.records.len(),
            batch.source_table,
            batch.reference_table
        );
        let summary = panic::catch_unwind(AssertUnwindSafe(|| self.pipeline(batch_id, &batch, &handle)))
            .unwrap_or_else(|payload| Err(EngineError::JobPanicked(panic_message(&*payload))))
            .and_then(|summary| {
                self.stores.jobs.set_status(batch_id, JobStatus::Success)?;
                Ok(summary)
            });

        match summary {
            Ok(summary) => {
                handle.finish();
                info!(
                    "batch {} done: {} match, {} enriched, {} unmatch, {} ambiguous",
                    batch_id,
                    summary.total_matches,
                    summary.total_enriched,
                    summary.total_unmatches,
                    summary.ambiguous_count
                );
                self.settle(
                    batch_id,
                    BatchState::Completed {
                        summary: summary.clone(),
                    },
                );
                Ok(summary)
            }
            Err(e) => {
                if let Err(status_err) = self.stores.jobs.set_status(batch_id, JobStatus::Failed) {
                    warn!("batch {}: could not mark job failed: {}", batch_id, status_err);
                }
                self.fail(batch_id, &e);
                Err(e)
            }
        }
    }

    fn fail(&self, batch_id: &str, e: &EngineError) {
        error!("batch {} failed: {}", batch_id, e);
        self.settle(
            batch_id,
            BatchState::Failed {
                reason: e.to_string(),
            },
        );
    }

    /// Record a terminal state, then drop the state and progress of the
    /// oldest finished batches beyond `retained_batches`
    fn settle(&self, batch_id: &str, state: BatchState) {
        self.states.write().insert(batch_id.to_string(), state);

        let mut finished = self.finished.lock();
        finished.push_back(batch_id.to_string());
        while finished.len() > self.config.retained_batches {
            let Some(oldest) = finished.pop_front() else {
                break;
            };
            self.states.write().remove(&oldest);
            self.progress.remove(&oldest);
            debug!("batch {} evicted from the state table", oldest);
        }
    }

    fn pipeline(&self, batch_id: &str, batch: &PreparedBatch, handle: &ProgressHandle) -> Result<BatchSummary> {
        let texts = batch.texts();
        let (vocabulary, matrix) =
            TfidfVectorizer::new(self.config.vectorizer.clone()).fit_transform(&texts)?;
        debug!("batch {}: {} n-gram features", batch_id, vocabulary.len());

        let candidates = BlockingEngine::new(self.config.blocking.clone()).candidates(&matrix, handle)?;

        let cross_only = self.config.cross_table_only && !batch.self_match;
        let pairs = PairScorer::new(batch_id, &batch.records).score_all(&candidates, |a, b| {
            !cross_only || a.reference.table != b.reference.table
        });

        let fusion = ConfidenceFusion::new(
            self.config.fusion.clone(),
            ScoringPolicy::load(self.stores.models.as_ref()),
        );
        let categorized = fusion.categorize(pairs);
        let persist_failures = self.persist(batch_id, batch, &categorized);

        let sample = self.config.sample_size;
        Ok(BatchSummary {
            batch_id: batch_id.to_string(),
            policy: fusion.policy().name().to_string(),
            total_candidates: candidates.len(),
            total_matches: categorized.matches.len(),
            total_unmatches: categorized.unmatches.len(),
            total_enriched: categorized.enriched.len(),
            ambiguous_count: categorized.ambiguous.len(),
            sample_matches: categorized
                .matches
                .iter()
                .chain(&categorized.enriched)
                .take(sample)
                .cloned()
                .collect(),
            sample_ambiguous: categorized.ambiguous.iter().take(sample).cloned().collect(),
            persist_failures,
        })
    }

    /// Write decided pairs as results and queue ambiguous ones for review.
    /// Each write stands alone; failures are counted, not propagated.
    fn persist(&self, batch_id: &str, batch: &PreparedBatch, categorized: &Categorized) -> usize {
        let mut failures = 0;
        for pair in &categorized.ambiguous {
            let task = LabelingTask::from_pair(pair, &batch.source_table, &batch.reference_table);
            match self.stores.labels.insert_task(task) {
                Ok(true) => {}
                Ok(false) => debug!("labeling task {} already queued", pair.task_key()),
                Err(e) => {
                    warn!("batch {}: failed to queue labeling task {}: {}", batch_id, pair.task_key(), e);
                    failures += 1;
                }
            }
        }

        for category in [MatchCategory::Match, MatchCategory::Enriched, MatchCategory::Unmatch] {
            for pair in categorized.bucket(category) {
                let result = MatchResult {
                    batch_id: batch_id.to_string(),
                    source_table: batch.source_table.clone(),
                    reference_table: batch.reference_table.clone(),
                    category,
                    confidence: pair.confidence,
                    pair: pair.clone(),
                    created_at: Utc::now(),
                };
                if let Err(e) = self.stores.results.insert(&result) {
                    warn!("batch {}: failed to store result {}: {}", batch_id, pair.task_key(), e);
                    failures += 1;
                }
            }
        }
        failures
    }
}
