//! In-memory implementations of the collaborator stores

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use matchx_core::store::{ColumnStore, JobStore, LabelStore, ResultStore};
use matchx_core::{
    Error, JobRecord, JobStatus, Label, LabeledExample, LabelingTask, MatchCategory, MatchResult,
    Result, Row,
};

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// Tables held in memory
#[derive(Default)]
pub struct MemoryColumnStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a table
    pub fn insert_table(&self, name: &str, columns: Vec<String>, rows: Vec<Row>) {
        self.tables
            .write()
            .insert(name.to_string(), Table { columns, rows });
    }

    /// Add a table from a JSON array of objects. Columns are the object keys
    /// in order of first appearance.
    pub fn insert_json(&self, name: &str, value: &Value) -> Result<usize> {
        let items = value
            .as_array()
            .ok_or_else(|| Error::Serialization(format!("table {} is not a JSON array", name)))?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let Some(row) = Row::from_json(item) else {
                warn!("table {}: row {} is not an object, skipped", name, i);
                continue;
            };
            for column in row.columns() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
            rows.push(row);
        }
        let count = rows.len();
        self.insert_table(name, columns, rows);
        Ok(count)
    }

    /// Load every `<table>.json` file of a directory
    pub fn load_dir<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        let mut loaded = 0;
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let value: Value = serde_json::from_slice(&fs::read(&path)?)?;
            let rows = self.insert_json(name, &value)?;
            debug!("loaded table {} ({} rows) from {:?}", name, rows, path);
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl ColumnStore for MemoryColumnStore {
    fn rows(&self, table: &str) -> Result<Vec<Row>> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows.clone())
            .ok_or_else(|| Error::TableNotFound(table.to_string()))
    }

    fn columns(&self, table: &str) -> Result<Vec<String>> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| Error::TableNotFound(table.to_string()))
    }
}

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryJobStore {
    fn create(&self, job_id: &str, table_name: &str) -> Result<JobRecord> {
        let mut jobs = self.jobs.write();
        if jobs.contains_key(job_id) {
            return Err(Error::JobExists(job_id.to_string()));
        }
        let job = JobRecord::pending(job_id, table_name);
        jobs.insert(job_id.to_string(), job.clone());
        Ok(job)
    }

    fn set_status(&self, job_id: &str, status: JobStatus) -> Result<JobRecord> {
        let mut jobs = self.jobs.write();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;
        job.transition(status)?;
        Ok(job.clone())
    }

    fn get(&self, job_id: &str) -> Result<Option<JobRecord>> {
        Ok(self.jobs.read().get(job_id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryResultStore {
    results: RwLock<Vec<MatchResult>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }
}

impl ResultStore for MemoryResultStore {
    fn insert(&self, result: &MatchResult) -> Result<()> {
        self.results.write().push(result.clone());
        Ok(())
    }

    fn by_batch(&self, batch_id: &str, category: Option<MatchCategory>) -> Result<Vec<MatchResult>> {
        Ok(self
            .results
            .read()
            .iter()
            .filter(|r| r.batch_id == batch_id && category.map_or(true, |c| r.category == c))
            .cloned()
            .collect())
    }
}

/// Labeling tasks in insertion order. Shared by the memory and file label
/// stores.
#[derive(Debug, Clone, Default)]
pub(crate) struct TaskBook {
    tasks: HashMap<String, LabelingTask>,
    order: Vec<String>,
}

impl TaskBook {
    pub(crate) fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// `false` when the id is already taken
    pub(crate) fn insert(&mut self, task: LabelingTask) -> bool {
        if self.tasks.contains_key(&task.task_id) {
            return false;
        }
        self.order.push(task.task_id.clone());
        self.tasks.insert(task.task_id.clone(), task);
        true
    }

    pub(crate) fn get(&self, task_id: &str) -> Option<&LabelingTask> {
        self.tasks.get(task_id)
    }

    pub(crate) fn confirm(&mut self, task_id: &str, label: Label, confirmer: &str) -> Result<LabelingTask> {
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
        task.label = Some(label);
        task.confirmed_by = Some(confirmer.to_string());
        Ok(task.clone())
    }

    pub(crate) fn unconfirm(&mut self, task_id: &str) -> Result<LabelingTask> {
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
        task.label = None;
        task.confirmed_by = None;
        Ok(task.clone())
    }

    fn in_order(&self) -> impl Iterator<Item = &LabelingTask> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    pub(crate) fn unlabeled(&self) -> Vec<LabelingTask> {
        self.in_order().filter(|t| !t.is_confirmed()).cloned().collect()
    }

    pub(crate) fn examples(&self) -> Vec<LabeledExample> {
        self.in_order().filter_map(LabelingTask::to_example).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

#[derive(Default)]
pub struct MemoryLabelStore {
    book: RwLock<TaskBook>,
}

impl MemoryLabelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.book.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LabelStore for MemoryLabelStore {
    fn insert_task(&self, task: LabelingTask) -> Result<bool> {
        Ok(self.book.write().insert(task))
    }

    fn get_task(&self, task_id: &str) -> Result<Option<LabelingTask>> {
        Ok(self.book.read().get(task_id).cloned())
    }

    fn list_unlabeled(&self) -> Result<Vec<LabelingTask>> {
        Ok(self.book.read().unlabeled())
    }

    fn confirm(&self, task_id: &str, label: Label, confirmer: &str) -> Result<LabelingTask> {
        self.book.write().confirm(task_id, label, confirmer)
    }

    fn unconfirm(&self, task_id: &str) -> Result<LabelingTask> {
        self.book.write().unconfirm(task_id)
    }

    fn confirmed_examples(&self) -> Result<Vec<LabeledExample>> {
        Ok(self.book.read().examples())
    }
}
