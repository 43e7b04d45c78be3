//! Contracts of the collaborators the matching pipeline talks to.
//!
//! Table storage, job bookkeeping, human labels and result persistence
//! live outside this crate; the engine only sees these traits.

use crate::job::{JobRecord, JobStatus};
use crate::pair::{Label, LabeledExample, LabelingTask, MatchCategory, MatchResult};
use crate::record::Row;
use crate::Result;

/// Read access to source tables
pub trait ColumnStore: Send + Sync {
    /// All rows of a table, in table order
    fn rows(&self, table: &str) -> Result<Vec<Row>>;

    /// Column names of a table, in table order
    fn columns(&self, table: &str) -> Result<Vec<String>>;
}

/// Matching job bookkeeping
pub trait JobStore: Send + Sync {
    fn create(&self, job_id: &str, table_name: &str) -> Result<JobRecord>;

    fn set_status(&self, job_id: &str, status: JobStatus) -> Result<JobRecord>;

    fn get(&self, job_id: &str) -> Result<Option<JobRecord>>;
}

/// Human review queue for ambiguous pairs
pub trait LabelStore: Send + Sync {
    /// Insert a task; `Ok(false)` when a task with the same id already exists
    fn insert_task(&self, task: LabelingTask) -> Result<bool>;

    fn get_task(&self, task_id: &str) -> Result<Option<LabelingTask>>;

    /// Tasks still waiting for a judgment
    fn list_unlabeled(&self) -> Result<Vec<LabelingTask>>;

    /// Record a human judgment
    fn confirm(&self, task_id: &str, label: Label, confirmer: &str) -> Result<LabelingTask>;

    /// Withdraw a judgment, putting the task back in the queue
    fn unconfirm(&self, task_id: &str) -> Result<LabelingTask>;

    /// Training examples of every task with both a label and a confirmer
    fn confirmed_examples(&self) -> Result<Vec<LabeledExample>>;
}

/// Sink for categorized pairs
pub trait ResultStore: Send + Sync {
    /// Persist one result; writes are independent of each other
    fn insert(&self, result: &MatchResult) -> Result<()>;

    /// Results of a batch, optionally limited to one category
    fn by_batch(&self, batch_id: &str, category: Option<MatchCategory>) -> Result<Vec<MatchResult>>;
}
