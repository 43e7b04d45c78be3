//! Matching job records and their status lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Lifecycle of a matching batch: `Pending` moves to `Success` or `Failed`,
/// both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Success,
    Failed,
}

impl JobStatus {
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Status row of one matching batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub table_name: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// A fresh job in `Pending`
    #[must_use]
    pub fn pending(job_id: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            table_name: table_name.into(),
            status: JobStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// Apply a status change. Terminal states stamp the end time; leaving a
    /// terminal state is rejected.
    pub fn transition(&mut self, to: JobStatus) -> Result<()> {
        if self.status.is_terminal() || to == JobStatus::Pending {
            return Err(Error::InvalidTransition {
                job_id: self.job_id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.end_time = Some(Utc::now());
        Ok(())
    }
}
