//! Append-only label log
//!
//! Every change to the labeling queue is appended as one JSON line and
//! flushed before the in-memory state is updated. Review decisions are also
//! synced to disk before they are acknowledged. Opening the log replays
//! it. A torn final line, left by a crash mid-append, is skipped; corrupt
//! lines anywhere else are an error.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, StorageError};
use crate::memory::TaskBook;
use matchx_core::store::LabelStore;
use matchx_core::{Error, Label, LabeledExample, LabelingTask};

pub const LABEL_LOG_FILENAME: &str = "labels.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum LabelEvent {
    TaskCreated {
        task: LabelingTask,
    },
    Confirmed {
        task_id: String,
        label: Label,
        confirmed_by: String,
        at: DateTime<Utc>,
    },
    Unconfirmed {
        task_id: String,
        at: DateTime<Utc>,
    },
}

impl LabelEvent {
    /// Human decisions cannot be regenerated by rerunning a batch
    fn needs_sync(&self) -> bool {
        !matches!(self, LabelEvent::TaskCreated { .. })
    }

    fn apply(self, book: &mut TaskBook) -> matchx_core::Result<()> {
        match self {
            LabelEvent::TaskCreated { task } => {
                book.insert(task);
            }
            LabelEvent::Confirmed {
                task_id,
                label,
                confirmed_by,
                ..
            } => {
                book.confirm(&task_id, label, &confirmed_by)?;
            }
            LabelEvent::Unconfirmed { task_id, .. } => {
                book.unconfirm(&task_id)?;
            }
        }
        Ok(())
    }
}

/// Line-oriented append handle
struct LogWriter {
    file: Mutex<BufWriter<File>>,
    // For fsync
    raw_file: Mutex<File>,
}

impl LogWriter {
    fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let raw_file = file.try_clone()?;
        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            raw_file: Mutex::new(raw_file),
        })
    }

    fn append(&self, event: &LabelEvent) -> Result<()> {
        let line = serde_json::to_vec(event)?;
        let mut writer = self.file.lock();
        writer.write_all(&line)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        if event.needs_sync() {
            self.raw_file.lock().sync_data()?;
        }
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.file.lock().flush()?;
        self.raw_file.lock().sync_data()?;
        Ok(())
    }
}

/// Label store persisted as an event log
pub struct FileLabelStore {
    path: PathBuf,
    book: RwLock<TaskBook>,
    log: LogWriter,
}

impl FileLabelStore {
    /// Open (or create) the log under `data_dir` and replay it
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(LABEL_LOG_FILENAME);

        let book = if path.exists() {
            Self::replay(&path)?
        } else {
            TaskBook::default()
        };
        info!("label log {:?}: {} tasks", path, book.len());

        let log = LogWriter::open(&path)?;
        Ok(Self {
            path,
            book: RwLock::new(book),
            log,
        })
    }

    /// Rebuild the queue from the log, cutting off a torn final line so
    /// later appends start on a clean line
    fn replay(path: &Path) -> Result<TaskBook> {
        let content = fs::read_to_string(path)?;
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let last = lines.len().saturating_sub(1);

        let mut book = TaskBook::default();
        let mut valid_len = 0;
        for (i, raw) in lines.iter().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                valid_len += raw.len();
                continue;
            }
            let event: LabelEvent = match serde_json::from_str(line) {
                Ok(event) => event,
                Err(e) if i == last => {
                    warn!("label log {:?}: dropping torn final line: {}", path, e);
                    OpenOptions::new().write(true).open(path)?.set_len(valid_len as u64)?;
                    break;
                }
                Err(e) => {
                    return Err(StorageError::CorruptLog {
                        line: i + 1,
                        reason: e.to_string(),
                    })
                }
            };
            event.apply(&mut book).map_err(|e| StorageError::CorruptLog {
                line: i + 1,
                reason: e.to_string(),
            })?;
            valid_len += raw.len();
        }
        if valid_len == content.len() && !content.is_empty() && !content.ends_with('\n') {
            OpenOptions::new().append(true).open(path)?.write_all(b"\n")?;
        }
        Ok(book)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.book.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Force the log to stable storage
    pub fn sync(&self) -> matchx_core::Result<()> {
        Ok(self.log.sync()?)
    }
}

impl LabelStore for FileLabelStore {
    fn insert_task(&self, task: LabelingTask) -> matchx_core::Result<bool> {
        let mut book = self.book.write();
        if book.contains(&task.task_id) {
            return Ok(false);
        }
        let event = LabelEvent::TaskCreated { task: task.clone() };
        self.log.append(&event)?;
        Ok(book.insert(task))
    }

    fn get_task(&self, task_id: &str) -> matchx_core::Result<Option<LabelingTask>> {
        Ok(self.book.read().get(task_id).cloned())
    }

    fn list_unlabeled(&self) -> matchx_core::Result<Vec<LabelingTask>> {
        Ok(self.book.read().unlabeled())
    }

    fn confirm(&self, task_id: &str, label: Label, confirmer: &str) -> matchx_core::Result<LabelingTask> {
        let mut book = self.book.write();
        if !book.contains(task_id) {
            return Err(Error::TaskNotFound(task_id.to_string()));
        }
        self.log.append(&LabelEvent::Confirmed {
            task_id: task_id.to_string(),
            label,
            confirmed_by: confirmer.to_string(),
            at: Utc::now(),
        })?;
        book.confirm(task_id, label, confirmer)
    }

    fn unconfirm(&self, task_id: &str) -> matchx_core::Result<LabelingTask> {
        let mut book = self.book.write();
        if !book.contains(task_id) {
            return Err(Error::TaskNotFound(task_id.to_string()));
        }
        self.log.append(&LabelEvent::Unconfirmed {
            task_id: task_id.to_string(),
            at: Utc::now(),
        })?;
        book.unconfirm(task_id)
    }

    fn confirmed_examples(&self) -> matchx_core::Result<Vec<LabeledExample>> {
        Ok(self.book.read().examples())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::tests::task;
    use tempfile::TempDir;

    #[test]
    fn test_replay_restores_state() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileLabelStore::open(dir.path()).unwrap();
            store.insert_task(task("b_0_1", 88.0)).unwrap();
            store.insert_task(task("b_1_2", 87.0)).unwrap();
            store.insert_task(task("b_2_3", 86.0)).unwrap();
            store.confirm("b_0_1", Label::Match, "alice").unwrap();
            store.confirm("b_1_2", Label::Unmatch, "bob").unwrap();
            store.unconfirm("b_1_2").unwrap();
            store.sync().unwrap();
        }

        let store = FileLabelStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 3);
        let unlabeled: Vec<String> = store
            .list_unlabeled()
            .unwrap()
            .into_iter()
            .map(|t| t.task_id)
            .collect();
        assert_eq!(unlabeled, vec!["b_1_2", "b_2_3"]);
        assert_eq!(
            store.confirmed_examples().unwrap(),
            vec![LabeledExample::new(88.0, 0.6, Label::Match)]
        );
        assert_eq!(
            store.get_task("b_0_1").unwrap().unwrap().confirmed_by.as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn test_duplicate_insert_not_logged() {
        let dir = TempDir::new().unwrap();
        let store = FileLabelStore::open(dir.path()).unwrap();
        assert!(store.insert_task(task("b_0_1", 88.0)).unwrap());
        assert!(!store.insert_task(task("b_0_1", 88.0)).unwrap());
        let lines = fs::read_to_string(store.path()).unwrap().lines().count();
        assert_eq!(lines, 1);
    }

    #[test]
    fn test_torn_final_line_skipped() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileLabelStore::open(dir.path()).unwrap();
            store.insert_task(task("b_0_1", 88.0)).unwrap();
        }
        let path = dir.path().join(LABEL_LOG_FILENAME);
        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str("{\"event\":\"confirmed\",\"task_");
        fs::write(&path, content).unwrap();

        let store = FileLabelStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.list_unlabeled().unwrap().len(), 1);

        // Appends after recovery replay cleanly
        store.confirm("b_0_1", Label::Match, "alice").unwrap();
        drop(store);
        let store = FileLabelStore::open(dir.path()).unwrap();
        assert_eq!(store.confirmed_examples().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_middle_line_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LABEL_LOG_FILENAME);
        let good = serde_json::to_string(&LabelEvent::TaskCreated { task: task("b_0_1", 88.0) }).unwrap();
        fs::write(&path, format!("garbage\n{}\n", good)).unwrap();
        assert!(matches!(
            FileLabelStore::open(dir.path()),
            Err(StorageError::CorruptLog { line: 1, .. })
        ));
    }

    #[test]
    fn test_confirm_unknown_task() {
        let dir = TempDir::new().unwrap();
        let store = FileLabelStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.confirm("nope", Label::Match, "alice"),
            Err(Error::TaskNotFound(_))
        ));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "");
    }

    #[test]
    fn test_review_decisions_are_synced() {
        let created = LabelEvent::TaskCreated { task: task("b_0_1", 88.0) };
        let confirmed = LabelEvent::Confirmed {
            task_id: "b_0_1".to_string(),
            label: Label::Match,
            confirmed_by: "alice".to_string(),
            at: Utc::now(),
        };
        let unconfirmed = LabelEvent::Unconfirmed {
            task_id: "b_0_1".to_string(),
            at: Utc::now(),
        };
        assert!(!created.needs_sync());
        assert!(confirmed.needs_sync());
        assert!(unconfirmed.needs_sync());
    }

    #[test]
    fn test_confirmation_on_disk_before_close() {
        let dir = TempDir::new().unwrap();
        let store = FileLabelStore::open(dir.path()).unwrap();
        store.insert_task(task("b_0_1", 88.0)).unwrap();
        store.confirm("b_0_1", Label::Match, "alice").unwrap();

        // No explicit sync and the writer is still open
        let reader = FileLabelStore::open(dir.path()).unwrap();
        assert_eq!(
            reader.confirmed_examples().unwrap(),
            vec![LabeledExample::new(88.0, 0.6, Label::Match)]
        );
        drop(store);
    }
}
