//! Accumulated classifier training data
//!
//! Examples are kept in a JSON file that only ever grows: every retraining
//! round merges its confirmed examples into it, whether or not the new
//! model gets promoted.

use ahash::AHashSet;
use atomicwrites::{AllowOverwrite, AtomicFile};
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use matchx_core::LabeledExample;

pub const TRAINING_SET_FILENAME: &str = "training_set.json";

/// Drop exact repeats, keeping the first occurrence
pub fn dedup_examples(examples: impl IntoIterator<Item = LabeledExample>) -> Vec<LabeledExample> {
    let mut seen = AHashSet::new();
    examples
        .into_iter()
        .filter(|e| seen.insert(e.dedup_key()))
        .collect()
}

pub struct TrainingSetStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TrainingSetStore {
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join(TRAINING_SET_FILENAME),
            write_lock: Mutex::new(()),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted examples; empty when nothing was saved yet
    pub fn load(&self) -> Result<Vec<LabeledExample>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append `examples` to the persisted set, deduplicate, save, and return
    /// the merged set
    pub fn merge(&self, examples: &[LabeledExample]) -> Result<Vec<LabeledExample>> {
        let _guard = self.write_lock.lock();
        let existing = self.load()?;
        let before = existing.len();
        let merged = dedup_examples(existing.into_iter().chain(examples.iter().copied()));

        let bytes = serde_json::to_vec_pretty(&merged)?;
        AtomicFile::new(&self.path, AllowOverwrite).write(|f| f.write_all(&bytes))?;
        debug!(
            "training set: {} existing, {} offered, {} after merge",
            before,
            examples.len(),
            merged.len()
        );
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchx_core::Label;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = TrainingSetStore::open(dir.path()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_merge_accumulates_and_dedups() {
        let dir = TempDir::new().unwrap();
        let store = TrainingSetStore::open(dir.path()).unwrap();
        let a = LabeledExample::new(92.0, 0.8, Label::Match);
        let b = LabeledExample::new(40.0, 0.3, Label::Unmatch);

        assert_eq!(store.merge(&[a, a]).unwrap(), vec![a]);
        assert_eq!(store.merge(&[a, b]).unwrap(), vec![a, b]);

        let reopened = TrainingSetStore::open(dir.path()).unwrap();
        assert_eq!(reopened.load().unwrap(), vec![a, b]);
    }

    #[test]
    fn test_same_features_different_label_kept() {
        let merged = dedup_examples(vec![
            LabeledExample::new(88.0, 0.5, Label::Match),
            LabeledExample::new(88.0, 0.5, Label::Unmatch),
        ]);
        assert_eq!(merged.len(), 2);
    }
}
