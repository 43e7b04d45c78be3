//! File-backed model store
//!
//! The promoted model lives in a single bincode file. Promotion writes a
//! temporary file and renames it over the old one, so readers see either
//! the previous artifact or the new one. Every load verifies the SHA-256
//! of the encoded model.

use atomicwrites::{AllowOverwrite, AtomicFile};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, StorageError};
use matchx_similarity::{GbdtClassifier, ModelArtifact, ModelStore};

pub const MODEL_FILENAME: &str = "model.bin";
const FORMAT_VERSION: u32 = 1;

/// On-disk envelope; the model is kept as bytes so the checksum covers
/// exactly what was written
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactFile {
    format: u32,
    version: u64,
    trained_at: DateTime<Utc>,
    held_out_loss: f64,
    checksum: String,
    model: Vec<u8>,
}

fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub struct FileModelStore {
    path: PathBuf,
    // Serializes promotions; loads go straight to the file
    promote_lock: Mutex<()>,
}

impl FileModelStore {
    /// Store rooted at `data_dir`, creating the directory if needed
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join(MODEL_FILENAME),
            promote_lock: Mutex::new(()),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read(&self) -> Result<Option<ModelArtifact>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: ArtifactFile = bincode::deserialize(&bytes)?;
        if file.format != FORMAT_VERSION {
            return Err(StorageError::UnsupportedFormat(file.format));
        }

        let actual = checksum(&file.model);
        if actual != file.checksum {
            return Err(StorageError::ChecksumMismatch {
                path: self.path.display().to_string(),
                expected: file.checksum,
                actual,
            });
        }
        let model: GbdtClassifier = bincode::deserialize(&file.model)?;

        Ok(Some(ModelArtifact {
            version: file.version,
            trained_at: file.trained_at,
            held_out_loss: file.held_out_loss,
            checksum: file.checksum,
            model,
        }))
    }

    /// Write `model` as the next version. With `expected` set, the write
    /// only happens if the current version still matches it.
    fn write(
        &self,
        expected: Option<Option<u64>>,
        model: GbdtClassifier,
        held_out_loss: f64,
    ) -> Result<Option<ModelArtifact>> {
        let _guard = self.promote_lock.lock();

        let current = self.read()?.map(|a| a.version);
        if let Some(expected) = expected {
            if current != expected {
                info!(
                    "model promotion skipped: version is {:?}, expected {:?}",
                    current, expected
                );
                return Ok(None);
            }
        }
        let previous = current.unwrap_or(0);
        let encoded = bincode::serialize(&model)?;
        let file = ArtifactFile {
            format: FORMAT_VERSION,
            version: previous + 1,
            trained_at: Utc::now(),
            held_out_loss,
            checksum: checksum(&encoded),
            model: encoded,
        };
        let bytes = bincode::serialize(&file)?;

        AtomicFile::new(&self.path, AllowOverwrite).write(|f| f.write_all(&bytes))?;
        info!(
            "promoted model version {} (held-out loss {:.4}) to {:?}",
            file.version, held_out_loss, self.path
        );

        Ok(Some(ModelArtifact {
            version: file.version,
            trained_at: file.trained_at,
            held_out_loss,
            checksum: file.checksum,
            model,
        }))
    }
}

impl ModelStore for FileModelStore {
    fn load(&self) -> matchx_core::Result<Option<ModelArtifact>> {
        Ok(self.read()?)
    }

    fn promote(&self, model: GbdtClassifier, held_out_loss: f64) -> matchx_core::Result<ModelArtifact> {
        self.write(None, model, held_out_loss)?
            .ok_or_else(|| matchx_core::Error::Storage("unconditional promotion was skipped".to_string()))
    }

    fn promote_if(
        &self,
        expected: Option<u64>,
        model: GbdtClassifier,
        held_out_loss: f64,
    ) -> matchx_core::Result<Option<ModelArtifact>> {
        Ok(self.write(Some(expected), model, held_out_loss)?)
    }
}

/// Model store kept in memory, for tests and throwaway runs
#[derive(Default)]
pub struct MemoryModelStore {
    current: Mutex<Option<ModelArtifact>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(
        current: Option<&ModelArtifact>,
        model: GbdtClassifier,
        held_out_loss: f64,
    ) -> matchx_core::Result<ModelArtifact> {
        let encoded = bincode::serialize(&model).map_err(StorageError::from)?;
        Ok(ModelArtifact {
            version: current.map(|a| a.version).unwrap_or(0) + 1,
            trained_at: Utc::now(),
            held_out_loss,
            checksum: checksum(&encoded),
            model,
        })
    }
}

impl ModelStore for MemoryModelStore {
    fn load(&self) -> matchx_core::Result<Option<ModelArtifact>> {
        Ok(self.current.lock().clone())
    }

    fn promote(&self, model: GbdtClassifier, held_out_loss: f64) -> matchx_core::Result<ModelArtifact> {
        let mut current = self.current.lock();
        let artifact = Self::next(current.as_ref(), model, held_out_loss)?;
        *current = Some(artifact.clone());
        Ok(artifact)
    }

    fn promote_if(
        &self,
        expected: Option<u64>,
        model: GbdtClassifier,
        held_out_loss: f64,
    ) -> matchx_core::Result<Option<ModelArtifact>> {
        let mut current = self.current.lock();
        if current.as_ref().map(|a| a.version) != expected {
            return Ok(None);
        }
        let artifact = Self::next(current.as_ref(), model, held_out_loss)?;
        *current = Some(artifact.clone());
        Ok(Some(artifact))
    }
}
