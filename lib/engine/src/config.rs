use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use matchx_core::{BlockingConfig, Error, VectorizerConfig};
use matchx_similarity::{FusionConfig, GbdtParams};

/// Retraining settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// Confirmed labels needed before a retraining round runs
    pub min_new_samples: usize,
    pub test_fraction: f64,
    /// Seed for oversampling and the train/test split
    pub seed: u64,
    pub smote_k: usize,
    pub gbdt: GbdtParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_new_samples: 10,
            test_fraction: 0.2,
            seed: 42,
            smote_k: 5,
            gbdt: GbdtParams::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> matchx_core::Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.smote_k == 0 {
            return Err(Error::InvalidConfig("smote_k must be positive".to_string()));
        }
        self.gbdt
            .validate()
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub vectorizer: VectorizerConfig,
    pub blocking: BlockingConfig,
    pub fusion: FusionConfig,
    pub training: TrainingConfig,
    /// Home of the model artifact, training set and label log
    pub data_dir: PathBuf,
    /// Pairs kept per sample list in a batch summary
    pub sample_size: usize,
    /// Keep only pairs spanning both tables in two-table runs
    pub cross_table_only: bool,
    /// Background matching threads
    pub workers: usize,
    /// Finished batches whose state and progress stay pollable
    pub retained_batches: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vectorizer: VectorizerConfig::default(),
            blocking: BlockingConfig::default(),
            fusion: FusionConfig::default(),
            training: TrainingConfig::default(),
            data_dir: PathBuf::from("./matchx_data"),
            sample_size: 10,
            cross_table_only: false,
            workers: 1,
            retained_batches: 100,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file; missing keys take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref()).map_err(Error::from)?;
        let config: Self = serde_json::from_slice(&bytes).map_err(Error::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> matchx_core::Result<()> {
        self.vectorizer.validate()?;
        self.blocking.validate()?;
        self.fusion.validate()?;
        self.training.validate()?;
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be positive".to_string()));
        }
        if self.retained_batches == 0 {
            return Err(Error::InvalidConfig("retained_batches must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.blocking.chunk_size, 5000);
        assert_eq!(config.blocking.k, 6);
        assert_eq!(config.training.min_new_samples, 10);
        assert_eq!(config.sample_size, 10);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"blocking": {"chunk_size": 2}, "workers": 3}"#).unwrap();
        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.blocking.chunk_size, 2);
        assert_eq!(config.blocking.k, 6);
        assert_eq!(config.workers, 3);
        assert_eq!(config.fusion, FusionConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = EngineConfig::default();
        config.training.test_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.blocking.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.workers = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.retained_batches = 0;
        assert!(config.validate().is_err());
    }
}
