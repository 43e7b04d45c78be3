//! Persisted classifier and the store contract it lives behind

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gbdt::GbdtClassifier;
use matchx_core::Result;

/// The currently promoted model and its bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelArtifact {
    /// Monotonic, bumped on every promotion
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    /// Log-loss on the held-out split the model was evaluated on
    pub held_out_loss: f64,
    /// Hex SHA-256 of the encoded model, verified on load
    pub checksum: String,
    pub model: GbdtClassifier,
}

/// Durable home of the promoted model.
///
/// `promote` must be atomic: a concurrent or later `load` sees either the
/// previous artifact or the new one, never a partial write. `promote_if`
/// must also check the current version under the same lock as the write.
pub trait ModelStore: Send + Sync {
    /// The promoted artifact, `None` before the first promotion
    fn load(&self) -> Result<Option<ModelArtifact>>;

    /// Replace the promoted artifact, returning it with its new version
    fn promote(&self, model: GbdtClassifier, held_out_loss: f64) -> Result<ModelArtifact>;

    /// Promote only if the current version is still `expected` (`None`
    /// meaning no artifact). Returns `None` and writes nothing when another
    /// promotion got there first.
    fn promote_if(
        &self,
        expected: Option<u64>,
        model: GbdtClassifier,
        held_out_loss: f64,
    ) -> Result<Option<ModelArtifact>>;
}
