use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kind tag distinguishing artifact payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Fitted classifier weights.
    Model,
    /// Fitted scaler state.
    Scaler,
}

/// Wrapper persisted around every artifact.
///
/// The model and scaler written by one training run share a `run_id`, which
/// lets the inference path refuse a mismatched pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEnvelope<T> {
    /// Training run that produced the artifact.
    pub run_id: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Payload kind tag.
    pub kind: ArtifactKind,
    /// The artifact itself.
    pub payload: T,
}

impl<T> ArtifactEnvelope<T> {
    /// Wraps a payload under the given run id.
    #[must_use]
    pub fn new(run_id: Uuid, kind: ArtifactKind, payload: T) -> Self {
        Self {
            run_id,
            created_at: Utc::now(),
            kind,
            payload,
        }
    }
}

/// Errors raised by the model store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No artifact stored under the requested name.
    #[error("artifact {0:?} not found")]
    NotFound(String),
    /// Stored bytes do not deserialize into the expected structure.
    #[error("artifact {name:?} is corrupt: {source}")]
    Corrupt {
        /// Blob name.
        name: String,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// Serialization failure on save.
    #[error("serializing artifact {name:?}: {source}")]
    Serialize {
        /// Blob name.
        name: String,
        /// Underlying encode failure.
        #[source]
        source: serde_json::Error,
    },
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Durable name-keyed storage for opaque artifact blobs.
///
/// Saves are last-write-wins and atomic: the blob is written to a temp file
/// and renamed over the target, so a concurrent `load` never observes a
/// partial write.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Blob name for a model artifact.
    #[must_use]
    pub fn model_blob(name: &str) -> String {
        format!("{name}.model")
    }

    /// Blob name for a scaler artifact.
    #[must_use]
    pub fn scaler_blob(name: &str) -> String {
        format!("{name}.scaler")
    }

    /// Serializes an artifact under `name`, atomically replacing any prior blob.
    pub fn save<T: Serialize>(
        &self,
        name: &str,
        envelope: &ArtifactEnvelope<T>,
    ) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;
        let bytes = serde_json::to_vec(envelope).map_err(|source| StoreError::Serialize {
            name: name.to_string(),
            source,
        })?;
        let target = self.root.join(name);
        let temp = self.root.join(format!(".{name}.tmp"));
        fs::write(&temp, bytes)?;
        fs::rename(&temp, &target)?;
        Ok(())
    }

    /// Loads and deserializes the artifact stored under `name`.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<ArtifactEnvelope<T>, StoreError> {
        let path = self.root.join(name);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(err) => return Err(StoreError::Io(err)),
        };
        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            name: name.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaler::{StandardScaler, ZeroVariancePolicy};
    use tempfile::tempdir;

    fn fitted_scaler() -> StandardScaler {
        let rows = vec![vec![1.0, 4.0], vec![3.0, 8.0]];
        StandardScaler::fit(&rows, ZeroVariancePolicy::PassThrough).unwrap()
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let run_id = Uuid::new_v4();
        let envelope = ArtifactEnvelope::new(run_id, ArtifactKind::Scaler, fitted_scaler());
        store.save("digits.scaler", &envelope).unwrap();
        let loaded = store.load::<StandardScaler>("digits.scaler").unwrap();
        assert_eq!(loaded.run_id, run_id);
        assert_eq!(loaded.kind, ArtifactKind::Scaler);
        assert_eq!(loaded.payload, fitted_scaler());
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let err = store.load::<StandardScaler>("nonexistent.model").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(name) if name == "nonexistent.model"));
    }

    #[test]
    fn unparseable_blob_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join("broken.model"), b"not json at all").unwrap();
        let err = store.load::<StandardScaler>("broken.model").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn save_overwrites_previous_blob() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let first = ArtifactEnvelope::new(Uuid::new_v4(), ArtifactKind::Scaler, fitted_scaler());
        let second = ArtifactEnvelope::new(Uuid::new_v4(), ArtifactKind::Scaler, fitted_scaler());
        store.save("digits.scaler", &first).unwrap();
        store.save("digits.scaler", &second).unwrap();
        let loaded = store.load::<StandardScaler>("digits.scaler").unwrap();
        assert_eq!(loaded.run_id, second.run_id);
        // No temp file is left behind after the rename.
        assert!(!dir.path().join(".digits.scaler.tmp").exists());
    }

    #[test]
    fn blob_names_follow_convention() {
        assert_eq!(ModelStore::model_blob("mnist"), "mnist.model");
        assert_eq!(ModelStore::scaler_blob("mnist"), "mnist.scaler");
    }
}
