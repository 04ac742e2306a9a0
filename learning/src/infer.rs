use thiserror::Error;
use uuid::Uuid;

use crate::{
    mlp::{MlpClassifier, MlpError, MlpModel},
    scaler::{ScalerError, StandardScaler},
    store::{ArtifactKind, ModelStore, StoreError},
};

/// Errors raised on the inference path.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Store failure (missing or corrupt artifact).
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Scaler failure (dimension mismatch).
    #[error(transparent)]
    Scaler(#[from] ScalerError),
    /// Classifier failure.
    #[error(transparent)]
    Model(#[from] MlpError),
    /// Artifact carries the wrong kind tag.
    #[error("artifact {name:?} holds a {actual:?} payload, expected {expected:?}")]
    WrongKind {
        /// Blob name.
        name: String,
        /// Kind required at this position.
        expected: ArtifactKind,
        /// Kind actually stored.
        actual: ArtifactKind,
    },
    /// Model and scaler come from different training runs.
    #[error("artifact pair mismatch: model from run {model_run}, scaler from run {scaler_run}")]
    PairMismatch {
        /// Run that produced the model blob.
        model_run: Uuid,
        /// Run that produced the scaler blob.
        scaler_run: Uuid,
    },
}

/// Loaded model/scaler pair reused across `classify` calls.
///
/// Constructed once per process from the model store and never re-fit; the
/// scaler is applied exactly once per sample, then the classifier predicts.
#[derive(Debug)]
pub struct InferenceContext {
    classifier: MlpClassifier,
    scaler: StandardScaler,
    run_id: Uuid,
}

impl InferenceContext {
    /// Loads the persisted artifact pair for `name`, verifying kind tags and
    /// that both blobs come from the same training run.
    pub fn load(store: &ModelStore, name: &str) -> Result<Self, InferenceError> {
        let model_blob = ModelStore::model_blob(name);
        let scaler_blob = ModelStore::scaler_blob(name);
        let model_envelope = store.load::<MlpModel>(&model_blob)?;
        let scaler_envelope = store.load::<StandardScaler>(&scaler_blob)?;
        if model_envelope.kind != ArtifactKind::Model {
            return Err(InferenceError::WrongKind {
                name: model_blob,
                expected: ArtifactKind::Model,
                actual: model_envelope.kind,
            });
        }
        if scaler_envelope.kind != ArtifactKind::Scaler {
            return Err(InferenceError::WrongKind {
                name: scaler_blob,
                expected: ArtifactKind::Scaler,
                actual: scaler_envelope.kind,
            });
        }
        if model_envelope.run_id != scaler_envelope.run_id {
            return Err(InferenceError::PairMismatch {
                model_run: model_envelope.run_id,
                scaler_run: scaler_envelope.run_id,
            });
        }
        Ok(Self {
            classifier: MlpClassifier::from_model(model_envelope.payload),
            scaler: scaler_envelope.payload,
            run_id: model_envelope.run_id,
        })
    }

    /// Training run the loaded pair came from.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Feature dimensionality the pair was fit on.
    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.scaler.dim()
    }

    /// Scales one raw feature vector and predicts its label.
    pub fn classify(&self, raw: &[f32]) -> Result<u32, InferenceError> {
        let scaled = self.scaler.transform(raw)?;
        Ok(self.classifier.predict_one(&scaled)?)
    }
}
