//! Feed-forward multilayer-perceptron classifier.

/// Network structure and forward pass.
pub mod network;
/// Backpropagation trainer and configuration.
pub mod trainer;

use thiserror::Error;

pub use network::{DenseLayer, MlpModel};
pub use trainer::{MlpConfig, Solver, Trainer, TrainingSummary};

/// Errors raised by the classifier.
#[derive(Debug, Error)]
pub enum MlpError {
    /// `fit` called with zero samples or zero-width feature vectors.
    #[error("cannot fit on an empty dataset")]
    EmptyDataset,
    /// Feature and label sequences differ in length.
    #[error("feature/label count mismatch: {features} rows vs {labels} labels")]
    LabelMismatch {
        /// Number of feature rows.
        features: usize,
        /// Number of labels.
        labels: usize,
    },
    /// `predict` called before a successful fit or model load.
    #[error("model has not been fitted or loaded")]
    Untrained,
    /// Feature vector width differs from the fit-time dimensionality.
    #[error("dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch {
        /// Fit-time dimensionality.
        expected: usize,
        /// Width of the rejected vector.
        actual: usize,
    },
}

/// Trainable classifier facade over the network and trainer.
#[derive(Debug)]
pub struct MlpClassifier {
    config: MlpConfig,
    model: Option<MlpModel>,
}

impl MlpClassifier {
    /// Creates an untrained classifier.
    #[must_use]
    pub fn new(config: MlpConfig) -> Self {
        Self {
            config,
            model: None,
        }
    }

    /// Wraps an already-fitted model for the inference path.
    #[must_use]
    pub fn from_model(model: MlpModel) -> Self {
        Self {
            config: MlpConfig::default(),
            model: Some(model),
        }
    }

    /// Fits the network on scaled features.
    ///
    /// Exhausting the iteration budget without converging is reported in the
    /// summary, not raised as an error; the partially-optimized model is
    /// still installed and usable.
    pub fn fit(
        &mut self,
        features: &[Vec<f32>],
        labels: &[u32],
    ) -> Result<TrainingSummary, MlpError> {
        let trainer = Trainer::new(self.config.clone());
        let (model, summary) = trainer.fit(features, labels)?;
        self.model = Some(model);
        Ok(summary)
    }

    /// Predicts a label for every row of scaled features.
    pub fn predict(&self, features: &[Vec<f32>]) -> Result<Vec<u32>, MlpError> {
        self.model
            .as_ref()
            .ok_or(MlpError::Untrained)?
            .predict(features)
    }

    /// Predicts one sample through the batch path.
    pub fn predict_one(&self, features: &[f32]) -> Result<u32, MlpError> {
        let labels = self.predict(&[features.to_vec()])?;
        Ok(labels[0])
    }

    /// Fitted model, if any.
    #[must_use]
    pub fn model(&self) -> Option<&MlpModel> {
        self.model.as_ref()
    }

    /// Consumes the classifier, returning the fitted model.
    pub fn into_model(self) -> Result<MlpModel, MlpError> {
        self.model.ok_or(MlpError::Untrained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Vec<Vec<f32>>, Vec<u32>) {
        let features = vec![
            vec![1.0, 0.0, 0.1, 0.0],
            vec![0.0, 1.0, 0.0, 0.1],
            vec![0.9, 0.1, 0.2, 0.0],
            vec![0.1, 0.9, 0.0, 0.2],
        ];
        let labels = vec![0, 1, 0, 1];
        (features, labels)
    }

    fn quick_config() -> MlpConfig {
        MlpConfig {
            hidden_layers: vec![8],
            max_iter: 400,
            learning_rate: 0.05,
            tol: 1e-7,
            seed: 7,
            ..MlpConfig::default()
        }
    }

    #[test]
    fn untrained_classifier_refuses_to_predict() {
        let classifier = MlpClassifier::new(MlpConfig::default());
        let err = classifier.predict(&[vec![0.0, 0.0]]).unwrap_err();
        assert!(matches!(err, MlpError::Untrained));
    }

    #[test]
    fn fit_rejects_empty_dataset() {
        let mut classifier = MlpClassifier::new(MlpConfig::default());
        let err = classifier.fit(&[], &[]).unwrap_err();
        assert!(matches!(err, MlpError::EmptyDataset));
    }

    #[test]
    fn fit_rejects_misaligned_labels() {
        let mut classifier = MlpClassifier::new(MlpConfig::default());
        let err = classifier
            .fit(&[vec![1.0], vec![2.0]], &[0])
            .unwrap_err();
        assert!(matches!(
            err,
            MlpError::LabelMismatch {
                features: 2,
                labels: 1
            }
        ));
    }

    #[test]
    fn learns_a_separable_problem() {
        let (features, labels) = separable_data();
        let mut classifier = MlpClassifier::new(quick_config());
        classifier.fit(&features, &labels).unwrap();
        let predicted = classifier.predict(&features).unwrap();
        assert_eq!(predicted, labels);
    }

    #[test]
    fn single_and_batch_prediction_agree() {
        let (features, labels) = separable_data();
        let mut classifier = MlpClassifier::new(quick_config());
        classifier.fit(&features, &labels).unwrap();
        let batch = classifier.predict(&features).unwrap();
        for (row, expected) in features.iter().zip(batch.iter()) {
            assert_eq!(classifier.predict_one(row).unwrap(), *expected);
        }
    }

    #[test]
    fn identical_seeds_reproduce_predictions() {
        let (features, labels) = separable_data();
        let probe = vec![
            vec![0.7, 0.2, 0.1, 0.1],
            vec![0.2, 0.8, 0.0, 0.1],
        ];
        let mut first = MlpClassifier::new(quick_config());
        first.fit(&features, &labels).unwrap();
        let mut second = MlpClassifier::new(quick_config());
        second.fit(&features, &labels).unwrap();
        assert_eq!(
            first.predict(&probe).unwrap(),
            second.predict(&probe).unwrap()
        );
        assert_eq!(first.model(), second.model());
    }

    #[test]
    fn predict_rejects_wrong_width() {
        let (features, labels) = separable_data();
        let mut classifier = MlpClassifier::new(quick_config());
        classifier.fit(&features, &labels).unwrap();
        let err = classifier.predict(&[vec![1.0, 2.0]]).unwrap_err();
        assert!(matches!(
            err,
            MlpError::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn predictions_stay_inside_training_label_set() {
        let (features, labels) = separable_data();
        let mut classifier = MlpClassifier::new(quick_config());
        classifier.fit(&features, &labels).unwrap();
        let predicted = classifier
            .predict(&[vec![5.0, -3.0, 9.0, 2.0]])
            .unwrap();
        assert!(labels.contains(&predicted[0]));
    }
}
