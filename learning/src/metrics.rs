use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the evaluator.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Predicted and true label sequences differ in length.
    #[error("length mismatch: {predicted} predictions vs {truth} labels")]
    LengthMismatch {
        /// Number of predictions.
        predicted: usize,
        /// Number of true labels.
        truth: usize,
    },
}

/// Fraction of positions where the predicted label equals the true label.
///
/// Pure and stateless; the sequences must be aligned and of equal length.
pub fn accuracy(predicted: &[u32], truth: &[u32]) -> Result<f32, MetricsError> {
    if predicted.len() != truth.len() {
        return Err(MetricsError::LengthMismatch {
            predicted: predicted.len(),
            truth: truth.len(),
        });
    }
    if predicted.is_empty() {
        return Ok(0.0);
    }
    let matches = predicted
        .iter()
        .zip(truth.iter())
        .filter(|(p, t)| p == t)
        .count();
    Ok(matches as f32 / predicted.len() as f32)
}

/// Evaluation outcome for a held-out set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Fraction of correct predictions.
    pub accuracy: f32,
    /// Number of evaluated samples.
    pub samples: usize,
}

impl EvaluationReport {
    /// Builds a report from aligned predicted and true label sequences.
    pub fn from_labels(predicted: &[u32], truth: &[u32]) -> Result<Self, MetricsError> {
        Ok(Self {
            accuracy: accuracy(predicted, truth)?,
            samples: truth.len(),
        })
    }

    /// Renders a concise summary string.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("[eval] accuracy={:.4} samples={}", self.accuracy, self.samples)
    }
}
