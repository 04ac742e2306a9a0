use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Policy for features whose training variance is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    /// Center the feature and leave its scale at one.
    #[default]
    PassThrough,
    /// Refuse to fit, surfacing the degenerate column.
    Reject,
}

/// Errors raised by the feature scaler.
#[derive(Debug, Error)]
pub enum ScalerError {
    /// `fit` called with zero samples.
    #[error("cannot fit a scaler on an empty dataset")]
    EmptyDataset,
    /// Training rows disagree on feature count.
    #[error("row {row} has {actual} features, expected {expected}")]
    RaggedInput {
        /// 0-based offending row.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        actual: usize,
    },
    /// A feature column has zero variance under the `Reject` policy.
    #[error("feature column {column} has zero variance")]
    DegenerateFeature {
        /// 0-based feature column.
        column: usize,
    },
    /// Vector length differs from the fit-time dimensionality.
    #[error("dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch {
        /// Fit-time dimensionality.
        expected: usize,
        /// Length of the rejected vector.
        actual: usize,
    },
}

/// Per-feature standardization state computed once from training data.
///
/// The same fitted state must be applied at training, evaluation, and
/// inference time; it is immutable after `fit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f32>,
    stds: Vec<f32>,
}

impl StandardScaler {
    /// Computes per-column mean and population standard deviation.
    ///
    /// Deterministic and idempotent for identical input. Zero-variance
    /// columns are handled per `policy`.
    pub fn fit(
        features: &[Vec<f32>],
        policy: ZeroVariancePolicy,
    ) -> Result<Self, ScalerError> {
        let first = features.first().ok_or(ScalerError::EmptyDataset)?;
        let dim = first.len();
        for (row, values) in features.iter().enumerate() {
            if values.len() != dim {
                return Err(ScalerError::RaggedInput {
                    row,
                    expected: dim,
                    actual: values.len(),
                });
            }
        }

        let count = features.len() as f32;
        let mut means = vec![0.0f32; dim];
        for values in features {
            for (column, value) in values.iter().enumerate() {
                means[column] += value;
            }
        }
        for mean in &mut means {
            *mean /= count;
        }

        let mut stds = vec![0.0f32; dim];
        for values in features {
            for (column, value) in values.iter().enumerate() {
                stds[column] += (value - means[column]).powi(2);
            }
        }
        for (column, std) in stds.iter_mut().enumerate() {
            *std = (*std / count).sqrt();
            if *std == 0.0 {
                match policy {
                    ZeroVariancePolicy::PassThrough => *std = 1.0,
                    ZeroVariancePolicy::Reject => {
                        return Err(ScalerError::DegenerateFeature { column })
                    }
                }
            }
        }

        Ok(Self { means, stds })
    }

    /// Applies `(x - mean) / std` to one feature vector.
    pub fn transform(&self, features: &[f32]) -> Result<Vec<f32>, ScalerError> {
        if features.len() != self.means.len() {
            return Err(ScalerError::DimensionMismatch {
                expected: self.means.len(),
                actual: features.len(),
            });
        }
        Ok(features
            .iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(value, (mean, std))| (value - mean) / std)
            .collect())
    }

    /// Transforms a batch, one row at a time through the single-vector path.
    pub fn transform_batch(&self, rows: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, ScalerError> {
        rows.iter().map(|row| self.transform(row)).collect()
    }

    /// Fit-time feature dimensionality.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.means.len()
    }

    /// Per-column means.
    #[must_use]
    pub fn means(&self) -> &[f32] {
        &self.means
    }

    /// Per-column standard deviations (1.0 for passed-through columns).
    #[must_use]
    pub fn stds(&self) -> &[f32] {
        &self.stds
    }
}
