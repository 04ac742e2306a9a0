use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::MlpError;

/// One fully-connected layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Weight matrix, `input_dim x output_dim`.
    pub weights: Array2<f32>,
    /// Bias vector, length `output_dim`.
    pub bias: Array1<f32>,
}

impl DenseLayer {
    /// Affine output `input . W + b`.
    #[must_use]
    pub fn affine(&self, input: &Array2<f32>) -> Array2<f32> {
        input.dot(&self.weights) + &self.bias
    }
}

/// Fitted feed-forward network plus the label set it was trained on.
///
/// Predictions index into `classes`, so the model can never emit a label it
/// did not observe during fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpModel {
    /// Hidden and output layers in forward order.
    pub layers: Vec<DenseLayer>,
    /// Sorted labels observed during fitting.
    pub classes: Vec<u32>,
}

impl MlpModel {
    /// Feature dimensionality the network was fit on.
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.weights.nrows())
    }

    /// Class probabilities for a batch of scaled feature rows.
    #[must_use]
    pub fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        let mut activation = input.clone();
        let last = self.layers.len().saturating_sub(1);
        for (index, layer) in self.layers.iter().enumerate() {
            let mut z = layer.affine(&activation);
            if index == last {
                softmax_rows(&mut z);
            } else {
                relu(&mut z);
            }
            activation = z;
        }
        activation
    }

    /// Most likely label for each row of scaled features.
    ///
    /// Batch and single-sample prediction share this code path.
    pub fn predict(&self, rows: &[Vec<f32>]) -> Result<Vec<u32>, MlpError> {
        if self.layers.is_empty() || self.classes.is_empty() {
            return Err(MlpError::Untrained);
        }
        let dim = self.input_dim();
        for row in rows {
            if row.len() != dim {
                return Err(MlpError::DimensionMismatch {
                    expected: dim,
                    actual: row.len(),
                });
            }
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let mut input = Array2::zeros((rows.len(), dim));
        for (i, row) in rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                input[[i, j]] = *value;
            }
        }
        let probabilities = self.forward(&input);
        let mut labels = Vec::with_capacity(rows.len());
        for row in probabilities.axis_iter(Axis(0)) {
            let mut best = 0usize;
            let mut best_probability = f32::NEG_INFINITY;
            for (index, probability) in row.iter().enumerate() {
                if *probability > best_probability {
                    best_probability = *probability;
                    best = index;
                }
            }
            labels.push(self.classes[best]);
        }
        Ok(labels)
    }
}

/// In-place rectified linear unit.
pub(crate) fn relu(z: &mut Array2<f32>) {
    z.mapv_inplace(|value| value.max(0.0));
}

/// In-place row-wise softmax with max-subtraction for stability.
pub(crate) fn softmax_rows(z: &mut Array2<f32>) {
    for mut row in z.axis_iter_mut(Axis(0)) {
        let max = row.iter().fold(f32::NEG_INFINITY, |acc, v| acc.max(*v));
        row.mapv_inplace(|value| (value - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|value| value / sum);
    }
}
