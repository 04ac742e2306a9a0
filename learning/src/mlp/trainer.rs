use indexmap::IndexMap;
use ndarray::{Array1, Array2, Axis};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::network::{softmax_rows, DenseLayer, MlpModel};
use super::MlpError;

/// Optimization algorithm used for weight updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    /// Plain full-batch gradient descent.
    Sgd,
    /// Adam with bias-corrected moment estimates.
    #[default]
    Adam,
}

/// Training hyperparameters for the feed-forward classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpConfig {
    /// Hidden layer widths in forward order.
    pub hidden_layers: Vec<usize>,
    /// Iteration budget. Exhausting it without converging is a warning, not an error.
    pub max_iter: usize,
    /// L2 regularization strength.
    pub alpha: f32,
    /// Step size for weight updates.
    pub learning_rate: f32,
    /// Optimizer selection.
    pub solver: Solver,
    /// Minimum loss improvement still counted as progress.
    pub tol: f32,
    /// Seed for reproducible weight initialization.
    pub seed: u64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            max_iter: 200,
            alpha: 1e-4,
            learning_rate: 1e-3,
            solver: Solver::Adam,
            tol: 1e-4,
            seed: 0,
        }
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Iterations actually executed.
    pub iterations: usize,
    /// Whether the loss plateaued within the iteration budget.
    pub converged: bool,
    /// Loss after the final iteration.
    pub final_loss: f32,
    /// Loss after each iteration.
    pub loss_curve: Vec<f32>,
}

/// Consecutive low-improvement iterations counted as a plateau.
const NO_IMPROVEMENT_LIMIT: usize = 10;

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

/// Runs full-batch backpropagation and produces a fitted model.
#[derive(Debug)]
pub struct Trainer {
    config: MlpConfig,
}

impl Trainer {
    /// Creates a trainer with the provided configuration.
    #[must_use]
    pub fn new(config: MlpConfig) -> Self {
        Self { config }
    }

    /// Fits the network; returns the model and a training summary.
    ///
    /// Given an identical seed, configuration, and input order the result is
    /// bitwise reproducible.
    pub fn fit(
        &self,
        features: &[Vec<f32>],
        labels: &[u32],
    ) -> Result<(MlpModel, TrainingSummary), MlpError> {
        if features.is_empty() {
            return Err(MlpError::EmptyDataset);
        }
        if features.len() != labels.len() {
            return Err(MlpError::LabelMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }
        let dim = features[0].len();
        if dim == 0 {
            return Err(MlpError::EmptyDataset);
        }
        for row in features {
            if row.len() != dim {
                return Err(MlpError::DimensionMismatch {
                    expected: dim,
                    actual: row.len(),
                });
            }
        }

        let mut classes: Vec<u32> = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        let class_index: IndexMap<u32, usize> = classes
            .iter()
            .enumerate()
            .map(|(index, class)| (*class, index))
            .collect();

        let input = matrix_from_rows(features, dim);
        let mut targets = Array2::<f32>::zeros((labels.len(), classes.len()));
        for (row, label) in labels.iter().enumerate() {
            targets[[row, class_index[label]]] = 1.0;
        }

        let mut layers = init_layers(dim, &self.config.hidden_layers, classes.len(), self.config.seed);
        let mut optimizer = OptimizerState::new(self.config.solver, &layers);

        let mut loss_curve = Vec::with_capacity(self.config.max_iter);
        let mut best_loss = f32::INFINITY;
        let mut stale = 0usize;
        let mut converged = false;
        let mut iterations = 0usize;

        for _ in 0..self.config.max_iter {
            iterations += 1;
            let (loss, gradients) = forward_backward(&layers, &input, &targets, self.config.alpha);
            loss_curve.push(loss);
            optimizer.apply(&mut layers, &gradients, self.config.learning_rate);
            if best_loss - loss > self.config.tol {
                best_loss = loss;
                stale = 0;
            } else {
                stale += 1;
                if stale >= NO_IMPROVEMENT_LIMIT {
                    converged = true;
                    break;
                }
            }
        }

        let final_loss = loss_curve.last().copied().unwrap_or(f32::INFINITY);
        let model = MlpModel { layers, classes };
        let summary = TrainingSummary {
            iterations,
            converged,
            final_loss,
            loss_curve,
        };
        Ok((model, summary))
    }
}

fn matrix_from_rows(rows: &[Vec<f32>], dim: usize) -> Array2<f32> {
    let mut matrix = Array2::zeros((rows.len(), dim));
    for (i, row) in rows.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            matrix[[i, j]] = *value;
        }
    }
    matrix
}

fn init_layers(input_dim: usize, hidden: &[usize], output_dim: usize, seed: u64) -> Vec<DenseLayer> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut dims = Vec::with_capacity(hidden.len() + 2);
    dims.push(input_dim);
    dims.extend_from_slice(hidden);
    dims.push(output_dim);
    let mut layers = Vec::with_capacity(dims.len() - 1);
    for pair in dims.windows(2) {
        let (fan_in, fan_out) = (pair[0], pair[1]);
        // Glorot-uniform bounds keep early activations in range.
        let limit = (6.0f32 / (fan_in + fan_out) as f32).sqrt();
        let weights = Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit));
        let bias = Array1::zeros(fan_out);
        layers.push(DenseLayer { weights, bias });
    }
    layers
}

struct Gradients {
    weights: Vec<Array2<f32>>,
    biases: Vec<Array1<f32>>,
}

/// One full-batch pass: cross-entropy loss with an L2 penalty, plus gradients.
fn forward_backward(
    layers: &[DenseLayer],
    input: &Array2<f32>,
    targets: &Array2<f32>,
    alpha: f32,
) -> (f32, Gradients) {
    let sample_count = input.nrows() as f32;
    let last = layers.len() - 1;

    let mut activations: Vec<Array2<f32>> = Vec::with_capacity(layers.len() + 1);
    activations.push(input.clone());
    for (index, layer) in layers.iter().enumerate() {
        let mut z = layer.affine(&activations[index]);
        if index == last {
            softmax_rows(&mut z);
        } else {
            z.mapv_inplace(|value| value.max(0.0));
        }
        activations.push(z);
    }
    let probabilities = &activations[layers.len()];

    let mut loss = 0.0f32;
    for (probability, target) in probabilities.iter().zip(targets.iter()) {
        if *target > 0.0 {
            loss -= probability.max(1e-12).ln() * target;
        }
    }
    loss /= sample_count;
    let mut penalty = 0.0f32;
    for layer in layers {
        penalty += layer.weights.iter().map(|w| w * w).sum::<f32>();
    }
    loss += alpha * penalty / (2.0 * sample_count);

    let mut grad_weights = Vec::with_capacity(layers.len());
    let mut grad_biases = Vec::with_capacity(layers.len());
    let mut delta = (probabilities - targets) / sample_count;
    for index in (0..layers.len()).rev() {
        let gw = activations[index].t().dot(&delta)
            + &layers[index].weights * (alpha / sample_count);
        let gb = delta.sum_axis(Axis(0));
        if index > 0 {
            let mut next_delta = delta.dot(&layers[index].weights.t());
            next_delta.zip_mut_with(&activations[index], |d, a| {
                if *a <= 0.0 {
                    *d = 0.0;
                }
            });
            delta = next_delta;
        }
        grad_weights.push(gw);
        grad_biases.push(gb);
    }
    grad_weights.reverse();
    grad_biases.reverse();

    (
        loss,
        Gradients {
            weights: grad_weights,
            biases: grad_biases,
        },
    )
}

struct OptimizerState {
    solver: Solver,
    step: i32,
    m_weights: Vec<Array2<f32>>,
    v_weights: Vec<Array2<f32>>,
    m_biases: Vec<Array1<f32>>,
    v_biases: Vec<Array1<f32>>,
}

impl OptimizerState {
    fn new(solver: Solver, layers: &[DenseLayer]) -> Self {
        Self {
            solver,
            step: 0,
            m_weights: layers.iter().map(|l| Array2::zeros(l.weights.dim())).collect(),
            v_weights: layers.iter().map(|l| Array2::zeros(l.weights.dim())).collect(),
            m_biases: layers.iter().map(|l| Array1::zeros(l.bias.len())).collect(),
            v_biases: layers.iter().map(|l| Array1::zeros(l.bias.len())).collect(),
        }
    }

    fn apply(&mut self, layers: &mut [DenseLayer], gradients: &Gradients, learning_rate: f32) {
        match self.solver {
            Solver::Sgd => {
                for (index, layer) in layers.iter_mut().enumerate() {
                    layer.weights = &layer.weights - &(&gradients.weights[index] * learning_rate);
                    layer.bias = &layer.bias - &(&gradients.biases[index] * learning_rate);
                }
            }
            Solver::Adam => {
                self.step += 1;
                let m_correction = 1.0 - BETA1.powi(self.step);
                let v_correction = 1.0 - BETA2.powi(self.step);
                for (index, layer) in layers.iter_mut().enumerate() {
                    let gw = &gradients.weights[index];
                    self.m_weights[index] =
                        &self.m_weights[index] * BETA1 + &(gw * (1.0 - BETA1));
                    self.v_weights[index] =
                        &self.v_weights[index] * BETA2 + &(gw.mapv(|g| g * g) * (1.0 - BETA2));
                    let m_hat = &self.m_weights[index] / m_correction;
                    let v_hat = &self.v_weights[index] / v_correction;
                    let denominator = v_hat.mapv(f32::sqrt) + EPSILON;
                    layer.weights = &layer.weights - &((m_hat / denominator) * learning_rate);

                    let gb = &gradients.biases[index];
                    self.m_biases[index] = &self.m_biases[index] * BETA1 + &(gb * (1.0 - BETA1));
                    self.v_biases[index] =
                        &self.v_biases[index] * BETA2 + &(gb.mapv(|g| g * g) * (1.0 - BETA2));
                    let m_hat = &self.m_biases[index] / m_correction;
                    let v_hat = &self.v_biases[index] / v_correction;
                    let denominator = v_hat.mapv(f32::sqrt) + EPSILON;
                    layer.bias = &layer.bias - &((m_hat / denominator) * learning_rate);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_data() -> (Vec<Vec<f32>>, Vec<u32>) {
        let features = vec![
            vec![1.0, 1.0],
            vec![1.2, 0.8],
            vec![0.9, 1.1],
            vec![-1.0, -1.0],
            vec![-1.1, -0.9],
            vec![-0.8, -1.2],
        ];
        let labels = vec![1, 1, 1, 0, 0, 0];
        (features, labels)
    }

    #[test]
    fn training_reduces_loss() {
        let (features, labels) = blob_data();
        let trainer = Trainer::new(MlpConfig {
            hidden_layers: vec![6],
            max_iter: 150,
            learning_rate: 0.05,
            seed: 3,
            ..MlpConfig::default()
        });
        let (_, summary) = trainer.fit(&features, &labels).unwrap();
        assert!(summary.final_loss < summary.loss_curve[0]);
        assert_eq!(summary.iterations, summary.loss_curve.len());
    }

    #[test]
    fn classes_are_sorted_and_deduplicated() {
        let (features, _) = blob_data();
        let labels = vec![9, 9, 9, 2, 2, 2];
        let trainer = Trainer::new(MlpConfig {
            hidden_layers: vec![4],
            max_iter: 20,
            seed: 1,
            ..MlpConfig::default()
        });
        let (model, _) = trainer.fit(&features, &labels).unwrap();
        assert_eq!(model.classes, vec![2, 9]);
    }

    #[test]
    fn sgd_solver_also_learns() {
        let (features, labels) = blob_data();
        let trainer = Trainer::new(MlpConfig {
            hidden_layers: vec![6],
            max_iter: 600,
            learning_rate: 0.2,
            solver: Solver::Sgd,
            tol: 1e-7,
            seed: 11,
            ..MlpConfig::default()
        });
        let (model, _) = trainer.fit(&features, &labels).unwrap();
        let predicted = model.predict(&features).unwrap();
        assert_eq!(predicted, labels);
    }

    #[test]
    fn zero_budget_yields_unconverged_summary() {
        let (features, labels) = blob_data();
        let trainer = Trainer::new(MlpConfig {
            hidden_layers: vec![4],
            max_iter: 0,
            seed: 1,
            ..MlpConfig::default()
        });
        let (model, summary) = trainer.fit(&features, &labels).unwrap();
        assert_eq!(summary.iterations, 0);
        assert!(!summary.converged);
        // The partially-optimized (here: freshly initialized) model is still usable.
        assert_eq!(model.predict(&features).unwrap().len(), features.len());
    }
}
