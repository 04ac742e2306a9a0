#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Digit-classification training and serving pipeline: tabular dataset
//! loading, feature standardization, a feed-forward classifier, evaluation,
//! artifact persistence, and single-sample inference.

/// Tabular dataset loading and splitting.
pub mod dataset;
/// Single-sample inference over a persisted artifact pair.
pub mod infer;
/// Evaluation metrics.
pub mod metrics;
/// Feed-forward multilayer-perceptron classifier.
pub mod mlp;
/// End-to-end training orchestration.
pub mod pipeline;
/// Feature standardization.
pub mod scaler;
/// Durable name-keyed artifact persistence.
pub mod store;

pub use dataset::{load_csv, train_test_split, CsvOptions, Dataset, DatasetError, LabelColumn, Sample};
pub use infer::{InferenceContext, InferenceError};
pub use metrics::{accuracy, EvaluationReport, MetricsError};
pub use mlp::{MlpClassifier, MlpConfig, MlpError, MlpModel, Solver, TrainingSummary};
pub use pipeline::{PipelineConfig, TrainingPipeline, TrainingReport};
pub use scaler::{ScalerError, StandardScaler, ZeroVariancePolicy};
pub use store::{ArtifactEnvelope, ArtifactKind, ModelStore, StoreError};
