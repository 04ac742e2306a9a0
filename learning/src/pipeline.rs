use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::{JsonLogger, LogLevel};
use uuid::Uuid;

use crate::{
    dataset::{self, CsvOptions},
    metrics::EvaluationReport,
    mlp::{MlpClassifier, MlpConfig},
    scaler::{StandardScaler, ZeroVariancePolicy},
    store::{ArtifactEnvelope, ArtifactKind, ModelStore},
};

/// Configuration for an end-to-end training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Tabular-source options shared by the train and test files.
    pub csv: CsvOptions,
    /// Zero-variance handling for the scaler.
    pub scaler_policy: ZeroVariancePolicy,
    /// Classifier hyperparameters.
    pub mlp: MlpConfig,
    /// Holdout fraction used when no test file is supplied.
    pub holdout_ratio: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            csv: CsvOptions::default(),
            scaler_policy: ZeroVariancePolicy::default(),
            mlp: MlpConfig::default(),
            holdout_ratio: 0.2,
        }
    }
}

/// Report produced by a completed training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Run identifier shared by the persisted artifact pair.
    pub run_id: Uuid,
    /// Name the artifacts were stored under.
    pub model_name: String,
    /// Held-out accuracy.
    pub accuracy: f32,
    /// Training samples used.
    pub train_samples: usize,
    /// Held-out samples evaluated.
    pub test_samples: usize,
    /// Optimizer iterations executed.
    pub iterations: usize,
    /// Whether training converged within the iteration budget.
    pub converged: bool,
}

impl TrainingReport {
    /// Renders a concise single-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "[train] model={} accuracy={:.4} train={} test={} iterations={} converged={}",
            self.model_name,
            self.accuracy,
            self.train_samples,
            self.test_samples,
            self.iterations,
            self.converged
        )
    }
}

/// End-to-end training orchestrator: load, scale, fit, evaluate, persist.
#[derive(Debug)]
pub struct TrainingPipeline {
    config: PipelineConfig,
    store: ModelStore,
}

impl TrainingPipeline {
    /// Creates a pipeline writing artifacts to the given store.
    #[must_use]
    pub fn new(config: PipelineConfig, store: ModelStore) -> Self {
        Self { config, store }
    }

    /// Runs training without telemetry.
    pub fn run(
        &self,
        train_path: &Path,
        test_path: Option<&Path>,
        model_name: &str,
    ) -> anyhow::Result<TrainingReport> {
        self.run_with_logger(train_path, test_path, model_name, None)
    }

    /// Runs training, emitting structured progress records when a logger is supplied.
    ///
    /// The scaler fitted on the training partition is applied unchanged to
    /// the held-out partition; the persisted pair shares one fresh `run_id`.
    pub fn run_with_logger(
        &self,
        train_path: &Path,
        test_path: Option<&Path>,
        model_name: &str,
        logger: Option<&JsonLogger>,
    ) -> anyhow::Result<TrainingReport> {
        let loaded = dataset::load_csv(train_path, &self.config.csv)
            .with_context(|| format!("loading training data {}", train_path.display()))?;
        let (train, test) = match test_path {
            Some(path) => {
                let test = dataset::load_csv(path, &self.config.csv)
                    .with_context(|| format!("loading test data {}", path.display()))?;
                (loaded, test)
            }
            None => dataset::train_test_split(&loaded, self.config.holdout_ratio),
        };
        anyhow::ensure!(!train.is_empty(), "training dataset is empty");
        log(
            logger,
            LogLevel::Info,
            "standardize",
            json!({
                "train_samples": train.len(),
                "test_samples": test.len(),
                "feature_dim": train.feature_dim(),
            }),
        );

        let (train_features, train_labels) = train.features_labels();
        let (test_features, test_labels) = test.features_labels();
        let scaler = StandardScaler::fit(&train_features, self.config.scaler_policy)?;
        let scaled_train = scaler.transform_batch(&train_features)?;
        let scaled_test = scaler.transform_batch(&test_features)?;

        log(
            logger,
            LogLevel::Info,
            "training_start",
            json!({
                "hidden_layers": self.config.mlp.hidden_layers,
                "max_iter": self.config.mlp.max_iter,
                "solver": self.config.mlp.solver,
                "seed": self.config.mlp.seed,
            }),
        );
        let mut classifier = MlpClassifier::new(self.config.mlp.clone());
        let summary = classifier.fit(&scaled_train, &train_labels)?;
        if !summary.converged {
            log(
                logger,
                LogLevel::Warn,
                "max_iter_reached",
                json!({
                    "iterations": summary.iterations,
                    "final_loss": summary.final_loss,
                }),
            );
        }

        let predicted = classifier.predict(&scaled_test)?;
        let evaluation = EvaluationReport::from_labels(&predicted, &test_labels)?;
        log(
            logger,
            LogLevel::Info,
            "training_complete",
            json!({
                "accuracy": evaluation.accuracy,
                "iterations": summary.iterations,
                "final_loss": summary.final_loss,
            }),
        );

        let run_id = Uuid::new_v4();
        let model = classifier.into_model()?;
        self.store.save(
            &ModelStore::model_blob(model_name),
            &ArtifactEnvelope::new(run_id, ArtifactKind::Model, model),
        )?;
        self.store.save(
            &ModelStore::scaler_blob(model_name),
            &ArtifactEnvelope::new(run_id, ArtifactKind::Scaler, scaler),
        )?;

        Ok(TrainingReport {
            run_id,
            model_name: model_name.to_string(),
            accuracy: evaluation.accuracy,
            train_samples: train.len(),
            test_samples: test.len(),
            iterations: summary.iterations,
            converged: summary.converged,
        })
    }
}

fn log(logger: Option<&JsonLogger>, level: LogLevel, message: &str, fields: serde_json::Value) {
    if let Some(logger) = logger {
        let _ = logger.emit("pipeline", level, message, fields);
    }
}
