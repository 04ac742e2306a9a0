use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Local, Utc};
use clap::{Parser, Subcommand};
use inkline_learning::{
    CsvOptions, InferenceContext, LabelColumn, MlpConfig, ModelStore, PipelineConfig, Solver,
    TrainingPipeline, ZeroVariancePolicy,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::{JsonLogger, LogLevel};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "ink", version, about = "Handwritten-digit training and inference pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Trains a model and persists the artifact pair.
    Train(TrainArgs),
    /// Classifies one raw sample with a persisted model.
    Classify(ClassifyArgs),
    /// Lists most recent training runs.
    List {
        /// Number of entries to display.
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "logs/runs.jsonl")]
        manifest: PathBuf,
    },
    /// Shows the manifest entry for a given run id.
    Status {
        run_id: String,
        #[arg(long, default_value = "logs/runs.jsonl")]
        manifest: PathBuf,
    },
}

#[derive(Parser, Debug)]
struct TrainArgs {
    /// Training CSV path.
    #[arg(long)]
    train_data: PathBuf,
    /// Held-out CSV path; omitted means an in-memory split of the training file.
    #[arg(long)]
    test_data: Option<PathBuf>,
    /// Name the artifact pair is stored under.
    #[arg(long)]
    model: String,
    /// Header name of the label column; the default convention is label-first.
    #[arg(long)]
    label_column: Option<String>,
    /// Source files carry no header row.
    #[arg(long)]
    no_headers: bool,
    /// Comma-separated hidden layer widths.
    #[arg(long, default_value = "20,10")]
    hidden_layers: String,
    #[arg(long, default_value_t = 5000)]
    max_iter: usize,
    #[arg(long, default_value_t = 1e-4)]
    alpha: f32,
    #[arg(long, default_value_t = 1e-3)]
    learning_rate: f32,
    /// Optimizer: "sgd" or "adam".
    #[arg(long, default_value = "adam")]
    solver: String,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Holdout fraction used when --test-data is omitted.
    #[arg(long, default_value_t = 0.2)]
    holdout_ratio: f32,
    /// Reject zero-variance feature columns instead of passing them through.
    #[arg(long)]
    strict_variance: bool,
    #[arg(long, default_value = "models")]
    store_dir: PathBuf,
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
    #[arg(long, default_value = "logs/runs.jsonl")]
    manifest: PathBuf,
}

#[derive(Parser, Debug)]
struct ClassifyArgs {
    /// Model name to load.
    model: String,
    /// File with one comma-separated row of raw feature values.
    #[arg(long)]
    sample: Option<PathBuf>,
    /// Inline comma-separated raw feature values.
    #[arg(long)]
    values: Option<String>,
    #[arg(long, default_value = "models")]
    store_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct RunManifestEntry {
    run_id: String,
    submitted_at: DateTime<Utc>,
    model: String,
    train_data: PathBuf,
    test_data: Option<PathBuf>,
    log_path: PathBuf,
    status: String,
    accuracy: Option<f32>,
    artifact_run_id: Option<String>,
}

impl RunManifestEntry {
    fn new(args: &TrainArgs, log_path: PathBuf) -> Self {
        Self {
            run_id: format!("run-{}", Uuid::new_v4()),
            submitted_at: Utc::now(),
            model: args.model.clone(),
            train_data: args.train_data.clone(),
            test_data: args.test_data.clone(),
            log_path,
            status: "pending".into(),
            accuracy: None,
            artifact_run_id: None,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Train(args) => handle_train(args),
        Commands::Classify(args) => handle_classify(args),
        Commands::List { limit, manifest } => {
            let entries = read_manifest(&manifest)?;
            for entry in entries.into_iter().rev().take(limit) {
                println!(
                    "{} | {} | {} | {} | accuracy={}",
                    entry.run_id,
                    entry.model,
                    entry.status,
                    entry.submitted_at,
                    entry
                        .accuracy
                        .map_or_else(|| "-".into(), |value| format!("{value:.4}")),
                );
            }
            Ok(())
        }
        Commands::Status { run_id, manifest } => {
            let entries = read_manifest(&manifest)?;
            if let Some(entry) = entries.into_iter().find(|e| e.run_id == run_id) {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                println!("run {run_id} not found");
            }
            Ok(())
        }
    }
}

fn handle_train(args: TrainArgs) -> Result<()> {
    anyhow::ensure!(args.train_data.exists(), "training data {:?} not found", args.train_data);
    if let Some(test_data) = &args.test_data {
        anyhow::ensure!(test_data.exists(), "test data {:?} not found", test_data);
    }
    let hidden_layers = parse_hidden_layers(&args.hidden_layers)?;
    let solver = parse_solver(&args.solver)?;
    let label_column = args
        .label_column
        .clone()
        .map_or(LabelColumn::First, LabelColumn::Named);

    let config = PipelineConfig {
        csv: CsvOptions {
            label_column,
            has_headers: !args.no_headers,
        },
        scaler_policy: if args.strict_variance {
            ZeroVariancePolicy::Reject
        } else {
            ZeroVariancePolicy::PassThrough
        },
        mlp: MlpConfig {
            hidden_layers,
            max_iter: args.max_iter,
            alpha: args.alpha,
            learning_rate: args.learning_rate,
            solver,
            seed: args.seed,
            ..MlpConfig::default()
        },
        holdout_ratio: args.holdout_ratio,
    };

    let log_path = compute_log_path(&args.log_dir)?;
    let logger = JsonLogger::new(&log_path)?;
    let mut entry = RunManifestEntry::new(&args, log_path);
    entry.status = "queued".into();
    append_manifest(&args.manifest, &entry)?;
    logger.emit(
        "ink",
        LogLevel::Info,
        "run queued",
        json!({ "run_id": entry.run_id, "model": entry.model }),
    )?;

    update_manifest(&args.manifest, &entry.run_id, "running", None, None)?;
    let pipeline = TrainingPipeline::new(config, ModelStore::new(&args.store_dir));
    match pipeline.run_with_logger(
        &args.train_data,
        args.test_data.as_deref(),
        &args.model,
        Some(&logger),
    ) {
        Ok(report) => {
            update_manifest(
                &args.manifest,
                &entry.run_id,
                "completed",
                Some(report.accuracy),
                Some(report.run_id.to_string()),
            )?;
            logger.emit(
                "ink",
                LogLevel::Info,
                "run completed",
                json!({
                    "run_id": entry.run_id,
                    "artifact_run_id": report.run_id,
                    "accuracy": report.accuracy,
                }),
            )?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(err) => {
            update_manifest(&args.manifest, &entry.run_id, "failed", None, None)?;
            logger.emit(
                "ink",
                LogLevel::Error,
                "run failed",
                json!({ "run_id": entry.run_id, "error": err.to_string() }),
            )?;
            Err(err)
        }
    }
}

fn handle_classify(args: ClassifyArgs) -> Result<()> {
    let raw = match (&args.sample, &args.values) {
        (Some(path), None) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("reading sample {}", path.display()))?;
            parse_sample(&contents)?
        }
        (None, Some(values)) => parse_sample(values)?,
        _ => bail!("provide exactly one of --sample or --values"),
    };
    let store = ModelStore::new(&args.store_dir);
    let context = InferenceContext::load(&store, &args.model)?;
    let label = context.classify(&raw)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "model": args.model,
            "run_id": context.run_id(),
            "label": label,
        }))?
    );
    Ok(())
}

fn parse_hidden_layers(spec: &str) -> Result<Vec<usize>> {
    let layers: Vec<usize> = spec
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>()
                .with_context(|| format!("hidden layer width {part:?} is not a positive integer"))
        })
        .collect::<Result<_>>()?;
    anyhow::ensure!(!layers.is_empty(), "at least one hidden layer width required");
    anyhow::ensure!(
        layers.iter().all(|width| *width > 0),
        "hidden layer widths must be positive"
    );
    Ok(layers)
}

fn parse_solver(name: &str) -> Result<Solver> {
    match name.to_ascii_lowercase().as_str() {
        "sgd" => Ok(Solver::Sgd),
        "adam" => Ok(Solver::Adam),
        other => bail!("unknown solver {other:?}, expected \"sgd\" or \"adam\""),
    }
}

fn parse_sample(text: &str) -> Result<Vec<f32>> {
    let values: Vec<f32> = text
        .split(',')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(|cell| {
            cell.parse::<f32>()
                .with_context(|| format!("sample value {cell:?} is not numeric"))
        })
        .collect::<Result<_>>()?;
    anyhow::ensure!(!values.is_empty(), "sample holds no feature values");
    Ok(values)
}

fn compute_log_path(base: &Path) -> Result<PathBuf> {
    let now = Local::now();
    let dir = base
        .join(format!("{:04}", now.year()))
        .join(format!("{:02}", now.month()))
        .join(format!("{:02}", now.day()));
    fs::create_dir_all(&dir)?;
    Ok(dir.join(format!(
        "run-{}.log.jsonl",
        Utc::now().format("%Y%m%d-%H%M%S")
    )))
}

fn append_manifest(path: &Path, entry: &RunManifestEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening manifest {path:?}"))?;
    serde_json::to_writer(&mut file, entry)?;
    file.write_all(b"\n")?;
    Ok(())
}

fn read_manifest(path: &Path) -> Result<Vec<RunManifestEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: RunManifestEntry = serde_json::from_str(&line)?;
        entries.push(entry);
    }
    Ok(entries)
}

fn update_manifest(
    path: &Path,
    run_id: &str,
    status: &str,
    accuracy: Option<f32>,
    artifact_run_id: Option<String>,
) -> Result<()> {
    let mut entries = read_manifest(path)?;
    let mut changed = false;
    for entry in &mut entries {
        if entry.run_id == run_id {
            entry.status = status.to_string();
            if accuracy.is_some() {
                entry.accuracy = accuracy;
            }
            if artifact_run_id.is_some() {
                entry.artifact_run_id = artifact_run_id.clone();
            }
            changed = true;
        }
    }
    if !changed {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    for entry in entries {
        serde_json::to_writer(&mut file, &entry)?;
        file.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hidden_layer_spec() {
        assert_eq!(parse_hidden_layers("20,10").unwrap(), vec![20, 10]);
        assert_eq!(parse_hidden_layers(" 64 , 32 ").unwrap(), vec![64, 32]);
        assert!(parse_hidden_layers("20,zero").is_err());
        assert!(parse_hidden_layers("").is_err());
    }

    #[test]
    fn parses_solver_names() {
        assert_eq!(parse_solver("adam").unwrap(), Solver::Adam);
        assert_eq!(parse_solver("SGD").unwrap(), Solver::Sgd);
        assert!(parse_solver("lbfgs").is_err());
    }

    #[test]
    fn parses_sample_values() {
        assert_eq!(parse_sample("0, 1.5, 2\n").unwrap(), vec![0.0, 1.5, 2.0]);
        assert!(parse_sample("0,abc").is_err());
        assert!(parse_sample("").is_err());
    }
}
