use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use safeclick_io::{
    DEFAULT_LABEL_COLUMN, Dataset, DatasetReader, ExperimentName, FeatureSchema, ResultWriter,
};
use safeclick_trees::{
    Classifier, ConfusionMatrix, CrossValidation, DecisionTree, EnsembleSpec, FORMAT_VERSION,
    GradientBoostingConfig, MaxFeatures, Model, RandomForestConfig,
};

#[derive(Parser)]
#[command(name = "safeclick")]
#[command(about = "Phishing URL classification with decision tree ensembles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Ensemble hyperparameters shared by `train` and `evaluate`.
#[derive(Args, Debug, Clone)]
struct EnsembleArgs {
    /// Ensemble kind: "forest" or "boosted"
    #[arg(long, default_value = "forest")]
    kind: String,

    /// Number of trees (forest) or boosting rounds
    #[arg(long, default_value_t = 300)]
    n_estimators: usize,

    /// Maximum tree depth
    #[arg(long, default_value_t = 10)]
    max_depth: usize,

    /// Features per forest tree: "sqrt", "log2", or "all"
    #[arg(long, default_value = "sqrt")]
    max_features: String,

    /// Boosting learning rate
    #[arg(long, default_value_t = 0.01)]
    learning_rate: f64,
}

/// How to read a dataset CSV.
#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Path to the input CSV file
    #[arg(long)]
    data: PathBuf,

    /// Name of the 0/1 label column
    #[arg(long, default_value = DEFAULT_LABEL_COLUMN)]
    label_column: String,

    /// Column holding sample identifiers (row index if unset)
    #[arg(long)]
    id_column: Option<String>,

    /// Use every non-label, non-id column instead of the 37 URL features
    #[arg(long, default_value_t = false)]
    all_columns: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Train an ensemble on a labelled CSV and save the model
    Train {
        #[command(flatten)]
        input: DataArgs,

        #[command(flatten)]
        ensemble: EnsembleArgs,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Estimate ensemble accuracy with stratified k-fold cross-validation
    Evaluate {
        #[command(flatten)]
        input: DataArgs,

        #[command(flatten)]
        ensemble: EnsembleArgs,

        /// Number of cross-validation folds
        #[arg(long, default_value_t = 5)]
        cv_folds: usize,

        /// Experiment name for output files
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Classify URLs with a trained model
    Predict {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        /// Path to the feature CSV file
        #[arg(long)]
        data: PathBuf,

        /// Column holding sample identifiers (row index if unset)
        #[arg(long)]
        id_column: Option<String>,

        /// Experiment name for output files
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Describe a trained model
    Inspect {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    experiment: String,
    kind: String,
    model_path: PathBuf,
    n_samples: usize,
    n_features: usize,
    n_trees: usize,
    training_accuracy: f64,
}

#[derive(Serialize)]
struct EvaluateOutput {
    experiment: String,
    kind: String,
    n_samples: usize,
    n_features: usize,
    n_folds: usize,
    cv_mean_accuracy: f64,
    cv_std_accuracy: f64,
}

#[derive(Serialize)]
struct PredictOutput {
    experiment: String,
    model_kind: String,
    n_samples: usize,
    n_safe: usize,
    n_unsafe: usize,
    accuracy: Option<f64>,
}

#[derive(Serialize)]
struct InspectOutput {
    kind: String,
    format_version: u32,
    n_estimators: usize,
    n_features: usize,
    feature_names: Vec<String>,
    max_features: Option<usize>,
    initial_bias: Option<f64>,
    learning_rate: Option<f64>,
    trees: Vec<TreeOutput>,
}

#[derive(Serialize)]
struct TreeOutput {
    depth: usize,
    n_nodes: usize,
    n_leaves: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    feature_indices: Option<Vec<usize>>,
}

impl TreeOutput {
    fn new(tree: &DecisionTree, feature_indices: Option<&[usize]>) -> Self {
        Self {
            depth: tree.depth(),
            n_nodes: tree.n_nodes(),
            n_leaves: tree.n_leaves(),
            feature_indices: feature_indices.map(<[usize]>::to_vec),
        }
    }
}

fn parse_max_features(s: &str) -> Result<MaxFeatures> {
    match s {
        "sqrt" => Ok(MaxFeatures::Sqrt),
        "log2" => Ok(MaxFeatures::Log2),
        "all" => Ok(MaxFeatures::All),
        other => anyhow::bail!("unknown max features: {other} (expected sqrt, log2, or all)"),
    }
}

fn build_spec(args: &EnsembleArgs, seed: u64) -> Result<EnsembleSpec> {
    match args.kind.as_str() {
        "forest" => Ok(EnsembleSpec::Forest(
            RandomForestConfig::new(args.n_estimators)?
                .with_max_features(parse_max_features(&args.max_features)?)
                .with_max_depth(args.max_depth)
                .with_seed(seed),
        )),
        "boosted" => Ok(EnsembleSpec::Boosted(
            GradientBoostingConfig::new(args.n_estimators)
                .with_learning_rate(args.learning_rate)
                .with_max_depth(args.max_depth),
        )),
        other => anyhow::bail!("unknown ensemble kind: {other} (expected forest or boosted)"),
    }
}

fn read_dataset(args: &DataArgs) -> Result<Dataset> {
    let mut reader = DatasetReader::new(&args.data).with_label_column(args.label_column.as_str());
    if let Some(id) = &args.id_column {
        reader = reader.with_id_column(id.as_str());
    }
    if !args.all_columns {
        reader = reader.with_schema(FeatureSchema::url_features());
    }
    reader.read().context("failed to read input CSV")
}

fn require_labels(dataset: &Dataset) -> Result<&[usize]> {
    dataset
        .labels()
        .context("input CSV has no label column")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            input,
            ensemble,
            experiment,
            output_dir,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let spec = build_spec(&ensemble, cli.seed)?;

            // 1. Read labelled dataset
            let dataset = read_dataset(&input)?;
            let labels = require_labels(&dataset)?;

            // 2. Fit on all rows
            let model = spec
                .fit(dataset.features(), labels, dataset.feature_names())
                .context("training failed")?;
            let training_accuracy = model
                .score(dataset.features(), labels)
                .context("scoring training data failed")?;
            info!(kind = %model.kind(), training_accuracy, "model trained");

            // 3. Save model
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            let model_path = writer.model_path();
            model.save(&model_path).context("failed to save model")?;

            // 4. Print summary
            let output = TrainOutput {
                experiment,
                kind: model.kind().to_string(),
                model_path,
                n_samples: dataset.n_samples(),
                n_features: model.n_features(),
                n_trees: model.n_estimators(),
                training_accuracy,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Evaluate {
            input,
            ensemble,
            cv_folds,
            experiment,
            output_dir,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let spec = build_spec(&ensemble, cli.seed)?;

            // 1. Read labelled dataset
            let dataset = read_dataset(&input)?;
            let labels = require_labels(&dataset)?;

            // 2. Cross-validate
            let cv = CrossValidation::new(cv_folds)?.with_seed(cli.seed);
            let cv_result = cv
                .evaluate(&spec, dataset.features(), labels, dataset.feature_names())
                .context("cross-validation failed")?;

            // 3. Write evaluation JSON
            let class_metrics: Vec<(f64, f64, f64, usize)> = cv_result
                .confusion_matrix
                .class_metrics()
                .iter()
                .map(|m| (m.precision, m.recall, m.f1, m.support))
                .collect();
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            writer.write_evaluation(
                &cv_result.kind.to_string(),
                cv_result.n_samples,
                cv_result.n_features,
                &cv_result.fold_accuracies,
                cv_result.mean_accuracy,
                cv_result.std_accuracy,
                cv_result.confusion_matrix.as_rows(),
                &class_metrics,
            )?;

            // 4. Print summary
            let output = EvaluateOutput {
                experiment,
                kind: cv_result.kind.to_string(),
                n_samples: cv_result.n_samples,
                n_features: cv_result.n_features,
                n_folds: cv_result.n_folds,
                cv_mean_accuracy: cv_result.mean_accuracy,
                cv_std_accuracy: cv_result.std_accuracy,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            model,
            data,
            id_column,
            experiment,
            output_dir,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;

            // 1. Load model
            let model = Model::load(&model).context("failed to load model")?;

            // 2. Read features in the model's training column order
            let schema = if model.feature_names().is_empty() {
                FeatureSchema::url_features()
            } else {
                FeatureSchema::new(model.feature_names().to_vec())
            };
            let mut reader = DatasetReader::new(&data).with_schema(schema);
            if let Some(id) = id_column {
                reader = reader.with_id_column(id);
            }
            let dataset = reader.read().context("failed to read input CSV")?;

            // 3. Predict
            let predicted = model
                .predict_batch(dataset.features())
                .context("prediction failed")?;
            let probabilities: Vec<f64> = model
                .predict_proba_batch(dataset.features())
                .context("prediction failed")?
                .iter()
                .map(|p| p.positive())
                .collect();

            // Labelled serving files also report accuracy
            let accuracy = match dataset.labels() {
                Some(labels) => Some(ConfusionMatrix::from_labels(labels, &predicted)?.accuracy()),
                None => None,
            };

            // 4. Write predictions JSON
            let kind = model.kind().to_string();
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            writer.write_predictions(&kind, dataset.ids(), &predicted, Some(&probabilities))?;

            // 5. Print summary
            let n_safe = predicted.iter().filter(|&&label| label == 1).count();
            let output = PredictOutput {
                experiment,
                model_kind: kind,
                n_samples: dataset.n_samples(),
                n_safe,
                n_unsafe: predicted.len() - n_safe,
                accuracy,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Inspect { model } => {
            let model = Model::load(&model).context("failed to load model")?;

            let (max_features, initial_bias, learning_rate, trees) = match &model {
                Model::Tree(tree) => (None, None, None, vec![TreeOutput::new(tree, None)]),
                Model::Forest(forest) => (
                    Some(forest.max_features()),
                    None,
                    None,
                    forest
                        .members()
                        .iter()
                        .map(|m| TreeOutput::new(m.tree(), Some(m.feature_indices())))
                        .collect(),
                ),
                Model::Boosted(boosted) => (
                    None,
                    Some(boosted.initial_bias()),
                    Some(boosted.learning_rate()),
                    boosted.trees().iter().map(|t| TreeOutput::new(t, None)).collect(),
                ),
            };

            let output = InspectOutput {
                kind: model.kind().to_string(),
                format_version: FORMAT_VERSION,
                n_estimators: model.n_estimators(),
                n_features: model.n_features(),
                feature_names: model.feature_names().to_vec(),
                max_features,
                initial_bias,
                learning_rate,
                trees,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
