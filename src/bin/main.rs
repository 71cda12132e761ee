//! RSRVM Command Line Interface
//!
//! A command-line interface for training, evaluating, and using relevance
//! vector regression models with LibSVM and CSV data formats.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info, warn};
use rsrvm::api::{quick, RegressionMetrics, RVR};
use rsrvm::core::{Prediction, RVMError, Result};
use rsrvm::kernel::{Gamma, KernelType};
use rsrvm::persistence::SerializableModel;
use rsrvm::{CSVDataset, Dataset, LibSVMDataset, RelevanceVectorMachine};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "rsrvm")]
#[command(about = "A Rust implementation of Relevance Vector Regression")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "RSRVM Contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new RVR model
    Train(TrainArgs),
    /// Make predictions using a trained model
    Predict(PredictArgs),
    /// Evaluate a model on test data
    Evaluate(EvaluateArgs),
    /// Display model information
    Info(InfoArgs),
    /// Quick operations without model saving
    Quick(QuickArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliKernel {
    /// <x, y>
    Linear,
    /// (gamma <x, y> + coef0)^degree
    Poly,
    /// exp(-gamma ||x - y||^2)
    Rbf,
    /// tanh(gamma <x, y> + coef0)
    Sigmoid,
}

impl From<CliKernel> for KernelType {
    fn from(kernel: CliKernel) -> Self {
        match kernel {
            CliKernel::Linear => KernelType::Linear,
            CliKernel::Poly => KernelType::Polynomial,
            CliKernel::Rbf => KernelType::Rbf,
            CliKernel::Sigmoid => KernelType::Sigmoid,
        }
    }
}

#[derive(Args)]
struct KernelArgs {
    /// Kernel function
    #[arg(short, long, value_enum, default_value = "rbf")]
    kernel: CliKernel,

    /// Kernel coefficient: auto, scale, or a positive number
    #[arg(short, long, default_value = "auto")]
    gamma: Gamma,

    /// Degree of the polynomial kernel
    #[arg(long, default_value = "3")]
    degree: u32,

    /// Independent term of the poly and sigmoid kernels
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    coef0: f64,
}

#[derive(Args)]
struct TrainArgs {
    /// Training data file (LibSVM or CSV format)
    #[arg(long)]
    data: PathBuf,

    /// Output model file
    #[arg(short, long)]
    output: PathBuf,

    /// Data format: auto, libsvm, or csv
    #[arg(short, long, default_value = "auto")]
    format: String,

    #[command(flatten)]
    kernel: KernelArgs,

    /// Convergence tolerance on the log-precision change
    #[arg(short, long, default_value = "1e-6")]
    tol: f64,

    /// Bases with precision at or above this are pruned
    #[arg(long, default_value = "1e5")]
    threshold_alpha: f64,

    /// Maximum iterations
    #[arg(short, long, default_value = "5000")]
    max_iterations: usize,
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Input data file
    #[arg(long)]
    data: PathBuf,

    /// Output predictions file (optional, prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Data format: auto, libsvm, or csv
    #[arg(short, long, default_value = "auto")]
    format: String,

    /// Also output the predictive standard deviation
    #[arg(long)]
    std: bool,
}

#[derive(Args)]
struct EvaluateArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Test data file
    #[arg(long)]
    data: PathBuf,

    /// Data format: auto, libsvm, or csv
    #[arg(short, long, default_value = "auto")]
    format: String,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,
}

#[derive(Args)]
struct QuickArgs {
    #[command(subcommand)]
    operation: QuickOperation,
}

#[derive(Subcommand)]
enum QuickOperation {
    /// Quick train and evaluate with train/test split
    Eval {
        /// Training data file
        train: PathBuf,
        /// Test data file
        test: PathBuf,
    },
    /// Hold-out validation on a single dataset
    Cv {
        /// Data file
        data: PathBuf,
        /// Training ratio (0.0-1.0)
        #[arg(short, long, default_value = "0.8")]
        ratio: f64,
        /// Kernel coefficient: auto, scale, or a positive number
        #[arg(short, long, default_value = "auto")]
        gamma: Gamma,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args, cli.verbose),
        Commands::Predict(args) => predict_command(args),
        Commands::Evaluate(args) => evaluate_command(args),
        Commands::Info(args) => info_command(args),
        Commands::Quick(args) => quick_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn train_command(args: TrainArgs, verbose: bool) -> Result<()> {
    info!("Training RVR model...");
    info!("Data file: {:?}", args.data);
    info!(
        "Parameters: kernel={:?}, gamma={}, tol={}, threshold_alpha={}, max_iter={}",
        args.kernel.kernel,
        args.kernel.gamma,
        args.tol,
        args.threshold_alpha,
        args.max_iterations
    );

    let format = resolve_format(&args.format, &args.data);
    info!("Loading dataset as {format} format");

    // Process different formats separately to avoid trait object issues
    match format.as_str() {
        "libsvm" => {
            let dataset = LibSVMDataset::from_file(&args.data)?;
            train_with_dataset(&args, verbose, dataset)
        }
        "csv" => {
            let dataset = CSVDataset::from_file(&args.data)?;
            train_with_dataset(&args, verbose, dataset)
        }
        _ => Err(unsupported_format(&format)),
    }
}

fn train_with_dataset<D: Dataset>(args: &TrainArgs, verbose: bool, dataset: D) -> Result<()> {
    info!(
        "Loaded {} samples with {} dimensions",
        dataset.len(),
        dataset.dim()
    );

    let mut rvr = RVR::new()
        .with_kernel(args.kernel.kernel.into())
        .with_gamma(args.kernel.gamma)
        .with_degree(args.kernel.degree)
        .with_coef0(args.kernel.coef0)
        .with_tol(args.tol)
        .with_threshold_alpha(args.threshold_alpha)
        .with_max_iterations(args.max_iterations)
        .with_verbose(verbose);

    let summary = rvr.fit_dataset(&dataset)?;
    if summary.converged {
        info!("Training converged after {} iterations", summary.iterations);
    } else {
        warn!(
            "Training stopped after {} iterations without converging",
            summary.iterations
        );
    }

    let info = rvr.info()?;
    info!("Relevance vectors: {}", info.n_relevance_vectors);
    info!("Noise variance: {:.6e}", info.noise_variance);

    // Save model
    let serializable = SerializableModel::from_trained_model(rvr.model()?, rvr.config());
    serializable.save_to_file(&args.output)?;
    info!("Model saved to: {:?}", args.output);

    // Quick evaluation on training data
    let metrics = rvr.evaluate(&dataset)?;
    info!(
        "Training RMSE: {:.6}, R^2: {:.4}",
        metrics.rmse, metrics.r2
    );

    Ok(())
}

fn load_model(path: &Path) -> Result<(SerializableModel, RVR)> {
    info!("Loading model from: {path:?}");
    let serializable_model = SerializableModel::load_from_file(path)?;
    let model = serializable_model.to_trained_model()?;
    Ok((serializable_model, RVR::from_model(model)))
}

fn predict_command(args: PredictArgs) -> Result<()> {
    let (serializable_model, rvr) = load_model(&args.model)?;

    info!("Loading prediction data from: {:?}", args.data);
    let format = resolve_format(&args.format, &args.data);

    info!(
        "Making predictions using model with {} relevance vectors",
        serializable_model.metadata.n_relevance_vectors
    );

    let predictions = match format.as_str() {
        "libsvm" => {
            let dataset = LibSVMDataset::from_file(&args.data)?;
            rvr.predict_dataset(&dataset, args.std)?
        }
        "csv" => {
            let dataset = CSVDataset::from_file(&args.data)?;
            rvr.predict_dataset(&dataset, args.std)?
        }
        _ => return Err(unsupported_format(&format)),
    };

    if let Some(output_path) = args.output {
        let file = File::create(&output_path).map_err(RVMError::IoError)?;
        write_predictions(BufWriter::new(file), &predictions, args.std)?;
        info!("Predictions saved to: {output_path:?}");
    } else {
        write_predictions(io::stdout().lock(), &predictions, args.std)?;
    }

    Ok(())
}

fn write_predictions<W: Write>(mut writer: W, predictions: &[Prediction], std: bool) -> Result<()> {
    writeln!(writer, "# Predictions for {} samples", predictions.len())?;
    writeln!(
        writer,
        "# Format: sample_index predicted_mean{}",
        if std { " predicted_std" } else { "" }
    )?;

    for (i, pred) in predictions.iter().enumerate() {
        match pred.std {
            Some(s) if std => writeln!(writer, "{} {:.6} {:.6}", i, pred.mean, s)?,
            _ => writeln!(writer, "{} {:.6}", i, pred.mean)?,
        }
    }

    writer.flush()?;
    Ok(())
}

fn evaluate_command(args: EvaluateArgs) -> Result<()> {
    let (serializable_model, rvr) = load_model(&args.model)?;

    info!("Loading test data from: {:?}", args.data);
    let format = resolve_format(&args.format, &args.data);

    info!(
        "Evaluating model with {} relevance vectors",
        serializable_model.metadata.n_relevance_vectors
    );

    let metrics = match format.as_str() {
        "libsvm" => rvr.evaluate(&LibSVMDataset::from_file(&args.data)?)?,
        "csv" => rvr.evaluate(&CSVDataset::from_file(&args.data)?)?,
        _ => return Err(unsupported_format(&format)),
    };

    println!("=== Model Evaluation ===");
    serializable_model.print_summary();

    println!("\nTest Results:");
    print_metrics(&metrics);

    Ok(())
}

fn print_metrics(metrics: &RegressionMetrics) {
    println!("  Samples: {}", metrics.n_samples);
    println!("  MSE:     {:.6}", metrics.mse);
    println!("  RMSE:    {:.6}", metrics.rmse);
    println!("  MAE:     {:.6}", metrics.mae);
    println!("  R^2:     {:.4}", metrics.r2);
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let serializable_model = SerializableModel::load_from_file(&args.model)?;

    serializable_model.print_summary();

    println!("\nRelevance Vector Details:");
    println!("  Total: {}", serializable_model.relevance_vectors.len());

    let indices: Vec<usize> = serializable_model
        .relevance_vectors
        .iter()
        .map(|rv| rv.training_index)
        .collect();
    let n_show = indices.len().min(10);
    if n_show > 0 {
        println!("  Training indices: {:?}", &indices[..n_show]);
        if indices.len() > n_show {
            println!("    ... ({} more)", indices.len() - n_show);
        }
    }

    println!("\nWeights:");
    let mut weights = serializable_model.mean.iter();
    if serializable_model.metadata.includes_bias {
        if let Some(bias) = weights.next() {
            println!("  bias: {bias:.6}");
        }
    }
    for (index, w) in indices.iter().zip(weights).take(10) {
        println!("  w[{index}]: {w:.6}");
    }
    if indices.len() > 10 {
        println!("  ... ({} more)", indices.len() - 10);
    }

    Ok(())
}

fn quick_command(args: QuickArgs) -> Result<()> {
    match args.operation {
        QuickOperation::Eval { train, test } => {
            info!("Quick evaluation: train on {train:?}, test on {test:?}");

            let metrics = quick::evaluate_split(&train, &test)?;

            println!("=== Quick Evaluation Results ===");
            println!("Training file: {train:?}");
            println!("Test file: {test:?}");
            print_metrics(&metrics);

            Ok(())
        }
        QuickOperation::Cv { data, ratio, gamma } => {
            info!("Hold-out validation on {data:?} with ratio {ratio}");

            let format = detect_format(&data);
            let metrics = match format.as_str() {
                "libsvm" => {
                    quick::simple_validation(&LibSVMDataset::from_file(&data)?, ratio, gamma)?
                }
                "csv" => quick::simple_validation(&CSVDataset::from_file(&data)?, ratio, gamma)?,
                _ => return Err(unsupported_format(&format)),
            };

            println!("=== Hold-out Validation Results ===");
            println!("Data file: {data:?}");
            println!("Train/test ratio: {ratio:.1}/{:.1}", 1.0 - ratio);
            println!("Gamma: {gamma}");
            print_metrics(&metrics);

            Ok(())
        }
    }
}

fn unsupported_format(format: &str) -> RVMError {
    RVMError::InvalidParameter(format!(
        "Unsupported format: {format}. Use 'libsvm' or 'csv'"
    ))
}

fn resolve_format(format: &str, path: &Path) -> String {
    if format == "auto" {
        detect_format(path)
    } else {
        format.to_string()
    }
}

fn detect_format(path: &Path) -> String {
    if let Some(ext) = path.extension() {
        match ext.to_str() {
            Some("csv") => "csv".to_string(),
            Some("libsvm") | Some("svm") => "libsvm".to_string(),
            _ => {
                warn!("Unknown file extension, assuming LibSVM format");
                "libsvm".to_string()
            }
        }
    } else {
        warn!("No file extension, assuming LibSVM format");
        "libsvm".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(detect_format(&PathBuf::from("test.csv")), "csv");
        assert_eq!(detect_format(&PathBuf::from("test.libsvm")), "libsvm");
        assert_eq!(detect_format(&PathBuf::from("test.svm")), "libsvm");
        assert_eq!(detect_format(&PathBuf::from("test")), "libsvm");
        assert_eq!(resolve_format("csv", Path::new("test.libsvm")), "csv");
    }

    #[test]
    fn test_kernel_mapping() {
        assert_eq!(KernelType::from(CliKernel::Poly).name(), "poly");
        assert_eq!(KernelType::from(CliKernel::Rbf).name(), "rbf");
    }

    #[test]
    fn test_write_predictions() {
        let predictions = vec![Prediction::with_std(1.5, 0.25), Prediction::new(-2.0)];
        let mut buffer = Vec::new();
        write_predictions(&mut buffer, &predictions, true).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("0 1.500000 0.250000"));
        assert!(text.contains("1 -2.000000"));
    }

    #[test]
    fn test_cli_parses_gamma() {
        let cli = Cli::try_parse_from([
            "rsrvm", "train", "--data", "d.csv", "--output", "m.json", "--gamma", "scale",
        ])
        .unwrap();
        match cli.command {
            Commands::Train(args) => assert_eq!(args.kernel.gamma, Gamma::Scale),
            _ => panic!("expected train command"),
        }
    }
}
