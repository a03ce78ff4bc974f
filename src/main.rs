use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use sapling::{
    PipelineConfig, PipelineReport, Prediction, SampleOutcome, Verification, VerifyError, predict,
};

#[derive(Parser)]
#[command(name = "sapling")]
#[command(about = "Fit decision trees on synthetic data and export them as verified ONNX artifacts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory the ONNX artifacts are written to
    #[arg(long, default_value = "trained", global = true)]
    output_dir: PathBuf,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate data, fit both trees, export and verify artifacts, run samples (default)
    Run,

    /// Predict one row with an exported artifact
    Predict {
        /// Path to the ONNX artifact
        #[arg(long)]
        model: PathBuf,

        /// Comma-separated feature values
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        features: Vec<f64>,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct RunOutput {
    output_dir: String,
    seed: u64,
    regression: TaskOutput,
    classification: TaskOutput,
    samples: Vec<SampleOutput>,
}

#[derive(Serialize)]
struct TaskOutput {
    artifact: String,
    n_train: usize,
    n_holdout: usize,
    metric: &'static str,
    score: f64,
    n_nodes: usize,
    depth: usize,
    verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_abs_diff: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification_error: Option<String>,
}

#[derive(Serialize)]
struct SampleOutput {
    artifact: String,
    input: Vec<f64>,
    #[serde(flatten)]
    prediction: Option<PredictionOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum PredictionOutput {
    Regression { prediction: f32 },
    Classification { label: i64, probabilities: Vec<f32> },
}

impl From<Prediction> for PredictionOutput {
    fn from(prediction: Prediction) -> Self {
        match prediction {
            Prediction::Value(prediction) => PredictionOutput::Regression { prediction },
            Prediction::Class {
                label,
                probabilities,
            } => PredictionOutput::Classification {
                label,
                probabilities,
            },
        }
    }
}

/// Render an error with its source chain on one line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn task_output(
    artifact: &std::path::Path,
    (n_train, n_holdout): (usize, usize),
    (metric, score): (&'static str, f64),
    (n_nodes, depth): (usize, usize),
    verification: &Result<Verification, VerifyError>,
) -> TaskOutput {
    TaskOutput {
        artifact: artifact.display().to_string(),
        n_train,
        n_holdout,
        metric,
        score,
        n_nodes,
        depth,
        verified: verification.is_ok(),
        max_abs_diff: verification.as_ref().ok().map(|v| v.max_abs_diff),
        verification_error: verification.as_ref().err().map(|e| error_chain(e)),
    }
}

fn sample_output(outcome: SampleOutcome) -> SampleOutput {
    let artifact = outcome.artifact.display().to_string();
    match outcome.result {
        Ok(prediction) => SampleOutput {
            artifact,
            input: outcome.input,
            prediction: Some(prediction.into()),
            error: None,
        },
        Err(e) => SampleOutput {
            artifact,
            input: outcome.input,
            prediction: None,
            error: Some(error_chain(&e)),
        },
    }
}

fn print_report(report: &PipelineReport) {
    let reg = &report.regression;
    println!("Regression model");
    println!("  train/holdout: {}/{}", reg.n_train, reg.n_holdout);
    println!("  holdout MSE:   {:.4}", reg.mse);
    println!("  saved to:      {}", reg.artifact.display());
    match &reg.verification {
        Ok(v) => println!("  verification:  ok ({} rows)", v.n_rows),
        Err(e) => println!("  verification:  FAILED ({})", error_chain(e)),
    }

    let cls = &report.classification;
    println!("Classification model");
    println!("  train/holdout: {}/{}", cls.n_train, cls.n_holdout);
    println!("  holdout accuracy: {:.4}", cls.accuracy);
    println!("  saved to:      {}", cls.artifact.display());
    match &cls.verification {
        Ok(v) => println!("  verification:  ok ({} rows)", v.n_rows),
        Err(e) => println!("  verification:  FAILED ({})", error_chain(e)),
    }

    println!("Sample predictions");
    for outcome in [&report.samples.regression, &report.samples.classification] {
        match &outcome.result {
            Ok(Prediction::Value(v)) => println!("  {:?} -> {v:.4}", outcome.input),
            Ok(Prediction::Class {
                label,
                probabilities,
            }) => println!("  {:?} -> class {label} {probabilities:?}", outcome.input),
            Err(e) => println!("  {:?} -> error: {}", outcome.input, error_chain(e)),
        }
    }
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

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let config = PipelineConfig::new()
                .with_output_dir(&cli.output_dir)
                .with_seed(cli.seed);

            let report = sapling::run(&config).context("pipeline failed")?;
            info!("pipeline complete");
            if !cli.quiet {
                print_report(&report);
            }

            let PipelineReport {
                regression,
                classification,
                samples,
            } = report;
            let output = RunOutput {
                output_dir: cli.output_dir.display().to_string(),
                seed: cli.seed,
                regression: task_output(
                    &regression.artifact,
                    (regression.n_train, regression.n_holdout),
                    ("mse", regression.mse),
                    (regression.n_nodes, regression.depth),
                    &regression.verification,
                ),
                classification: task_output(
                    &classification.artifact,
                    (classification.n_train, classification.n_holdout),
                    ("accuracy", classification.accuracy),
                    (classification.n_nodes, classification.depth),
                    &classification.verification,
                ),
                samples: vec![
                    sample_output(samples.regression),
                    sample_output(samples.classification),
                ],
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict { model, features } => {
            let prediction = predict(&model, &features)
                .with_context(|| format!("prediction with {} failed", model.display()))?;
            let output = SampleOutput {
                artifact: model.display().to_string(),
                input: features,
                prediction: Some(prediction.into()),
                error: None,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
