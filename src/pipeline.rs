//! Sequential orchestration: generate, split, fit, evaluate, export, verify.

use std::fmt;
use std::path::PathBuf;

use sapling_data::{ClassificationSpec, RegressionSpec};
use sapling_onnx::{ExportOptions, export_classifier, export_regressor, write_artifact};
use sapling_tree::{accuracy, mean_squared_error};
use tracing::{info, instrument, warn};

use crate::config::{CLASSIFICATION_ARTIFACT, PipelineConfig, REGRESSION_ARTIFACT};
use crate::demo::{SampleReport, run_samples};
use crate::error::{PipelineError, VerifyError};
use crate::verify::{Verification, verify_classification, verify_regression};

/// Informative columns in the classification dataset.
const CLASSIFICATION_INFORMATIVE: usize = 3;

/// Redundant columns in the classification dataset.
const CLASSIFICATION_REDUNDANT: usize = 1;

/// Stages of a full run, entered strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Configuration accepted, nothing written yet.
    Init,
    /// Regression dataset through verified artifact.
    RegressionPipeline,
    /// Classification dataset through verified artifact.
    ClassificationPipeline,
    /// Fixed samples against reloaded artifacts.
    SampleDemo,
    /// Run complete.
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::RegressionPipeline => "regression_pipeline",
            Stage::ClassificationPipeline => "classification_pipeline",
            Stage::SampleDemo => "sample_demo",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

fn enter(stage: Stage) {
    info!(%stage, "entering stage");
}

/// Outcome of the regression pipeline.
#[derive(Debug)]
pub struct RegressionReport {
    /// Training rows.
    pub n_train: usize,
    /// Holdout rows.
    pub n_holdout: usize,
    /// Holdout mean squared error.
    pub mse: f64,
    /// Nodes in the fitted tree.
    pub n_nodes: usize,
    /// Depth of the fitted tree.
    pub depth: usize,
    /// Written artifact.
    pub artifact: PathBuf,
    /// Advisory artifact check.
    pub verification: Result<Verification, VerifyError>,
}

/// Outcome of the classification pipeline.
#[derive(Debug)]
pub struct ClassificationReport {
    /// Training rows.
    pub n_train: usize,
    /// Holdout rows.
    pub n_holdout: usize,
    /// Holdout accuracy in [0, 1].
    pub accuracy: f64,
    /// Nodes in the fitted tree.
    pub n_nodes: usize,
    /// Depth of the fitted tree.
    pub depth: usize,
    /// Written artifact.
    pub artifact: PathBuf,
    /// Advisory artifact check.
    pub verification: Result<Verification, VerifyError>,
}

/// Outcome of a full run.
#[derive(Debug)]
pub struct PipelineReport {
    /// Regression pipeline outcome.
    pub regression: RegressionReport,
    /// Classification pipeline outcome.
    pub classification: ClassificationReport,
    /// Sample runner outcomes.
    pub samples: SampleReport,
}

fn log_verification(task: &'static str, verification: &Result<Verification, VerifyError>) {
    match verification {
        Ok(v) => info!(task, n_rows = v.n_rows, max_abs_diff = v.max_abs_diff, "artifact verified"),
        Err(e) => warn!(task, error = %e, "artifact verification failed"),
    }
}

/// Generate, fit, export and verify the regression model.
///
/// # Errors
///
/// Returns [`PipelineError`] when synthesis, fitting or export fails.
/// Verification failures are recorded in the report instead.
#[instrument(skip_all, fields(seed = config.seed()))]
pub fn run_regression(config: &PipelineConfig) -> Result<RegressionReport, PipelineError> {
    let settings = config.regression();
    let data = RegressionSpec::new(settings.n_samples(), settings.n_features())
        .with_noise(config.noise())
        .with_seed(config.seed())
        .generate()?;
    let split = data.train_test_split(settings.test_fraction(), config.seed())?;

    let tree = settings
        .tree_config(config.seed())
        .fit_regressor(split.train.features(), split.train.targets())?;
    let predictions = tree.predict_batch(split.holdout.features())?;
    let mse = mean_squared_error(split.holdout.targets(), &predictions)?;
    info!(
        n_train = split.train.n_samples(),
        n_holdout = split.holdout.n_samples(),
        mse,
        depth = tree.depth(),
        "regression model evaluated"
    );

    let bytes = export_regressor(&tree, &ExportOptions::new(settings.n_features()))?;
    let artifact = write_artifact(config.output_dir(), REGRESSION_ARTIFACT, &bytes)?;

    let k = settings.verify_rows().min(split.holdout.n_samples());
    let verification = verify_regression(
        &artifact,
        &split.holdout.features()[..k],
        &predictions[..k],
        settings.tolerance(),
    );
    log_verification("regression", &verification);

    Ok(RegressionReport {
        n_train: split.train.n_samples(),
        n_holdout: split.holdout.n_samples(),
        mse,
        n_nodes: tree.n_nodes(),
        depth: tree.depth(),
        artifact,
        verification,
    })
}

/// Generate, fit, export and verify the classification model.
///
/// # Errors
///
/// As [`run_regression`].
#[instrument(skip_all, fields(seed = config.seed()))]
pub fn run_classification(config: &PipelineConfig) -> Result<ClassificationReport, PipelineError> {
    let settings = config.classification();
    let data = ClassificationSpec::new(settings.n_samples(), settings.n_features())
        .with_n_informative(CLASSIFICATION_INFORMATIVE)
        .with_n_redundant(CLASSIFICATION_REDUNDANT)
        .with_seed(config.seed())
        .generate()?;
    let split = data.train_test_split(settings.test_fraction(), config.seed())?;

    let tree = settings
        .tree_config(config.seed())
        .fit_classifier(split.train.features(), split.train.targets())?;
    let predictions = tree.predict_batch(split.holdout.features())?;
    let acc = accuracy(split.holdout.targets(), &predictions)?;
    info!(
        n_train = split.train.n_samples(),
        n_holdout = split.holdout.n_samples(),
        accuracy = acc,
        depth = tree.depth(),
        "classification model evaluated"
    );

    let bytes = export_classifier(&tree, &ExportOptions::new(settings.n_features()))?;
    let artifact = write_artifact(config.output_dir(), CLASSIFICATION_ARTIFACT, &bytes)?;

    let k = settings.verify_rows().min(split.holdout.n_samples());
    let rows = &split.holdout.features()[..k];
    let proba = tree.predict_proba_batch(rows)?;
    let verification = verify_classification(
        &artifact,
        rows,
        &predictions[..k],
        &proba,
        settings.tolerance(),
    );
    log_verification("classification", &verification);

    Ok(ClassificationReport {
        n_train: split.train.n_samples(),
        n_holdout: split.holdout.n_samples(),
        accuracy: acc,
        n_nodes: tree.n_nodes(),
        depth: tree.depth(),
        artifact,
        verification,
    })
}

/// Run both pipelines, then the sample runner.
///
/// # Errors
///
/// Returns the first fatal [`PipelineError`]. Verification and sample
/// failures never abort the run.
#[instrument(skip_all, fields(output_dir = %config.output_dir().display()))]
pub fn run(config: &PipelineConfig) -> Result<PipelineReport, PipelineError> {
    enter(Stage::Init);

    enter(Stage::RegressionPipeline);
    let regression = run_regression(config)?;

    enter(Stage::ClassificationPipeline);
    let classification = run_classification(config)?;

    enter(Stage::SampleDemo);
    let samples = run_samples(config);

    enter(Stage::Done);
    Ok(PipelineReport {
        regression,
        classification,
        samples,
    })
}
