//! Single-row predictions against freshly loaded artifacts.

use std::path::{Path, PathBuf};

use sapling_onnx::{InferenceSession, OnnxError};
use tracing::{info, instrument, warn};

use crate::config::PipelineConfig;

/// Fixed regression sample fed to the regression artifact.
pub const REGRESSION_SAMPLE: [f64; 3] = [1.5, -0.5, 2.0];

/// Fixed classification sample fed to the classification artifact.
pub const CLASSIFICATION_SAMPLE: [f64; 4] = [0.5, 1.2, -0.8, 1.5];

/// Prediction for one input row.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// Output of a regression artifact.
    Value(f32),
    /// Output of a classification artifact.
    Class {
        /// Predicted label.
        label: i64,
        /// Probability per class.
        probabilities: Vec<f32>,
    },
}

/// Outcome of one sample prediction. Failures are reported, not propagated.
#[derive(Debug)]
pub struct SampleOutcome {
    /// Artifact that was loaded.
    pub artifact: PathBuf,
    /// Input row.
    pub input: Vec<f64>,
    /// Prediction, or why it could not be made.
    pub result: Result<Prediction, OnnxError>,
}

/// Outcomes for both artifacts.
#[derive(Debug)]
pub struct SampleReport {
    /// Regression artifact outcome.
    pub regression: SampleOutcome,
    /// Classification artifact outcome.
    pub classification: SampleOutcome,
}

/// Load the artifact at `path` and predict a single row.
///
/// Artifacts exposing a `label` output are treated as classifiers; all
/// others as regressors. The row width is checked against the width the
/// artifact declares.
///
/// # Errors
///
/// Any [`OnnxError`] from loading or running the artifact, including
/// [`OnnxError::InputWidthMismatch`] for a row of the wrong width.
#[instrument(skip_all, fields(path = %path.display(), width = features.len()))]
pub fn predict(path: &Path, features: &[f64]) -> Result<Prediction, OnnxError> {
    let mut session = InferenceSession::load(path)?;
    let rows = [features.to_vec()];
    if session.info().output_names.iter().any(|name| name == "label") {
        let output = session.run_classification(&rows)?;
        let label = output.labels.first().copied().ok_or_else(|| OnnxError::MissingOutput {
            name: "label".to_owned(),
        })?;
        Ok(Prediction::Class {
            label,
            probabilities: output.probability_rows().next().unwrap_or_default().to_vec(),
        })
    } else {
        let output = session.run_regression(&rows)?;
        let value = output.values.first().copied().ok_or_else(|| OnnxError::MissingOutput {
            name: "variable".to_owned(),
        })?;
        Ok(Prediction::Value(value))
    }
}

fn sample(artifact: PathBuf, input: &[f64]) -> SampleOutcome {
    let result = predict(&artifact, input);
    match &result {
        Ok(prediction) => info!(path = %artifact.display(), ?prediction, "sample prediction"),
        Err(e) => warn!(path = %artifact.display(), error = %e, "sample prediction failed"),
    }
    SampleOutcome {
        artifact,
        input: input.to_vec(),
        result,
    }
}

/// Feed the fixed samples to both artifacts in `config.output_dir()`.
pub fn run_samples(config: &PipelineConfig) -> SampleReport {
    SampleReport {
        regression: sample(config.regression_artifact(), &REGRESSION_SAMPLE),
        classification: sample(config.classification_artifact(), &CLASSIFICATION_SAMPLE),
    }
}
