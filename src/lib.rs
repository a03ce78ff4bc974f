//! Synthetic-data decision trees exported as verified ONNX artifacts.
//!
//! A run generates a regression and a binary classification dataset,
//! fits one tree per task, scores it on a holdout split, writes an ONNX
//! artifact and replays holdout rows through ONNX Runtime to confirm the
//! artifact reproduces the in-process model. A final sample runner feeds
//! one fixed row to each reloaded artifact.

mod config;
mod demo;
mod error;
mod pipeline;
mod verify;

pub use config::{CLASSIFICATION_ARTIFACT, PipelineConfig, REGRESSION_ARTIFACT, TaskSettings};
pub use demo::{
    CLASSIFICATION_SAMPLE, Prediction, REGRESSION_SAMPLE, SampleOutcome, SampleReport, predict,
    run_samples,
};
pub use error::{PipelineError, VerifyError};
pub use pipeline::{
    ClassificationReport, PipelineReport, RegressionReport, Stage, run, run_classification,
    run_regression,
};
pub use verify::{Verification, verify_classification, verify_regression};
