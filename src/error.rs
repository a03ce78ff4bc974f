//! Error types for the sapling pipeline.

use sapling_data::DataError;
use sapling_onnx::OnnxError;
use sapling_tree::TreeError;

/// Fatal pipeline failures: data generation, fitting, export or artifact writes.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Returned when dataset synthesis or splitting fails.
    #[error("dataset preparation failed")]
    Data {
        /// Underlying data error.
        #[from]
        source: DataError,
    },

    /// Returned when fitting, prediction or scoring fails.
    #[error("model fitting failed")]
    Tree {
        /// Underlying tree error.
        #[from]
        source: TreeError,
    },

    /// Returned when conversion or artifact writing fails.
    #[error("model export failed")]
    Export {
        /// Underlying ONNX error.
        #[from]
        source: OnnxError,
    },
}

/// Advisory verification failures. The pipeline logs these and continues.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Returned when the artifact cannot be loaded or executed.
    #[error("artifact could not be executed")]
    Runtime {
        /// Underlying ONNX error.
        #[from]
        source: OnnxError,
    },

    /// Returned when the expected values do not line up with the inputs.
    #[error("{n_inputs} input rows but {n_expected} expected predictions")]
    LengthMismatch {
        /// Number of input rows.
        n_inputs: usize,
        /// Number of expected predictions.
        n_expected: usize,
    },

    /// Returned when an output tensor has an unexpected shape.
    #[error("output \"{output}\" has shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        /// Output name.
        output: &'static str,
        /// Expected shape.
        expected: Vec<i64>,
        /// Shape reported by the runtime.
        got: Vec<i64>,
    },

    /// Returned when a predicted label differs from the in-process label.
    #[error("row {row}: artifact predicted class {got}, model predicted {expected}")]
    LabelMismatch {
        /// Zero-based row index.
        row: usize,
        /// In-process label.
        expected: usize,
        /// Artifact label.
        got: i64,
    },

    /// Returned when a numeric output differs beyond tolerance.
    #[error("row {row}: artifact produced {got}, model produced {expected} (tolerance {tolerance})")]
    Mismatch {
        /// Zero-based row index.
        row: usize,
        /// In-process value.
        expected: f64,
        /// Artifact value.
        got: f64,
        /// Allowed absolute difference for this value.
        tolerance: f64,
    },
}
