//! Error types for sapling-onnx.

use std::path::PathBuf;

/// Errors from building, writing, reading and executing ONNX artifacts.
#[derive(Debug, thiserror::Error)]
pub enum OnnxError {
    /// Returned when the declared input width differs from the tree's feature count.
    #[error("declared input width {declared} does not match the tree's {tree} features")]
    FeatureWidthMismatch {
        /// Width declared in the export options.
        declared: usize,
        /// Number of features the tree was trained on.
        tree: usize,
    },

    /// Returned when the requested operator set cannot express the graph.
    #[error("opset {opset} is not supported, expected one of 9..=12")]
    UnsupportedOpset {
        /// The requested default-domain opset version.
        opset: i64,
    },

    /// Returned when the input tensor name is empty.
    #[error("input name must not be empty")]
    EmptyInputName,

    /// Returned when the artifact directory cannot be created.
    #[error("cannot create artifact directory {path}")]
    CreateDir {
        /// Directory that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an artifact cannot be written.
    #[error("cannot write artifact {path}")]
    WriteArtifact {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an artifact does not exist or is unreadable.
    #[error("cannot read artifact {path}")]
    ReadArtifact {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when artifact bytes are not a valid ONNX model.
    #[error("artifact is not a valid ONNX model")]
    DecodeArtifact {
        /// Underlying protobuf decode error.
        #[from]
        source: prost::DecodeError,
    },

    /// Returned when a decoded model has no graph or no graph input.
    #[error("artifact graph declares no input")]
    MissingInput,

    /// Returned when ONNX Runtime rejects an artifact.
    #[error("cannot create inference session for {path}")]
    Session {
        /// Artifact path.
        path: PathBuf,
        /// Underlying runtime error.
        source: ort::Error,
    },

    /// Returned when tensor construction, execution or extraction fails.
    #[error("inference failed: {context}")]
    Inference {
        /// Stage that failed.
        context: &'static str,
        /// Underlying runtime error.
        source: ort::Error,
    },

    /// Returned when a session produces no output with the expected name.
    #[error("session produced no output named \"{name}\"")]
    MissingOutput {
        /// The expected output name.
        name: String,
    },

    /// Returned when an inference input row has the wrong number of features.
    #[error("input row {row} has {got} features, expected {expected}")]
    InputWidthMismatch {
        /// Width declared by the artifact.
        expected: usize,
        /// Width of the offending row.
        got: usize,
        /// Zero-based row index.
        row: usize,
    },

    /// Returned when inference is requested for zero rows.
    #[error("inference batch is empty")]
    EmptyBatch,
}
