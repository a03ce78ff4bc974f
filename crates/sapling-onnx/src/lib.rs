//! ONNX export and inference for sapling decision trees.
//!
//! Fitted trees become `ai.onnx.ml` tree-ensemble graphs with a single
//! float input of shape `[N, width]`. Artifacts are encoded
//! deterministically and can be reloaded into ONNX Runtime through
//! [`InferenceSession`].

mod error;
mod export;
mod info;
pub mod proto;
mod runtime;

pub use error::OnnxError;
pub use export::{ExportOptions, export_classifier, export_regressor, write_artifact};
pub use info::{ArtifactInfo, Dim};
pub use runtime::{ClassificationOutput, InferenceSession, RegressionOutput};
