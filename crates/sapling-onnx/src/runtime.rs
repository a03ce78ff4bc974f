//! ONNX Runtime sessions over exported tree artifacts.

use std::path::{Path, PathBuf};

use ort::session::{Session, SessionOutputs};
use ort::tensor::PrimitiveTensorElementType;
use ort::value::Tensor;
use tracing::{debug, info, instrument};

use crate::OnnxError;
use crate::info::ArtifactInfo;

/// Output of a regression graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionOutput {
    /// One prediction per input row.
    pub values: Vec<f32>,
    /// Shape reported by the runtime, `[batch]` for sapling artifacts.
    pub shape: Vec<i64>,
}

/// Output of a classification graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationOutput {
    /// Predicted label per input row.
    pub labels: Vec<i64>,
    /// Shape of the label tensor, `[batch]`.
    pub label_shape: Vec<i64>,
    /// Row-major class probabilities.
    pub probabilities: Vec<f32>,
    /// Shape of the probability tensor, `[batch, n_classes]`.
    pub probability_shape: Vec<i64>,
}

impl ClassificationOutput {
    /// Number of classes in each probability row.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.probability_shape
            .last()
            .and_then(|&n| usize::try_from(n).ok())
            .unwrap_or(0)
    }

    /// Iterate probability rows, one slice per input row.
    pub fn probability_rows(&self) -> impl Iterator<Item = &[f32]> {
        self.probabilities.chunks(self.n_classes().max(1))
    }
}

/// A loaded artifact ready for inference.
///
/// Sessions are cheap to drop; the pipeline creates one per use.
pub struct InferenceSession {
    session: Session,
    path: PathBuf,
    info: ArtifactInfo,
}

impl InferenceSession {
    /// Load the artifact at `path`.
    ///
    /// The header is decoded first so a missing or malformed file is
    /// reported before the runtime is involved.
    ///
    /// # Errors
    ///
    /// | Variant                         | When                                   |
    /// |---------------------------------|----------------------------------------|
    /// | [`OnnxError::ReadArtifact`]     | the file is missing or unreadable      |
    /// | [`OnnxError::DecodeArtifact`]   | the bytes are not an ONNX model        |
    /// | [`OnnxError::MissingInput`]     | the graph declares no input            |
    /// | [`OnnxError::Session`]          | ONNX Runtime rejects the model         |
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, OnnxError> {
        let info = ArtifactInfo::read(path)?;
        let session_err = |e: ort::Error| OnnxError::Session {
            path: path.to_path_buf(),
            source: e,
        };
        let session = Session::builder()
            .map_err(session_err)?
            .commit_from_file(path)
            .map_err(session_err)?;
        info!(input = %info.input_name, outputs = ?info.output_names, "session ready");
        Ok(Self {
            session,
            path: path.to_path_buf(),
            info,
        })
    }

    /// Return the artifact path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the decoded artifact header.
    #[must_use]
    pub fn info(&self) -> &ArtifactInfo {
        &self.info
    }

    /// Run a regression artifact on `rows`.
    ///
    /// # Errors
    ///
    /// [`OnnxError::EmptyBatch`], [`OnnxError::InputWidthMismatch`],
    /// [`OnnxError::Inference`] or [`OnnxError::MissingOutput`].
    #[instrument(skip_all, fields(n_rows = rows.len()))]
    pub fn run_regression(&mut self, rows: &[Vec<f64>]) -> Result<RegressionOutput, OnnxError> {
        let outputs = self.run(rows)?;
        let (shape, values) = extract::<f32>(&outputs, "variable")?;
        debug!(?shape, "regression inference done");
        Ok(RegressionOutput { values, shape })
    }

    /// Run a classification artifact on `rows`.
    ///
    /// # Errors
    ///
    /// As [`InferenceSession::run_regression`].
    #[instrument(skip_all, fields(n_rows = rows.len()))]
    pub fn run_classification(
        &mut self,
        rows: &[Vec<f64>],
    ) -> Result<ClassificationOutput, OnnxError> {
        let outputs = self.run(rows)?;
        let (label_shape, labels) = extract::<i64>(&outputs, "label")?;
        let (probability_shape, probabilities) = extract::<f32>(&outputs, "probabilities")?;
        debug!(?label_shape, ?probability_shape, "classification inference done");
        Ok(ClassificationOutput {
            labels,
            label_shape,
            probabilities,
            probability_shape,
        })
    }

    fn run(&mut self, rows: &[Vec<f64>]) -> Result<SessionOutputs, OnnxError> {
        if rows.is_empty() {
            return Err(OnnxError::EmptyBatch);
        }
        let width = self.info.feature_width().unwrap_or(rows[0].len());
        let mut flat = Vec::with_capacity(rows.len() * width);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != width {
                return Err(OnnxError::InputWidthMismatch {
                    expected: width,
                    got: values.len(),
                    row,
                });
            }
            flat.extend(values.iter().map(|&v| v as f32));
        }

        let tensor = Tensor::from_array((vec![rows.len() as i64, width as i64], flat)).map_err(
            |e| OnnxError::Inference {
                context: "building input tensor",
                source: e,
            },
        )?;
        let input_name = self.info.input_name.clone();
        self.session
            .run(ort::inputs![input_name => tensor])
            .map_err(|e| OnnxError::Inference {
                context: "running session",
                source: e,
            })
    }
}

fn extract<T>(outputs: &SessionOutputs, name: &str) -> Result<(Vec<i64>, Vec<T>), OnnxError>
where
    T: PrimitiveTensorElementType + Clone,
{
    let value = outputs.get(name).ok_or_else(|| OnnxError::MissingOutput {
        name: name.to_owned(),
    })?;
    let (shape, data) = value
        .try_extract_tensor::<T>()
        .map_err(|e| OnnxError::Inference {
            context: "extracting output tensor",
            source: e,
        })?;
    Ok((shape.iter().copied().collect(), data.to_vec()))
}
