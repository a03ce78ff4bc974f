//! Header inspection of serialized ONNX artifacts.

use std::fmt;
use std::fs;
use std::path::Path;

use prost::Message;
use tracing::{debug, instrument};

use crate::OnnxError;
use crate::proto::{ModelProto, ValueInfoProto, dimension};

/// One declared tensor dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dim {
    /// Fixed size.
    Fixed(i64),
    /// Named size bound at run time (the batch dimension).
    Symbolic(String),
    /// Dimension with neither a size nor a name.
    Unknown,
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(n) => write!(f, "{n}"),
            Dim::Symbolic(name) => write!(f, "{name}"),
            Dim::Unknown => write!(f, "?"),
        }
    }
}

/// Interface summary of an ONNX artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactInfo {
    /// IR version the model was written with.
    pub ir_version: i64,
    /// Tool that produced the model.
    pub producer_name: String,
    /// `(domain, version)` operator set imports; the default domain is `""`.
    pub opsets: Vec<(String, i64)>,
    /// Name of the first graph input.
    pub input_name: String,
    /// Declared dimensions of the first graph input.
    pub input_dims: Vec<Dim>,
    /// Graph output names in declaration order.
    pub output_names: Vec<String>,
    /// Operator types in node order.
    pub operators: Vec<String>,
}

impl ArtifactInfo {
    /// Read and decode the artifact at `path`.
    ///
    /// # Errors
    ///
    /// | Variant                           | When                                |
    /// |-----------------------------------|-------------------------------------|
    /// | [`OnnxError::ReadArtifact`]       | the file is missing or unreadable   |
    /// | [`OnnxError::DecodeArtifact`]     | the bytes are not an ONNX model     |
    /// | [`OnnxError::MissingInput`]       | the graph declares no input         |
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read(path: &Path) -> Result<Self, OnnxError> {
        let bytes = fs::read(path).map_err(|e| OnnxError::ReadArtifact {
            path: path.to_path_buf(),
            source: e,
        })?;
        let info = Self::from_bytes(&bytes)?;
        debug!(input = %info.input_name, width = ?info.feature_width(), "artifact header read");
        Ok(info)
    }

    /// Decode an artifact held in memory.
    ///
    /// # Errors
    ///
    /// [`OnnxError::DecodeArtifact`] or [`OnnxError::MissingInput`], as for [`ArtifactInfo::read`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OnnxError> {
        let model = ModelProto::decode(bytes)?;
        let graph = model.graph.ok_or(OnnxError::MissingInput)?;
        let input = graph.input.first().ok_or(OnnxError::MissingInput)?;

        Ok(Self {
            ir_version: model.ir_version,
            producer_name: model.producer_name,
            opsets: model
                .opset_import
                .into_iter()
                .map(|o| (o.domain, o.version))
                .collect(),
            input_name: input.name.clone(),
            input_dims: dims_of(input),
            output_names: graph.output.iter().map(|o| o.name.clone()).collect(),
            operators: graph.node.iter().map(|n| n.op_type.clone()).collect(),
        })
    }

    /// Fixed width of the input's last dimension, if declared.
    #[must_use]
    pub fn feature_width(&self) -> Option<usize> {
        match self.input_dims.last()? {
            Dim::Fixed(n) => usize::try_from(*n).ok(),
            Dim::Symbolic(_) | Dim::Unknown => None,
        }
    }

    /// Imported version of `domain`, if any.
    #[must_use]
    pub fn opset(&self, domain: &str) -> Option<i64> {
        self.opsets
            .iter()
            .find(|(d, _)| d == domain)
            .map(|(_, v)| *v)
    }
}

fn dims_of(value: &ValueInfoProto) -> Vec<Dim> {
    let Some(shape) = value.tensor_type().and_then(|t| t.shape.as_ref()) else {
        return Vec::new();
    };
    shape
        .dim
        .iter()
        .map(|d| match &d.value {
            Some(dimension::Value::DimValue(n)) => Dim::Fixed(*n),
            Some(dimension::Value::DimParam(name)) => Dim::Symbolic(name.clone()),
            None => Dim::Unknown,
        })
        .collect()
}
