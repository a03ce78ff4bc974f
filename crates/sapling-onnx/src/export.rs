//! Conversion of fitted trees into ONNX `ai.onnx.ml` tree-ensemble graphs.

use std::fs;
use std::path::{Path, PathBuf};

use prost::Message;
use sapling_tree::{ClassificationTree, DecisionTree, Node, RegressionTree};
use tracing::{debug, info, instrument};

use crate::OnnxError;
use crate::proto::{
    AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, ValueInfoProto,
    ELEM_FLOAT, ELEM_INT64, dimension,
};

/// Domain of the tree-ensemble operators.
const ML_DOMAIN: &str = "ai.onnx.ml";

/// Name of the symbolic batch dimension.
const BATCH_DIM: &str = "N";

/// Options controlling the exported graph's interface.
///
/// # Defaults
///
/// | Parameter    | Default         |
/// |--------------|-----------------|
/// | `input_name` | `"float_input"` |
/// | `opset`      | 11              |
#[derive(Debug, Clone)]
pub struct ExportOptions {
    input_name: String,
    feature_width: usize,
    opset: i64,
}

impl ExportOptions {
    /// Options for a graph taking `feature_width` float features per row.
    #[must_use]
    pub fn new(feature_width: usize) -> Self {
        Self {
            input_name: "float_input".to_owned(),
            feature_width,
            opset: 11,
        }
    }

    /// Set the graph input name.
    #[must_use]
    pub fn with_input_name(mut self, input_name: impl Into<String>) -> Self {
        self.input_name = input_name.into();
        self
    }

    /// Set the default-domain opset version.
    #[must_use]
    pub fn with_opset(mut self, opset: i64) -> Self {
        self.opset = opset;
        self
    }

    /// Return the graph input name.
    #[must_use]
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Return the declared feature width.
    #[must_use]
    pub fn feature_width(&self) -> usize {
        self.feature_width
    }

    /// Return the default-domain opset version.
    #[must_use]
    pub fn opset(&self) -> i64 {
        self.opset
    }

    fn validate<L>(&self, tree: &DecisionTree<L>) -> Result<(), OnnxError> {
        if self.input_name.is_empty() {
            return Err(OnnxError::EmptyInputName);
        }
        if self.feature_width != tree.n_features() {
            return Err(OnnxError::FeatureWidthMismatch {
                declared: self.feature_width,
                tree: tree.n_features(),
            });
        }
        // Squeeze takes `axes` as an attribute only below opset 13.
        if !(9..=12).contains(&self.opset) {
            return Err(OnnxError::UnsupportedOpset { opset: self.opset });
        }
        Ok(())
    }

    fn input(&self) -> ValueInfoProto {
        ValueInfoProto::tensor(
            &self.input_name,
            ELEM_FLOAT,
            vec![
                dimension::Value::DimParam(BATCH_DIM.to_owned()),
                dimension::Value::DimValue(self.feature_width as i64),
            ],
        )
    }

    fn model(&self, graph: GraphProto) -> ModelProto {
        ModelProto {
            // Opsets 9 through 12 were released with IR versions 4 through 7.
            ir_version: self.opset - 5,
            producer_name: "sapling".to_owned(),
            producer_version: env!("CARGO_PKG_VERSION").to_owned(),
            graph: Some(graph),
            opset_import: vec![
                OperatorSetIdProto {
                    domain: String::new(),
                    version: self.opset,
                },
                OperatorSetIdProto {
                    domain: ML_DOMAIN.to_owned(),
                    version: 1,
                },
            ],
            ..ModelProto::default()
        }
    }
}

/// Flattened node attributes shared by both tree-ensemble operators.
struct NodeTable {
    node_ids: Vec<i64>,
    feature_ids: Vec<i64>,
    values: Vec<f32>,
    modes: Vec<&'static str>,
    true_ids: Vec<i64>,
    false_ids: Vec<i64>,
}

impl NodeTable {
    fn from_tree<L>(tree: &DecisionTree<L>) -> Self {
        let n = tree.n_nodes();
        let mut table = Self {
            node_ids: Vec::with_capacity(n),
            feature_ids: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
            modes: Vec::with_capacity(n),
            true_ids: Vec::with_capacity(n),
            false_ids: Vec::with_capacity(n),
        };
        for (idx, node) in tree.nodes().iter().enumerate() {
            table.node_ids.push(idx as i64);
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    table.feature_ids.push(feature.index() as i64);
                    // Thresholds are exact in f32.
                    table.values.push(*threshold as f32);
                    table.modes.push("BRANCH_LEQ");
                    table.true_ids.push(left.index() as i64);
                    table.false_ids.push(right.index() as i64);
                }
                Node::Leaf { .. } => {
                    table.feature_ids.push(0);
                    table.values.push(0.0);
                    table.modes.push("LEAF");
                    table.true_ids.push(0);
                    table.false_ids.push(0);
                }
            }
        }
        table
    }

    fn into_attributes(self) -> Vec<AttributeProto> {
        let n = self.node_ids.len();
        vec![
            AttributeProto::ints("nodes_treeids", vec![0; n]),
            AttributeProto::ints("nodes_nodeids", self.node_ids),
            AttributeProto::ints("nodes_featureids", self.feature_ids),
            AttributeProto::floats("nodes_values", self.values),
            AttributeProto::strings("nodes_modes", self.modes),
            AttributeProto::ints("nodes_truenodeids", self.true_ids),
            AttributeProto::ints("nodes_falsenodeids", self.false_ids),
        ]
    }
}

/// Convert a regression tree into a serialized ONNX model.
///
/// The graph runs `TreeEnsembleRegressor` followed by `Squeeze(axes=[1])`
/// and exposes one float output `variable` of shape `[N]`.
///
/// # Errors
///
/// | Variant                             | When                                      |
/// |-------------------------------------|-------------------------------------------|
/// | [`OnnxError::EmptyInputName`]       | the input name is empty                   |
/// | [`OnnxError::FeatureWidthMismatch`] | declared width differs from the tree's    |
/// | [`OnnxError::UnsupportedOpset`]     | opset outside 9..=12                      |
#[instrument(skip_all, fields(n_nodes = tree.n_nodes(), width = options.feature_width()))]
pub fn export_regressor(tree: &RegressionTree, options: &ExportOptions) -> Result<Vec<u8>, OnnxError> {
    options.validate(tree)?;

    let mut attribute = NodeTable::from_tree(tree).into_attributes();
    let (mut leaf_ids, mut weights) = (Vec::new(), Vec::new());
    for (idx, node) in tree.nodes().iter().enumerate() {
        if let Node::Leaf { value, .. } = node {
            leaf_ids.push(idx as i64);
            weights.push(*value as f32);
        }
    }
    let n_leaves = leaf_ids.len();
    attribute.extend([
        AttributeProto::ints("target_treeids", vec![0; n_leaves]),
        AttributeProto::ints("target_nodeids", leaf_ids),
        AttributeProto::ints("target_ids", vec![0; n_leaves]),
        AttributeProto::floats("target_weights", weights),
        AttributeProto::int("n_targets", 1),
        AttributeProto::string("aggregate_function", "SUM"),
        AttributeProto::string("post_transform", "NONE"),
    ]);

    let ensemble = NodeProto {
        input: vec![options.input_name.clone()],
        output: vec!["variable_2d".to_owned()],
        name: "TreeEnsembleRegressor".to_owned(),
        op_type: "TreeEnsembleRegressor".to_owned(),
        attribute,
        domain: ML_DOMAIN.to_owned(),
        ..NodeProto::default()
    };
    let squeeze = NodeProto {
        input: vec!["variable_2d".to_owned()],
        output: vec!["variable".to_owned()],
        name: "Squeeze".to_owned(),
        op_type: "Squeeze".to_owned(),
        attribute: vec![AttributeProto::ints("axes", vec![1])],
        ..NodeProto::default()
    };

    let graph = GraphProto {
        node: vec![ensemble, squeeze],
        name: "decision_tree_regressor".to_owned(),
        input: vec![options.input()],
        output: vec![ValueInfoProto::tensor(
            "variable",
            ELEM_FLOAT,
            vec![dimension::Value::DimParam(BATCH_DIM.to_owned())],
        )],
        ..GraphProto::default()
    };

    let bytes = options.model(graph).encode_to_vec();
    debug!(n_leaves, n_bytes = bytes.len(), "regression graph encoded");
    Ok(bytes)
}

/// Convert a classification tree into a serialized ONNX model.
///
/// The graph runs `TreeEnsembleClassifier` with integer class labels
/// `0..n_classes` and exposes `label` (int64 `[N]`) and `probabilities`
/// (float `[N, n_classes]`). Every leaf lists a weight for every class,
/// zero weights included, so runtimes never apply their single-class
/// binary shortcut and the probabilities equal the leaf distributions.
///
/// # Errors
///
/// Same conditions as [`export_regressor`].
#[instrument(skip_all, fields(n_nodes = tree.n_nodes(), width = options.feature_width()))]
pub fn export_classifier(
    tree: &ClassificationTree,
    options: &ExportOptions,
) -> Result<Vec<u8>, OnnxError> {
    options.validate(tree)?;

    let n_classes = tree.n_classes();
    let mut attribute = NodeTable::from_tree(tree).into_attributes();
    let (mut leaf_ids, mut class_ids, mut weights) = (Vec::new(), Vec::new(), Vec::new());
    for (idx, node) in tree.nodes().iter().enumerate() {
        if let Node::Leaf { value, .. } = node {
            for (class, &p) in value.distribution().iter().enumerate() {
                leaf_ids.push(idx as i64);
                class_ids.push(class as i64);
                weights.push(p as f32);
            }
        }
    }
    attribute.extend([
        AttributeProto::ints("class_treeids", vec![0; leaf_ids.len()]),
        AttributeProto::ints("class_nodeids", leaf_ids),
        AttributeProto::ints("class_ids", class_ids),
        AttributeProto::floats("class_weights", weights),
        AttributeProto::ints("classlabels_int64s", (0..n_classes as i64).collect()),
        AttributeProto::string("post_transform", "NONE"),
    ]);

    let ensemble = NodeProto {
        input: vec![options.input_name.clone()],
        output: vec!["label".to_owned(), "probabilities".to_owned()],
        name: "TreeEnsembleClassifier".to_owned(),
        op_type: "TreeEnsembleClassifier".to_owned(),
        attribute,
        domain: ML_DOMAIN.to_owned(),
        ..NodeProto::default()
    };

    let graph = GraphProto {
        node: vec![ensemble],
        name: "decision_tree_classifier".to_owned(),
        input: vec![options.input()],
        output: vec![
            ValueInfoProto::tensor(
                "label",
                ELEM_INT64,
                vec![dimension::Value::DimParam(BATCH_DIM.to_owned())],
            ),
            ValueInfoProto::tensor(
                "probabilities",
                ELEM_FLOAT,
                vec![
                    dimension::Value::DimParam(BATCH_DIM.to_owned()),
                    dimension::Value::DimValue(n_classes as i64),
                ],
            ),
        ],
        ..GraphProto::default()
    };

    let bytes = options.model(graph).encode_to_vec();
    debug!(n_classes, n_bytes = bytes.len(), "classification graph encoded");
    Ok(bytes)
}

/// Write `bytes` to `dir/file_name`, creating `dir` if needed.
///
/// An existing file is overwritten. Returns the written path.
///
/// # Errors
///
/// | Variant                        | When                            |
/// |--------------------------------|---------------------------------|
/// | [`OnnxError::CreateDir`]       | the directory cannot be created |
/// | [`OnnxError::WriteArtifact`]   | the file cannot be written      |
#[instrument(skip(bytes), fields(dir = %dir.display(), n_bytes = bytes.len()))]
pub fn write_artifact(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, OnnxError> {
    fs::create_dir_all(dir).map_err(|e| OnnxError::CreateDir {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let path = dir.join(file_name);
    fs::write(&path, bytes).map_err(|e| OnnxError::WriteArtifact {
        path: path.clone(),
        source: e,
    })?;
    info!(path = %path.display(), "artifact written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use sapling_tree::DecisionTreeConfig;

    use super::*;
    use crate::proto::AttributeType;

    fn step_tree() -> RegressionTree {
        let features = vec![vec![0.0], vec![1.0], vec![10.0], vec![11.0]];
        DecisionTreeConfig::new()
            .fit_regressor(&features, &[1.0, 1.0, 5.0, 5.0])
            .unwrap()
    }

    fn attr<'a>(node: &'a NodeProto, name: &str) -> &'a AttributeProto {
        node.attribute.iter().find(|a| a.name == name).unwrap()
    }

    #[test]
    fn width_mismatch_rejected() {
        let err = export_regressor(&step_tree(), &ExportOptions::new(3)).unwrap_err();
        assert!(matches!(
            err,
            OnnxError::FeatureWidthMismatch {
                declared: 3,
                tree: 1
            }
        ));
    }

    #[test]
    fn opset_13_rejected() {
        let err = export_regressor(&step_tree(), &ExportOptions::new(1).with_opset(13)).unwrap_err();
        assert!(matches!(err, OnnxError::UnsupportedOpset { opset: 13 }));
    }

    #[test]
    fn regressor_graph_layout() {
        let bytes = export_regressor(&step_tree(), &ExportOptions::new(1)).unwrap();
        let model = ModelProto::decode(bytes.as_slice()).unwrap();
        assert_eq!(model.ir_version, 6);

        let graph = model.graph.unwrap();
        assert_eq!(graph.node.len(), 2);
        let ensemble = &graph.node[0];
        assert_eq!(ensemble.domain, ML_DOMAIN);
        assert_eq!(attr(ensemble, "nodes_modes").r#type, AttributeType::Strings as i32);
        assert_eq!(
            attr(ensemble, "nodes_modes").strings,
            vec![b"BRANCH_LEQ".to_vec(), b"LEAF".to_vec(), b"LEAF".to_vec()]
        );
        assert_eq!(attr(ensemble, "nodes_values").floats[0], 5.5);
        assert_eq!(attr(ensemble, "target_weights").floats, vec![1.0, 5.0]);
        assert_eq!(graph.node[1].op_type, "Squeeze");
        assert_eq!(graph.output[0].name, "variable");
    }

    #[test]
    fn classifier_lists_every_class_per_leaf() {
        let features = vec![vec![0.0], vec![1.0], vec![10.0], vec![11.0]];
        let tree = DecisionTreeConfig::new()
            .fit_classifier(&features, &[0, 0, 1, 1])
            .unwrap();
        let bytes = export_classifier(&tree, &ExportOptions::new(1)).unwrap();
        let graph = ModelProto::decode(bytes.as_slice()).unwrap().graph.unwrap();
        let ensemble = &graph.node[0];

        assert_eq!(attr(ensemble, "class_ids").ints, vec![0, 1, 0, 1]);
        assert_eq!(attr(ensemble, "class_weights").floats, vec![1.0, 0.0, 0.0, 1.0]);
        assert_eq!(attr(ensemble, "classlabels_int64s").ints, vec![0, 1]);
        assert_eq!(graph.output[0].name, "label");
        assert_eq!(graph.output[1].name, "probabilities");
    }

    #[test]
    fn encoding_is_deterministic() {
        let a = export_regressor(&step_tree(), &ExportOptions::new(1)).unwrap();
        let b = export_regressor(&step_tree(), &ExportOptions::new(1)).unwrap();
        assert_eq!(a, b);
    }
}
