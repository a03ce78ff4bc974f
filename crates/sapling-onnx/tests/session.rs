//! Export, reload and execute artifacts through ONNX Runtime.

use sapling_data::{ClassificationSpec, RegressionSpec};
use sapling_onnx::{
    ExportOptions, InferenceSession, OnnxError, export_classifier, export_regressor,
    write_artifact,
};
use sapling_tree::{ClassificationTree, DecisionTreeConfig, RegressionTree};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn regression_fixture() -> (RegressionTree, Vec<Vec<f64>>) {
    let data = RegressionSpec::new(300, 3).with_noise(0.1).generate().unwrap();
    let tree = DecisionTreeConfig::new()
        .with_max_depth(Some(10))
        .with_min_samples_split(5)
        .with_min_samples_leaf(2)
        .fit_regressor(data.features(), data.targets())
        .unwrap();
    (tree, data.features().to_vec())
}

fn classification_fixture() -> (ClassificationTree, Vec<Vec<f64>>) {
    let data = ClassificationSpec::new(300, 4)
        .with_n_informative(3)
        .with_n_redundant(1)
        .generate()
        .unwrap();
    let tree = DecisionTreeConfig::new()
        .with_max_depth(Some(8))
        .with_min_samples_split(5)
        .with_min_samples_leaf(2)
        .fit_classifier(data.features(), data.targets())
        .unwrap();
    (tree, data.features().to_vec())
}

// ---------------------------------------------------------------------------
// Artifact files
// ---------------------------------------------------------------------------

#[test]
fn write_creates_missing_directories() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a").join("b");
    let path = write_artifact(&nested, "model.onnx", b"bytes").unwrap();
    assert_eq!(path, nested.join("model.onnx"));
    assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
}

#[test]
fn write_overwrites_existing_file() {
    let dir = TempDir::new().unwrap();
    write_artifact(dir.path(), "model.onnx", b"first").unwrap();
    let path = write_artifact(dir.path(), "model.onnx", b"second").unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"second");
}

#[test]
fn missing_artifact_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    let err = InferenceSession::load(&dir.path().join("absent.onnx")).err().unwrap();
    assert!(matches!(err, OnnxError::ReadArtifact { .. }));
}

#[test]
fn corrupt_artifact_is_a_decode_error() {
    let dir = TempDir::new().unwrap();
    let path = write_artifact(dir.path(), "corrupt.onnx", &[0xff; 8]).unwrap();
    let err = InferenceSession::load(&path).err().unwrap();
    assert!(matches!(err, OnnxError::DecodeArtifact { .. }));
}

// ---------------------------------------------------------------------------
// Runtime agreement
// ---------------------------------------------------------------------------

#[test]
fn regression_session_matches_tree() {
    let (tree, rows) = regression_fixture();
    let bytes = export_regressor(&tree, &ExportOptions::new(3)).unwrap();
    let dir = TempDir::new().unwrap();
    let path = write_artifact(dir.path(), "regression_model.onnx", &bytes).unwrap();

    let mut session = InferenceSession::load(&path).unwrap();
    assert_eq!(session.info().feature_width(), Some(3));
    let output = session.run_regression(&rows).unwrap();

    assert_eq!(output.shape, vec![rows.len() as i64]);
    let expected = tree.predict_batch(&rows).unwrap();
    for (got, want) in output.values.iter().zip(&expected) {
        let tol = 1e-4 * want.abs().max(1.0);
        assert!((f64::from(*got) - want).abs() <= tol, "{got} vs {want}");
    }
}

#[test]
fn classification_session_matches_tree() {
    let (tree, rows) = classification_fixture();
    let bytes = export_classifier(&tree, &ExportOptions::new(4)).unwrap();
    let dir = TempDir::new().unwrap();
    let path = write_artifact(dir.path(), "classification_model.onnx", &bytes).unwrap();

    let mut session = InferenceSession::load(&path).unwrap();
    let output = session.run_classification(&rows).unwrap();

    assert_eq!(output.label_shape, vec![rows.len() as i64]);
    assert_eq!(output.probability_shape, vec![rows.len() as i64, 2]);

    let expected = tree.predict_batch(&rows).unwrap();
    let got: Vec<usize> = output.labels.iter().map(|&l| l as usize).collect();
    assert_eq!(got, expected);

    for row in output.probability_rows() {
        let sum: f32 = row.iter().sum();
        assert!((0.99..=1.01).contains(&sum), "row sums to {sum}");
    }
}

#[test]
fn single_row_regression_has_batch_shape() {
    let (tree, _) = regression_fixture();
    let bytes = export_regressor(&tree, &ExportOptions::new(3)).unwrap();
    let dir = TempDir::new().unwrap();
    let path = write_artifact(dir.path(), "regression_model.onnx", &bytes).unwrap();

    let mut session = InferenceSession::load(&path).unwrap();
    let output = session.run_regression(&[vec![1.0, 2.0, 3.0]]).unwrap();
    assert_eq!(output.shape, vec![1]);
    assert!(output.values[0].is_finite());
}

#[test]
fn wrong_row_width_rejected_before_inference() {
    let (tree, _) = classification_fixture();
    let bytes = export_classifier(&tree, &ExportOptions::new(4)).unwrap();
    let dir = TempDir::new().unwrap();
    let path = write_artifact(dir.path(), "classification_model.onnx", &bytes).unwrap();

    let mut session = InferenceSession::load(&path).unwrap();
    let err = session.run_classification(&[vec![1.0, 2.0, 3.0]]).unwrap_err();
    assert!(matches!(
        err,
        OnnxError::InputWidthMismatch {
            expected: 4,
            got: 3,
            row: 0
        }
    ));
    assert!(matches!(
        session.run_classification(&[]).unwrap_err(),
        OnnxError::EmptyBatch
    ));
}
